//! CLI command handlers.
//!
//! Each handler drives one user-facing flow through `AppState` and prints a
//! short human-readable result. Errors are returned to `main` for reporting.

use crate::api::error::ApiError;
use crate::api::refrigerator;
use crate::api::types::{ItemRequest, ItemResponse};
use crate::state::AppState;

/// Log in and store the session tokens.
pub async fn login(state: &AppState, email: &str, password: &str) -> Result<(), ApiError> {
    let user = state.session.login(email, password).await?;
    println!("Logged in as {} ({})", user.nickname, user.handle);
    Ok(())
}

/// Create an account and store the session tokens.
pub async fn signup(
    state: &AppState,
    email: &str,
    password: &str,
    nickname: &str,
) -> Result<(), ApiError> {
    let user = state.session.signup(email, password, nickname).await?;
    println!("Welcome, {} ({})", user.nickname, user.handle);
    Ok(())
}

/// Revoke the refresh token and clear local credentials.
pub async fn logout(state: &AppState) -> Result<(), ApiError> {
    state.session.sign_out().await?;
    println!("Signed out");
    Ok(())
}

pub fn status(state: &AppState) {
    if state.session.is_logged_in() {
        println!("Signed in");
    } else {
        println!("Signed out");
    }
}

pub async fn fridge_list(state: &AppState) -> Result<(), ApiError> {
    let items = refrigerator::find_items(&state.api).await?;
    if items.is_empty() {
        println!("Refrigerator is empty");
    }
    for item in &items {
        println!("{}", format_item(item));
    }
    Ok(())
}

pub async fn fridge_add(state: &AppState, item: &ItemRequest) -> Result<(), ApiError> {
    let created = refrigerator::create_item(&state.api, item).await?;
    println!("Added {}", format_item(&created));
    Ok(())
}

pub async fn fridge_update(
    state: &AppState,
    item_id: i64,
    item: &ItemRequest,
) -> Result<(), ApiError> {
    let updated = refrigerator::update_item(&state.api, item_id, item).await?;
    println!("Updated {}", format_item(&updated));
    Ok(())
}

pub async fn fridge_delete(state: &AppState, item_id: i64) -> Result<(), ApiError> {
    refrigerator::delete_item(&state.api, item_id).await?;
    println!("Deleted item #{}", item_id);
    Ok(())
}

/// One-line listing: `#id name (unit) expires YYYY-MM-DD`.
fn format_item(item: &ItemResponse) -> String {
    format!(
        "#{} {} ({}) expires {}",
        item.id, item.name, item.unit, item.expiration_date
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_item() {
        let item = ItemResponse {
            id: 3,
            name: "tofu".to_string(),
            unit: "pack".to_string(),
            expiration_date: "2026-10-21".to_string(),
        };
        assert_eq!(format_item(&item), "#3 tofu (pack) expires 2026-10-21");
    }
}
