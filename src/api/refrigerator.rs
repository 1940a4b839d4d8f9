//! Refrigerator inventory endpoints.
//!
//! All calls go through the authenticated client, so an expired access token
//! is refreshed transparently.

use super::client::ApiClient;
use super::error::ApiError;
use super::types::{ItemRequest, ItemResponse};

const ITEM_PATH: &str = "/api/refrigerator/item";

/// GET /api/refrigerator/item
pub async fn find_items(client: &ApiClient) -> Result<Vec<ItemResponse>, ApiError> {
    client.authenticated_get(ITEM_PATH).await
}

/// POST /api/refrigerator/item
pub async fn create_item(client: &ApiClient, item: &ItemRequest) -> Result<ItemResponse, ApiError> {
    client.authenticated_post(ITEM_PATH, item).await
}

/// PATCH /api/refrigerator/item/{id}
pub async fn update_item(
    client: &ApiClient,
    item_id: i64,
    item: &ItemRequest,
) -> Result<ItemResponse, ApiError> {
    client
        .authenticated_patch(&format!("{}/{}", ITEM_PATH, item_id), item)
        .await
}

/// DELETE /api/refrigerator/item/{id}
pub async fn delete_item(client: &ApiClient, item_id: i64) -> Result<(), ApiError> {
    client
        .authenticated_delete(&format!("{}/{}", ITEM_PATH, item_id))
        .await
}
