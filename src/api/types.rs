//! Request and response types for the MyRecipe backend API.
//!
//! All structs use camelCase serialization to match the API's JSON format.

use serde::{Deserialize, Serialize};

/// Access/refresh token pair. Always stored and replaced together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Login request body sent to POST /api/auth/login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// User summary returned by login.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginUser {
    pub id: i64,
    pub email: String,
    pub nickname: String,
    pub handle: String,
}

/// Login response from POST /api/auth/login.
///
/// Older backend builds name the token field `token` instead of `tokens`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: LoginUser,
    #[serde(alias = "token")]
    pub tokens: TokenPair,
}

/// Signup request body sent to POST /api/auth/signup.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub nickname: String,
}

/// User summary returned by signup.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupUser {
    pub id: i64,
    pub nickname: String,
    pub handle: String,
}

/// Signup response from POST /api/auth/signup.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
    pub user: SignupUser,
    #[serde(alias = "token")]
    pub tokens: TokenPair,
}

/// Refresh request body sent to POST /api/auth/refresh.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Refresh response from POST /api/auth/refresh.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub access_expires_in_seconds: Option<u64>,
}

impl From<RefreshResponse> for TokenPair {
    fn from(resp: RefreshResponse) -> Self {
        TokenPair {
            access_token: resp.access_token,
            refresh_token: resp.refresh_token,
        }
    }
}

/// Logout request body sent to POST /api/auth/logout.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: String,
}

/// Error envelope returned by the backend for non-2xx responses.
///
/// Every field is optional; auth entry points and the global exception
/// handler fill different subsets.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    /// Numeric on some endpoints, a string error code on others.
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    #[serde(default)]
    pub status: Option<serde_json::Value>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub trace_id: Option<String>,
}

/// Refrigerator item body for POST/PATCH /api/refrigerator/item.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    pub unit: String,
    /// ISO date (`YYYY-MM-DD`).
    pub expiration_date: String,
}

/// Refrigerator item as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResponse {
    pub id: i64,
    pub name: String,
    pub unit: String,
    pub expiration_date: String,
}
