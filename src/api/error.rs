//! Caller-facing API error.

use reqwest::StatusCode;
use thiserror::Error;

use super::credentials::StoreError;
use super::refresh::RefreshError;
use super::transport::{ApiResponse, TransportError};
use super::types::ApiErrorResponse;

/// Message shown when no HTTP response was received.
pub const UNREACHABLE_MESSAGE: &str =
    "Cannot reach the server. Check the address, that the server is running, and the network.";

#[derive(Debug, Error)]
pub enum ApiError {
    /// No response received. Never triggers a refresh.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The request got a 401 and the session could not be refreshed.
    ///
    /// `response` is the original 401, unchanged.
    #[error("session expired ({cause}); sign in again")]
    SessionExpired {
        response: ApiResponse,
        cause: RefreshError,
    },

    /// Non-2xx response surfaced by a typed endpoint helper.
    #[error("request failed ({status}): {text}")]
    Status {
        status: StatusCode,
        body: Option<ApiErrorResponse>,
        text: String,
    },

    /// The credential store could not persist or drop the session.
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to parse response: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),
}

impl ApiError {
    /// Build a `Status` error from a non-2xx response.
    pub fn from_response(resp: &ApiResponse) -> Self {
        ApiError::Status {
            status: resp.status(),
            body: resp.error_body(),
            text: resp.text(),
        }
    }

    /// HTTP status behind this error, if there was a response.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::SessionExpired { response, .. } => Some(response.status()),
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired { .. })
    }

    /// Message suitable for showing to the user.
    ///
    /// Prefers the envelope `message`, then `error`, then `fallback`. Store
    /// failures describe themselves.
    pub fn user_message(&self, fallback: &str) -> String {
        let body = match self {
            ApiError::Transport(_) => return UNREACHABLE_MESSAGE.to_string(),
            ApiError::SessionExpired { response, .. } => response.error_body(),
            ApiError::Status { body, .. } => body.clone(),
            ApiError::Store(e) => return e.to_string(),
            ApiError::Decode(_) | ApiError::Encode(_) => None,
        };
        body.and_then(|b| b.message.or(b.error))
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| fallback.to_string())
    }
}
