//! API client module for MyRecipe.
//!
//! Provides the authenticated HTTP client with single-flight token refresh,
//! credential storage, auth/session endpoints, refrigerator endpoints, and
//! request/response types matching the MyRecipe backend API.

pub mod auth;
pub mod client;
pub mod credentials;
pub mod error;
pub mod refresh;
pub mod refrigerator;
pub mod transport;
pub mod types;

pub use auth::{AuthApi, AuthSession};
pub use client::ApiClient;
pub use credentials::{CredentialStore, KeyringStore, MemoryStore, StoreError};
pub use error::ApiError;
pub use refresh::{RefreshCoordinator, RefreshError, RefreshOutcome, TokenExchange};
pub use transport::{ApiRequest, ApiResponse, ReqwestTransport, Transport, TransportError};
