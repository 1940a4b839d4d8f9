//! Application state for the MyRecipe client.
//!
//! Wires one transport, one credential store, and one refresh coordinator
//! together so every caller shares the same refresh flight.

use std::sync::Arc;

use crate::api::auth::{AuthApi, AuthSession};
use crate::api::client::ApiClient;
use crate::api::credentials::CredentialStore;
use crate::api::transport::{ReqwestTransport, Transport, TransportError};
use crate::config::Config;

/// Shared client state. Cheap to pass around by reference.
pub struct AppState {
    /// Authenticated client for API calls.
    pub api: Arc<ApiClient>,

    /// Login/signup/sign-out on the plain transport.
    pub session: AuthSession,
}

impl AppState {
    /// Create state talking to the configured backend.
    pub fn new(config: &Config, store: Arc<dyn CredentialStore>) -> Result<Self, TransportError> {
        let transport: Arc<dyn Transport> =
            Arc::new(ReqwestTransport::new(&config.api_base_url, config.timeout)?);
        Ok(Self::with_transport(transport, store))
    }

    /// Create state over an arbitrary transport.
    pub fn with_transport(transport: Arc<dyn Transport>, store: Arc<dyn CredentialStore>) -> Self {
        let auth = Arc::new(AuthApi::new(transport.clone()));
        let api = Arc::new(ApiClient::new(transport, store.clone(), auth.clone()));
        let session = AuthSession::new(auth, store, api.coordinator().clone());
        Self { api, session }
    }
}
