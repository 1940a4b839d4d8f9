//! HTTP client with bearer token injection and transparent token refresh.
//!
//! Every request gets the stored access token attached. A 401 triggers one
//! shared refresh through the `RefreshCoordinator`, after which the request
//! is replayed exactly once. All other statuses pass through untouched.

use std::sync::Arc;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::auth::AuthApi;
use super::credentials::CredentialStore;
use super::error::ApiError;
use super::refresh::RefreshCoordinator;
use super::transport::{ApiRequest, ApiResponse, Transport};

/// Authenticated client for the MyRecipe API.
///
/// Reads credentials from the store but never writes them; persisting and
/// clearing the session is the coordinator's job.
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    store: Arc<dyn CredentialStore>,
    refresh: Arc<RefreshCoordinator>,
}

impl ApiClient {
    /// Build a client whose refresh exchange runs through `auth`.
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
        auth: Arc<AuthApi>,
    ) -> Self {
        let refresh = Arc::new(RefreshCoordinator::new(store.clone(), auth));
        Self::with_coordinator(transport, store, refresh)
    }

    /// Build a client around an existing coordinator, so several clients
    /// share one refresh flight.
    pub fn with_coordinator(
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
        refresh: Arc<RefreshCoordinator>,
    ) -> Self {
        Self {
            transport,
            store,
            refresh,
        }
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.refresh
    }

    /// Send a request with the current access token attached.
    ///
    /// Returns whatever response the server produced, except when a 401
    /// cannot be recovered because the refresh failed: that yields
    /// `ApiError::SessionExpired` carrying the original 401 response.
    pub async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse, ApiError> {
        self.attach_access_token(&mut request);
        let response = self.transport.execute(&request).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        if request.is_retried() {
            log::debug!(
                "{} {} rejected again after refresh, giving up",
                request.method(),
                request.path()
            );
            return Ok(response);
        }

        log::debug!(
            "{} {} returned 401, requesting fresh token",
            request.method(),
            request.path()
        );
        request.mark_retried();
        match self.refresh.obtain_fresh_token().await {
            Ok(token) => {
                request.set_bearer(&token)?;
                Ok(self.transport.execute(&request).await?)
            }
            Err(cause) => {
                log::warn!(
                    "{} {} failed: session could not be refreshed ({})",
                    request.method(),
                    request.path(),
                    cause
                );
                Err(ApiError::SessionExpired { response, cause })
            }
        }
    }

    /// Send and decode a JSON response; non-2xx becomes `ApiError::Status`.
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let resp = self.send(request).await?;
        if !resp.is_success() {
            return Err(ApiError::from_response(&resp));
        }
        resp.json().map_err(ApiError::Decode)
    }

    /// Send and discard the body; non-2xx becomes `ApiError::Status`.
    pub async fn send_empty(&self, request: ApiRequest) -> Result<(), ApiError> {
        let resp = self.send(request).await?;
        if !resp.is_success() {
            return Err(ApiError::from_response(&resp));
        }
        Ok(())
    }

    /// Send an authenticated GET request to a relative API path.
    pub async fn authenticated_get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send_json(ApiRequest::get(path)).await
    }

    /// Send an authenticated POST request with a JSON body.
    pub async fn authenticated_post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let request = ApiRequest::post(path).json(body).map_err(ApiError::Encode)?;
        self.send_json(request).await
    }

    /// Send an authenticated PATCH request with a JSON body.
    pub async fn authenticated_patch<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let request = ApiRequest::patch(path).json(body).map_err(ApiError::Encode)?;
        self.send_json(request).await
    }

    /// Send an authenticated DELETE request.
    pub async fn authenticated_delete(&self, path: &str) -> Result<(), ApiError> {
        self.send_empty(ApiRequest::delete(path)).await
    }

    /// Without a usable token the request goes out unauthenticated and the
    /// server decides.
    fn attach_access_token(&self, request: &mut ApiRequest) {
        match self.store.get_access() {
            Ok(Some(token)) => {
                if let Err(e) = request.set_bearer(&token) {
                    log::warn!("Stored access token unusable, sending unauthenticated: {}", e);
                }
            }
            Ok(None) => {}
            Err(e) => log::warn!("Failed to read access token, sending unauthenticated: {}", e),
        }
    }
}
