//! Auth endpoints and the session facade.
//!
//! Login, signup, refresh, and logout go through the plain transport: they
//! never carry a bearer token and a 401 from them is never intercepted.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::credentials::CredentialStore;
use super::error::ApiError;
use super::refresh::{RefreshCoordinator, TokenExchange};
use super::transport::{ApiRequest, Transport};
use super::types::{
    LoginRequest, LoginResponse, LoginUser, LogoutRequest, RefreshRequest, RefreshResponse,
    SignupRequest, SignupResponse, SignupUser, TokenPair,
};

pub const LOGIN_PATH: &str = "/api/auth/login";
pub const SIGNUP_PATH: &str = "/api/auth/signup";
pub const REFRESH_PATH: &str = "/api/auth/refresh";
pub const LOGOUT_PATH: &str = "/api/auth/logout";

/// Unauthenticated client for the `/api/auth` endpoints.
pub struct AuthApi {
    transport: Arc<dyn Transport>,
}

impl AuthApi {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// POST /api/auth/login
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError> {
        self.post_json(LOGIN_PATH, request).await
    }

    /// POST /api/auth/signup
    pub async fn signup(&self, request: &SignupRequest) -> Result<SignupResponse, ApiError> {
        self.post_json(SIGNUP_PATH, request).await
    }

    /// POST /api/auth/refresh
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        let request = RefreshRequest {
            refresh_token: refresh_token.to_string(),
        };
        let resp: RefreshResponse = self.post_json(REFRESH_PATH, &request).await?;
        Ok(resp.into())
    }

    /// POST /api/auth/logout. Revokes the refresh token server-side.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), ApiError> {
        let request = ApiRequest::post(LOGOUT_PATH)
            .json(&LogoutRequest {
                refresh_token: refresh_token.to_string(),
            })
            .map_err(ApiError::Encode)?;
        let resp = self.transport.execute(&request).await?;
        if !resp.is_success() {
            return Err(ApiError::from_response(&resp));
        }
        Ok(())
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let request = ApiRequest::post(path).json(body).map_err(ApiError::Encode)?;
        let resp = self.transport.execute(&request).await?;
        if !resp.is_success() {
            return Err(ApiError::from_response(&resp));
        }
        resp.json().map_err(ApiError::Decode)
    }
}

#[async_trait]
impl TokenExchange for AuthApi {
    async fn exchange(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        self.refresh(refresh_token).await
    }
}

/// Session lifecycle used by screens: sign-in state, login, signup, sign-out.
///
/// Writes go through the refresh coordinator so a refresh that is still in
/// flight cannot bring back a session that was ended or replaced.
pub struct AuthSession {
    auth: Arc<AuthApi>,
    store: Arc<dyn CredentialStore>,
    refresh: Arc<RefreshCoordinator>,
}

impl AuthSession {
    pub fn new(
        auth: Arc<AuthApi>,
        store: Arc<dyn CredentialStore>,
        refresh: Arc<RefreshCoordinator>,
    ) -> Self {
        Self {
            auth,
            store,
            refresh,
        }
    }

    /// Whether an access token is stored. Store failures read as signed out.
    pub fn is_logged_in(&self) -> bool {
        match self.store.get_access() {
            Ok(token) => token.is_some(),
            Err(e) => {
                log::warn!("Failed to read access token: {}", e);
                false
            }
        }
    }

    /// Persist a freshly issued token pair.
    pub fn sign_in(&self, tokens: &TokenPair) -> Result<(), ApiError> {
        self.refresh.replace_session(tokens)?;
        Ok(())
    }

    /// Log in with email and password and persist the session.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginUser, ApiError> {
        log::info!("Logging in");
        let resp = self
            .auth
            .login(&LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            })
            .await?;
        self.sign_in(&resp.tokens)?;
        log::info!("Login complete for user {}", resp.user.id);
        Ok(resp.user)
    }

    /// Create an account and persist the session it returns.
    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        nickname: &str,
    ) -> Result<SignupUser, ApiError> {
        log::info!("Signing up");
        let resp = self
            .auth
            .signup(&SignupRequest {
                email: email.to_string(),
                password: password.to_string(),
                nickname: nickname.to_string(),
            })
            .await?;
        self.sign_in(&resp.tokens)?;
        log::info!("Signup complete for user {}", resp.user.id);
        Ok(resp.user)
    }

    /// Revoke the refresh token (best-effort) and clear local credentials.
    pub async fn sign_out(&self) -> Result<(), ApiError> {
        log::info!("Signing out");
        match self.store.get_refresh() {
            Ok(Some(refresh_token)) => {
                if let Err(e) = self.auth.logout(&refresh_token).await {
                    log::warn!("Logout request failed (will continue local cleanup): {}", e);
                }
            }
            Ok(None) => {}
            Err(e) => log::warn!("Failed to read refresh token for logout: {}", e),
        }
        self.refresh.end_session()?;
        log::info!("Sign-out complete");
        Ok(())
    }
}
