//! Credential storage for the access/refresh token pair.
//!
//! `KeyringStore` keeps both tokens in the OS keychain via the `keyring` crate.
//! `MemoryStore` keeps them in process memory only and wipes them on clear.
//!
//! Only login/signup, the refresh coordinator, and sign-out write to a store.

use std::sync::{PoisonError, RwLock};

use keyring::Entry;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Keychain service name matching the app identifier.
pub const SERVICE_NAME: &str = "com.myrecipe.app";

const ACCESS_KEY: &str = "accessToken";
const REFRESH_KEY: &str = "refreshToken";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Keychain operation failed: {0}")]
    OperationFailed(String),
    /// The write reported success but the value could not be read back.
    #[error("Keychain did not keep the {0} entry")]
    NotPersisted(&'static str),
}

impl From<keyring::Error> for StoreError {
    fn from(err: keyring::Error) -> Self {
        StoreError::OperationFailed(err.to_string())
    }
}

/// Durable key-value capability holding the current session tokens.
///
/// Implementations must replace and remove the pair together.
pub trait CredentialStore: Send + Sync {
    /// Current access token, `None` when signed out.
    fn get_access(&self) -> Result<Option<String>, StoreError>;

    /// Current refresh token, `None` when signed out.
    fn get_refresh(&self) -> Result<Option<String>, StoreError>;

    /// Replace both tokens.
    fn set_tokens(&self, access: &str, refresh: &str) -> Result<(), StoreError>;

    /// Remove both tokens. Idempotent.
    fn clear(&self) -> Result<(), StoreError>;
}

/// Tokens persisted in the OS keychain.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    /// Use a custom keychain service name (one per environment/profile).
    pub fn with_service(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StoreError> {
        Ok(Entry::new(&self.service, key)?)
    }

    /// Returns `None` if no entry exists.
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StoreError::from(e)),
        }
    }

    /// Write `value` and read it back through a fresh entry. Backends without
    /// persistent storage report success on write and lose the value.
    fn write(&self, key: &'static str, value: &str) -> Result<(), StoreError> {
        self.entry(key)?.set_password(value)?;
        match self.read(key)? {
            Some(stored) if stored == value => Ok(()),
            _ => Err(StoreError::NotPersisted(key)),
        }
    }

    /// Idempotent: ignores `NoEntry`.
    fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StoreError::from(e)),
        }
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeyringStore {
    fn get_access(&self) -> Result<Option<String>, StoreError> {
        self.read(ACCESS_KEY)
    }

    fn get_refresh(&self) -> Result<Option<String>, StoreError> {
        self.read(REFRESH_KEY)
    }

    fn set_tokens(&self, access: &str, refresh: &str) -> Result<(), StoreError> {
        if let Err(e) = self.write(ACCESS_KEY, access) {
            // A failed write may still have replaced the old access token.
            if let Err(cleanup) = self.clear() {
                log::warn!("Failed to clear keychain after write error: {}", cleanup);
            }
            return Err(e);
        }
        if let Err(e) = self.write(REFRESH_KEY, refresh) {
            // Never leave a new access token paired with a stale refresh token.
            if let Err(cleanup) = self.clear() {
                log::warn!("Failed to clear keychain after write error: {}", cleanup);
            }
            return Err(e);
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let access = self.delete(ACCESS_KEY);
        let refresh = self.delete(REFRESH_KEY);
        access.and(refresh)
    }
}

#[derive(Zeroize, ZeroizeOnDrop)]
struct StoredPair {
    access: String,
    refresh: String,
}

/// Tokens held in memory only. Wiped on `clear` and on drop.
#[derive(Default)]
pub struct MemoryStore {
    session: RwLock<Option<StoredPair>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an existing session.
    pub fn with_tokens(access: &str, refresh: &str) -> Self {
        Self {
            session: RwLock::new(Some(StoredPair {
                access: access.to_string(),
                refresh: refresh.to_string(),
            })),
        }
    }
}

impl CredentialStore for MemoryStore {
    fn get_access(&self) -> Result<Option<String>, StoreError> {
        let guard = self.session.read().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.as_ref().map(|pair| pair.access.clone()))
    }

    fn get_refresh(&self) -> Result<Option<String>, StoreError> {
        let guard = self.session.read().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.as_ref().map(|pair| pair.refresh.clone()))
    }

    fn set_tokens(&self, access: &str, refresh: &str) -> Result<(), StoreError> {
        let mut guard = self.session.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(StoredPair {
            access: access.to_string(),
            refresh: refresh.to_string(),
        });
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut guard = self.session.write().unwrap_or_else(PoisonError::into_inner);
        *guard = None;
        Ok(())
    }
}
