//! Single-flight coordination of refresh-token exchanges.
//!
//! At most one `POST /api/auth/refresh` is outstanding at any time. Callers
//! that ask for a fresh token while an exchange is running join its waiter
//! list and are released with the same outcome once it resolves.
//!
//! The state check, the transition to `Refreshing`, and the waiter enqueue all
//! happen under one mutex acquisition with no `.await` in between.
//!
//! Explicit sign-in and sign-out also go through the coordinator. Each bumps
//! a session generation, and an exchange that started under an older
//! generation neither persists its pair nor clears the store.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::oneshot;

use super::credentials::{CredentialStore, StoreError};
use super::error::ApiError;
use super::types::TokenPair;

/// Why a fresh token could not be obtained. Shared by every waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    #[error("no refresh token stored")]
    MissingRefreshToken,
    #[error("refresh exchange failed: {0}")]
    Exchange(String),
    #[error("credential store failed during refresh: {0}")]
    Store(String),
    #[error("refresh was abandoned before it resolved")]
    Abandoned,
    #[error("session was signed out or replaced during refresh")]
    SessionChanged,
}

/// New access token, or the failure every waiter observes.
pub type RefreshOutcome = Result<String, RefreshError>;

/// Backend call that trades a refresh token for a new token pair.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn exchange(&self, refresh_token: &str) -> Result<TokenPair, ApiError>;
}

enum RefreshState {
    Idle,
    Refreshing(Vec<oneshot::Sender<RefreshOutcome>>),
}

/// Serializes refresh attempts into one exchange and fans out the result.
pub struct RefreshCoordinator {
    store: Arc<dyn CredentialStore>,
    exchange: Arc<dyn TokenExchange>,
    state: Mutex<RefreshState>,
    /// Session generation. Held while the store is written or cleared.
    generation: Mutex<u64>,
}

impl RefreshCoordinator {
    pub fn new(store: Arc<dyn CredentialStore>, exchange: Arc<dyn TokenExchange>) -> Self {
        Self {
            store,
            exchange,
            state: Mutex::new(RefreshState::Idle),
            generation: Mutex::new(0),
        }
    }

    /// Persist a newly issued pair (login or signup).
    ///
    /// An exchange still in flight will not overwrite it.
    pub fn replace_session(&self, tokens: &TokenPair) -> Result<(), StoreError> {
        let mut generation = self.lock_generation();
        *generation += 1;
        self.store.set_tokens(&tokens.access_token, &tokens.refresh_token)
    }

    /// Drop the stored pair (sign-out).
    ///
    /// An exchange still in flight resolves with `SessionChanged` and does not
    /// restore the session.
    pub fn end_session(&self) -> Result<(), StoreError> {
        let mut generation = self.lock_generation();
        *generation += 1;
        self.store.clear()
    }

    /// Whether an exchange is currently outstanding.
    pub fn is_refreshing(&self) -> bool {
        matches!(*self.lock_state(), RefreshState::Refreshing(_))
    }

    /// Number of callers waiting on the outstanding exchange.
    pub fn waiter_count(&self) -> usize {
        match &*self.lock_state() {
            RefreshState::Refreshing(waiters) => waiters.len(),
            RefreshState::Idle => 0,
        }
    }

    /// Get a new access token, performing the exchange only if no other
    /// caller already is.
    ///
    /// On success the new pair is persisted before any waiter is released.
    /// On failure the store is cleared and every waiter receives the same
    /// error.
    pub async fn obtain_fresh_token(&self) -> RefreshOutcome {
        let waiter = {
            let mut state = self.lock_state();
            match &mut *state {
                RefreshState::Refreshing(waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    log::debug!("Refresh already in flight, waiting ({} waiters)", waiters.len());
                    Some(rx)
                }
                RefreshState::Idle => {
                    *state = RefreshState::Refreshing(Vec::new());
                    None
                }
            }
        };

        if let Some(rx) = waiter {
            return rx.await.unwrap_or(Err(RefreshError::Abandoned));
        }

        let mut flight = InFlight {
            coordinator: self,
            resolved: false,
        };
        let outcome = self.run_exchange().await;
        flight.resolve(&outcome);
        outcome
    }

    async fn run_exchange(&self) -> RefreshOutcome {
        let started = *self.lock_generation();

        let refresh_token = match self.store.get_refresh() {
            Ok(Some(token)) => token,
            Ok(None) => return self.fail(started, RefreshError::MissingRefreshToken),
            Err(e) => return self.fail(started, RefreshError::Store(e.to_string())),
        };

        log::info!("Access token rejected, exchanging refresh token");
        let pair = match self.exchange.exchange(&refresh_token).await {
            Ok(pair) => pair,
            Err(e) => return self.fail(started, RefreshError::Exchange(e.to_string())),
        };

        let generation = self.lock_generation();
        if *generation != started {
            log::warn!("Session changed during refresh, discarding exchanged tokens");
            return Err(RefreshError::SessionChanged);
        }
        if let Err(e) = self.store.set_tokens(&pair.access_token, &pair.refresh_token) {
            drop(generation);
            return self.fail(started, RefreshError::Store(e.to_string()));
        }
        drop(generation);

        log::info!("Token refresh successful");
        Ok(pair.access_token)
    }

    /// Failure path: the session is unrecoverable, drop both tokens.
    ///
    /// A session that was replaced since `started` is left alone.
    fn fail(&self, started: u64, error: RefreshError) -> RefreshOutcome {
        let generation = self.lock_generation();
        if *generation != started {
            log::warn!("Token refresh failed after the session changed: {}", error);
            return Err(RefreshError::SessionChanged);
        }
        log::warn!("Token refresh failed, clearing session: {}", error);
        if let Err(e) = self.store.clear() {
            log::warn!("Failed to clear credential store: {}", e);
        }
        Err(error)
    }

    /// Return to `Idle` and hand `outcome` to every queued waiter.
    fn release(&self, outcome: &RefreshOutcome) {
        let waiters = {
            let mut state = self.lock_state();
            match std::mem::replace(&mut *state, RefreshState::Idle) {
                RefreshState::Refreshing(waiters) => waiters,
                RefreshState::Idle => Vec::new(),
            }
        };
        for waiter in waiters {
            // A dropped receiver means that caller was cancelled.
            let _ = waiter.send(outcome.clone());
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_generation(&self) -> MutexGuard<'_, u64> {
        self.generation.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Held by the caller performing the exchange. If that future is dropped
/// before resolving, waiters are released with `Abandoned` and the
/// coordinator returns to `Idle`.
struct InFlight<'a> {
    coordinator: &'a RefreshCoordinator,
    resolved: bool,
}

impl InFlight<'_> {
    fn resolve(&mut self, outcome: &RefreshOutcome) {
        self.resolved = true;
        self.coordinator.release(outcome);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            log::warn!("Refresh exchange cancelled, releasing waiters");
            self.coordinator.release(&Err(RefreshError::Abandoned));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use tokio::sync::Notify;

    use super::*;
    use crate::api::credentials::MemoryStore;
    use crate::api::transport::TransportError;

    // ── Mock exchanges ───────────────────────────────────────────────────

    /// Exchange that blocks until the gate opens, then returns a fixed pair
    /// (or a transport failure).
    struct GatedExchange {
        gate: Arc<Notify>,
        calls: AtomicU32,
        result: Result<TokenPair, ()>,
    }

    impl GatedExchange {
        fn succeeding(access: &str, refresh: &str) -> Self {
            Self {
                gate: Arc::new(Notify::new()),
                calls: AtomicU32::new(0),
                result: Ok(TokenPair {
                    access_token: access.to_string(),
                    refresh_token: refresh.to_string(),
                }),
            }
        }

        fn failing() -> Self {
            Self {
                gate: Arc::new(Notify::new()),
                calls: AtomicU32::new(0),
                result: Err(()),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenExchange for GatedExchange {
        async fn exchange(&self, _refresh_token: &str) -> Result<TokenPair, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            self.result.clone().map_err(|_| {
                ApiError::Transport(TransportError::Unreachable("connection reset".to_string()))
            })
        }
    }

    // ── Mock stores ──────────────────────────────────────────────────────

    /// Memory store whose reads or writes can be made to fail. Counts clears.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_reads: bool,
        fail_writes: bool,
        clears: AtomicU32,
    }

    impl FlakyStore {
        fn with_tokens(access: &str, refresh: &str) -> Self {
            Self {
                inner: MemoryStore::with_tokens(access, refresh),
                ..Self::default()
            }
        }

        fn clears(&self) -> u32 {
            self.clears.load(Ordering::SeqCst)
        }
    }

    impl CredentialStore for FlakyStore {
        fn get_access(&self) -> Result<Option<String>, StoreError> {
            self.inner.get_access()
        }

        fn get_refresh(&self) -> Result<Option<String>, StoreError> {
            if self.fail_reads {
                return Err(StoreError::OperationFailed("keychain locked".to_string()));
            }
            self.inner.get_refresh()
        }

        fn set_tokens(&self, access: &str, refresh: &str) -> Result<(), StoreError> {
            if self.fail_writes {
                return Err(StoreError::OperationFailed("disk full".to_string()));
            }
            self.inner.set_tokens(access, refresh)
        }

        fn clear(&self) -> Result<(), StoreError> {
            self.clears.fetch_add(1, Ordering::SeqCst);
            self.inner.clear()
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────────

    fn coordinator(
        store: Arc<MemoryStore>,
        exchange: Arc<GatedExchange>,
    ) -> RefreshCoordinator {
        RefreshCoordinator::new(store, exchange)
    }

    /// Yield until `n` callers are parked behind the in-flight exchange,
    /// then open the gate.
    async fn release_when_waiting(coord: &RefreshCoordinator, gate: &Notify, n: usize) {
        while coord.waiter_count() < n {
            tokio::task::yield_now().await;
        }
        gate.notify_one();
    }

    // ── Tests ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_concurrent_callers_share_one_exchange() {
        let store = Arc::new(MemoryStore::with_tokens("A1", "R1"));
        let exchange = Arc::new(GatedExchange::succeeding("A2", "R2"));
        let coord = coordinator(store.clone(), exchange.clone());

        let (a, b, c, d, ()) = tokio::join!(
            coord.obtain_fresh_token(),
            coord.obtain_fresh_token(),
            coord.obtain_fresh_token(),
            coord.obtain_fresh_token(),
            release_when_waiting(&coord, &exchange.gate, 3),
        );

        assert_eq!(exchange.calls(), 1);
        for outcome in [a, b, c, d] {
            assert_eq!(outcome, Ok("A2".to_string()));
        }
        assert_eq!(store.get_access().unwrap().as_deref(), Some("A2"));
        assert_eq!(store.get_refresh().unwrap().as_deref(), Some("R2"));
        assert!(!coord.is_refreshing());
    }

    #[tokio::test]
    async fn test_failure_fans_out_and_clears_store() {
        let store = Arc::new(MemoryStore::with_tokens("A1", "R1"));
        let exchange = Arc::new(GatedExchange::failing());
        let coord = coordinator(store.clone(), exchange.clone());

        let (a, b, c, ()) = tokio::join!(
            coord.obtain_fresh_token(),
            coord.obtain_fresh_token(),
            coord.obtain_fresh_token(),
            release_when_waiting(&coord, &exchange.gate, 2),
        );

        assert_eq!(exchange.calls(), 1);
        for outcome in [&a, &b, &c] {
            assert!(matches!(outcome, Err(RefreshError::Exchange(_))));
        }
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(store.get_access().unwrap(), None);
        assert_eq!(store.get_refresh().unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_refresh_token_skips_network() {
        let store = Arc::new(MemoryStore::new());
        let exchange = Arc::new(GatedExchange::succeeding("A2", "R2"));
        let coord = coordinator(store.clone(), exchange.clone());

        let outcome = coord.obtain_fresh_token().await;

        assert_eq!(outcome, Err(RefreshError::MissingRefreshToken));
        assert_eq!(exchange.calls(), 0);
        assert!(!coord.is_refreshing());
    }

    #[tokio::test]
    async fn test_sequential_refreshes_each_exchange() {
        let store = Arc::new(MemoryStore::with_tokens("A1", "R1"));
        let exchange = Arc::new(GatedExchange::succeeding("A2", "R2"));
        let coord = coordinator(store.clone(), exchange.clone());

        exchange.gate.notify_one();
        assert_eq!(coord.obtain_fresh_token().await, Ok("A2".to_string()));
        exchange.gate.notify_one();
        assert_eq!(coord.obtain_fresh_token().await, Ok("A2".to_string()));

        assert_eq!(exchange.calls(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_initiator_releases_waiters() {
        let store = Arc::new(MemoryStore::with_tokens("A1", "R1"));
        let exchange = Arc::new(GatedExchange::succeeding("A2", "R2"));
        let coord = coordinator(store.clone(), exchange.clone());

        // The initiator times out while the gate is closed; the waiter that
        // joined behind it must still be released.
        let (initiator, waiter) = tokio::join!(
            tokio::time::timeout(Duration::from_millis(20), coord.obtain_fresh_token()),
            async {
                while !coord.is_refreshing() {
                    tokio::task::yield_now().await;
                }
                coord.obtain_fresh_token().await
            },
        );

        assert!(initiator.is_err());
        assert_eq!(waiter, Err(RefreshError::Abandoned));
        assert!(!coord.is_refreshing());
        // Outcome unknown: the stored session is left as it was.
        assert_eq!(store.get_refresh().unwrap().as_deref(), Some("R1"));

        exchange.gate.notify_one();
        assert_eq!(coord.obtain_fresh_token().await, Ok("A2".to_string()));
        assert_eq!(exchange.calls(), 2);
    }

    #[tokio::test]
    async fn test_store_write_failure_fans_out_and_clears() {
        let mut store = FlakyStore::with_tokens("A1", "R1");
        store.fail_writes = true;
        let store = Arc::new(store);
        let exchange = Arc::new(GatedExchange::succeeding("A2", "R2"));
        let coord = RefreshCoordinator::new(store.clone(), exchange.clone());

        let (a, b, c, ()) = tokio::join!(
            coord.obtain_fresh_token(),
            coord.obtain_fresh_token(),
            coord.obtain_fresh_token(),
            release_when_waiting(&coord, &exchange.gate, 2),
        );

        assert_eq!(exchange.calls(), 1);
        assert!(matches!(a, Err(RefreshError::Store(_))));
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(store.clears(), 1);
        assert_eq!(store.get_access().unwrap(), None);
        assert_eq!(store.get_refresh().unwrap(), None);
        assert!(!coord.is_refreshing());
    }

    #[tokio::test]
    async fn test_store_read_failure_skips_network_and_clears() {
        let mut store = FlakyStore::with_tokens("A1", "R1");
        store.fail_reads = true;
        let store = Arc::new(store);
        let exchange = Arc::new(GatedExchange::succeeding("A2", "R2"));
        let coord = RefreshCoordinator::new(store.clone(), exchange.clone());

        let outcome = coord.obtain_fresh_token().await;

        assert!(matches!(outcome, Err(RefreshError::Store(_))));
        assert_eq!(exchange.calls(), 0);
        assert_eq!(store.clears(), 1);
        assert_eq!(store.get_access().unwrap(), None);
        assert!(!coord.is_refreshing());
    }

    #[tokio::test]
    async fn test_sign_out_during_exchange_is_not_undone() {
        let store = Arc::new(MemoryStore::with_tokens("A1", "R1"));
        let exchange = Arc::new(GatedExchange::succeeding("A2", "R2"));
        let coord = coordinator(store.clone(), exchange.clone());

        let (outcome, ()) = tokio::join!(coord.obtain_fresh_token(), async {
            while exchange.calls() == 0 {
                tokio::task::yield_now().await;
            }
            coord.end_session().unwrap();
            exchange.gate.notify_one();
        });

        assert_eq!(outcome, Err(RefreshError::SessionChanged));
        assert_eq!(store.get_access().unwrap(), None);
        assert_eq!(store.get_refresh().unwrap(), None);
        assert!(!coord.is_refreshing());
    }

    #[tokio::test]
    async fn test_sign_in_during_exchange_keeps_new_session() {
        let store = Arc::new(MemoryStore::with_tokens("A1", "R1"));
        let exchange = Arc::new(GatedExchange::failing());
        let coord = coordinator(store.clone(), exchange.clone());

        let (outcome, ()) = tokio::join!(coord.obtain_fresh_token(), async {
            while exchange.calls() == 0 {
                tokio::task::yield_now().await;
            }
            coord
                .replace_session(&TokenPair {
                    access_token: "A9".to_string(),
                    refresh_token: "R9".to_string(),
                })
                .unwrap();
            exchange.gate.notify_one();
        });

        // The failed exchange belonged to the old session and must not wipe
        // the new one.
        assert_eq!(outcome, Err(RefreshError::SessionChanged));
        assert_eq!(store.get_access().unwrap().as_deref(), Some("A9"));
        assert_eq!(store.get_refresh().unwrap().as_deref(), Some("R9"));
    }
}
