//! Single-flight token refresh coordination
//!
//! Every request that observes a 401 lands here. The first one becomes the
//! driver and performs the actual refresh call; the rest queue up and are
//! handed the shared outcome when the call settles. At most one refresh HTTP
//! call is ever in flight, and no waiter is left pending: success and failure
//! are both broadcast, in arrival order.
//!
//! The coordinator owns the state machine and the session mutation; the
//! actual HTTP call is injected as a closure so this module has no transport
//! dependency and can be tested with plain futures.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::session::SessionStore;
use crate::types::RefreshResponse;

type RefreshOutcome = Result<String, ApiError>;

/// Refresh state machine
///
/// The waiter queue lives inside the `Refreshing` variant, so "waiters exist"
/// implies "a refresh is in flight" by construction, and a `mem::replace`
/// back to `Idle` drains the queue exactly once.
enum RefreshState {
    Idle,
    Refreshing(Vec<oneshot::Sender<RefreshOutcome>>),
}

/// Coordinates token refresh across concurrent requests
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
    store: Arc<dyn SessionStore>,
}

impl RefreshCoordinator {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { state: Mutex::new(RefreshState::Idle), store }
    }

    /// Resolve a 401 by obtaining a fresh access token
    ///
    /// If no refresh is running, this caller drives one via `do_refresh` and
    /// broadcasts the outcome. If one is already running, the caller queues
    /// behind it and receives the same outcome without a second network call.
    ///
    /// # Errors
    /// Returns [`ApiError::RefreshFailed`] when no refresh token is stored,
    /// when the refresh call fails, or when the new tokens cannot be
    /// persisted. On any of these the session has been cleared.
    pub async fn coordinate<F, Fut>(&self, do_refresh: F) -> RefreshOutcome
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<RefreshResponse, ApiError>>,
    {
        let waiter = {
            let mut state = self.state.lock().await;
            match &mut *state {
                RefreshState::Refreshing(waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Some(rx)
                }
                RefreshState::Idle => {
                    *state = RefreshState::Refreshing(Vec::new());
                    None
                }
            }
        };

        if let Some(rx) = waiter {
            debug!("refresh already in flight, queueing behind it");
            return rx.await.unwrap_or_else(|_| {
                // Driver dropped without settling; should not happen, but a
                // hung waiter would be worse than a spurious failure.
                Err(ApiError::RefreshFailed { reason: "refresh was abandoned".to_string() })
            });
        }

        let outcome = self.refresh_once(do_refresh).await;

        // Settle: back to Idle unconditionally, then notify in arrival order.
        let waiters = {
            let mut state = self.state.lock().await;
            match std::mem::replace(&mut *state, RefreshState::Idle) {
                RefreshState::Refreshing(waiters) => waiters,
                RefreshState::Idle => Vec::new(),
            }
        };
        debug!(waiters = waiters.len(), ok = outcome.is_ok(), "refresh settled");
        for tx in waiters {
            let _ = tx.send(outcome.clone());
        }

        outcome
    }

    /// Perform one refresh attempt directly, bypassing the queue
    ///
    /// Used by the manual `refresh()` operation on the client. Does not touch
    /// the coordinator state, so it can overlap with a coordinated refresh.
    ///
    /// # Errors
    /// Same failure modes as [`Self::coordinate`]
    pub async fn refresh_once<F, Fut>(&self, do_refresh: F) -> RefreshOutcome
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<RefreshResponse, ApiError>>,
    {
        let refresh_token = match self.store.get().await.refresh_token {
            Some(token) => token,
            None => {
                // Fail fast without contacting the network
                warn!("refresh requested but no refresh token is stored");
                self.clear_session().await;
                return Err(ApiError::RefreshFailed {
                    reason: "no refresh token available".to_string(),
                });
            }
        };

        match do_refresh(refresh_token).await {
            Ok(response) => {
                self.store
                    .set_tokens(response.access_token.clone(), response.refresh_token)
                    .await
                    .map_err(|e| ApiError::RefreshFailed {
                        reason: format!("failed to persist refreshed tokens: {e}"),
                    })?;
                info!("access token refreshed");
                Ok(response.access_token)
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed, clearing session");
                self.clear_session().await;
                Err(ApiError::RefreshFailed { reason: err.to_string() })
            }
        }
    }

    /// Terminal refresh failure destroys the session so subsequent calls run
    /// unauthenticated. Best effort: the refresh failure is what gets
    /// surfaced, not a storage hiccup during cleanup.
    async fn clear_session(&self) {
        if let Err(err) = self.store.clear().await {
            warn!(error = %err, "failed to clear session after refresh failure");
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the refresh state machine, using injected futures in
    //! place of HTTP calls.
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::testing::MemorySessionStore;

    fn store_with_tokens() -> Arc<MemorySessionStore> {
        Arc::new(MemorySessionStore::with_tokens("A1", Some("R1")))
    }

    #[tokio::test]
    async fn test_refresh_success_updates_session() {
        let store = store_with_tokens();
        let coordinator = RefreshCoordinator::new(store.clone());

        let token = coordinator
            .coordinate(|refresh_token| async move {
                assert_eq!(refresh_token, "R1");
                Ok(RefreshResponse { access_token: "A2".into(), refresh_token: None })
            })
            .await
            .unwrap();

        assert_eq!(token, "A2");
        let session = store.get().await;
        assert_eq!(session.access_token.as_deref(), Some("A2"));
        // No rotation supplied, previous refresh token kept
        assert_eq!(session.refresh_token.as_deref(), Some("R1"));
    }

    #[tokio::test]
    async fn test_refresh_rotates_refresh_token_when_supplied() {
        let store = store_with_tokens();
        let coordinator = RefreshCoordinator::new(store.clone());

        coordinator
            .coordinate(|_| async {
                Ok(RefreshResponse { access_token: "A2".into(), refresh_token: Some("R2".into()) })
            })
            .await
            .unwrap();

        assert_eq!(store.get().await.refresh_token.as_deref(), Some("R2"));
    }

    #[tokio::test]
    async fn test_no_refresh_token_fails_without_network() {
        let store = Arc::new(MemorySessionStore::with_tokens("A1", None));
        let coordinator = RefreshCoordinator::new(store.clone());

        let calls = AtomicUsize::new(0);
        let result = coordinator
            .coordinate(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(RefreshResponse { access_token: "A2".into(), refresh_token: None }) }
            })
            .await;

        assert!(matches!(result, Err(ApiError::RefreshFailed { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0, "must not contact the network");
        assert!(!store.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_failure_clears_session() {
        let store = store_with_tokens();
        let coordinator = RefreshCoordinator::new(store.clone());

        let result = coordinator
            .coordinate(|_| async {
                Err(ApiError::Http { status: 401, message: "refresh token revoked".into() })
            })
            .await;

        assert!(matches!(result, Err(ApiError::RefreshFailed { .. })));
        let session = store.get().await;
        assert!(session.access_token.is_none());
        assert!(session.refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let store = store_with_tokens();
        let coordinator = Arc::new(RefreshCoordinator::new(store));
        let calls = Arc::new(AtomicUsize::new(0));

        // The driver parks inside do_refresh until the other callers have had
        // a chance to queue up behind it.
        let mut handles = Vec::new();
        for _ in 0..5 {
            let coordinator = coordinator.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                coordinator
                    .coordinate(move |_| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                        Ok(RefreshResponse { access_token: "A2".into(), refresh_token: None })
                    })
                    .await
            }));
        }

        for handle in handles {
            let token = handle.await.unwrap().unwrap();
            assert_eq!(token, "A2");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1, "exactly one refresh call");
    }

    #[tokio::test]
    async fn test_concurrent_callers_all_see_failure() {
        let store = store_with_tokens();
        let coordinator = Arc::new(RefreshCoordinator::new(store.clone()));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let coordinator = coordinator.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                coordinator
                    .coordinate(move |_| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                        Err(ApiError::Network("connection reset".into()))
                    })
                    .await
            }));
        }

        // Every caller settles with the failure; none hang.
        for handle in handles {
            let result = handle.await.unwrap();
            assert!(matches!(result, Err(ApiError::RefreshFailed { .. })));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!store.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_coordinator_returns_to_idle_after_settlement() {
        let store = store_with_tokens();
        let coordinator = RefreshCoordinator::new(store.clone());

        let result = coordinator.coordinate(|_| async { Err(ApiError::Network("down".into())) }).await;
        assert!(result.is_err());

        // A later 401 drives a brand-new attempt (state went back to Idle),
        // which now fails fast because the failed refresh cleared the session.
        let calls = AtomicUsize::new(0);
        let result = coordinator
            .coordinate(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(RefreshResponse { access_token: "A3".into(), refresh_token: None }) }
            })
            .await;
        assert!(matches!(result, Err(ApiError::RefreshFailed { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
