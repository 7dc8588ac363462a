// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access token lifecycle.
//!
//! [`TokenManager`] owns the in-memory access credential and keeps it
//! usable:
//! - Proactive refresh when the token expires within the safety margin
//! - At most one refresh call in flight; concurrent callers share its outcome
//! - Persistence of every login/refresh, removal on logout

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};

use crate::client::api::{ApiError, AuthApi};
use crate::db::{LocalStore, StoreError};
use crate::models::{AccessCredential, LoginRequest};
use crate::time_utils::now_millis;

/// Durable storage for the access credential.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<AccessCredential>, StoreError>;
    fn save(&self, credential: &AccessCredential) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

impl CredentialStore for LocalStore {
    fn load(&self) -> Result<Option<AccessCredential>, StoreError> {
        self.load_credential()
    }

    fn save(&self, credential: &AccessCredential) -> Result<(), StoreError> {
        self.save_credential(credential)
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.clear_credential()
    }
}

/// Login failures.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Login failed: {0}")]
    Api(#[from] ApiError),

    #[error("Failed to persist credential: {0}")]
    Store(#[from] StoreError),
}

type PendingRefresh = Shared<BoxFuture<'static, bool>>;

struct Inner {
    api: Arc<dyn AuthApi>,
    store: Arc<dyn CredentialStore>,
    margin_ms: i64,
    credential: RwLock<AccessCredential>,
    /// The refresh currently in flight, if any.
    in_flight: Mutex<Option<PendingRefresh>>,
}

/// Owner of the access credential.
///
/// Constructed once at startup and handed to everything that needs
/// authorized access. Clones share the same state.
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<Inner>,
}

impl TokenManager {
    pub fn new(
        api: Arc<dyn AuthApi>,
        store: Arc<dyn CredentialStore>,
        refresh_margin: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                store,
                margin_ms: refresh_margin.as_millis() as i64,
                credential: RwLock::new(AccessCredential::default()),
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// Load the persisted credential, if any. Returns whether one was found.
    pub fn restore(&self) -> Result<bool, StoreError> {
        match self.inner.store.load()? {
            Some(credential) if !credential.is_logged_out() => {
                tracing::debug!(expires_at_ms = credential.expires_at_ms, "Restored access token");
                *self.inner.write() = credential;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Snapshot of the current credential.
    pub fn credential(&self) -> AccessCredential {
        self.inner.read().clone()
    }

    /// Current bearer token, if logged in.
    pub fn bearer(&self) -> Option<String> {
        let credential = self.inner.read();
        (!credential.is_logged_out()).then(|| credential.token.clone())
    }

    pub fn user_reference(&self) -> Option<i64> {
        self.inner.read().user_reference
    }

    pub fn is_logged_in(&self) -> bool {
        !self.inner.read().is_logged_out()
    }

    /// Log in and store the returned credential.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), AuthError> {
        let response = self
            .inner
            .api
            .login(&LoginRequest {
                username: username.to_string(),
                password: password.to_string(),
            })
            .await?;

        let credential = AccessCredential::issued_now(
            response.access_token,
            response.expires_in,
            response.user_reference,
        );
        self.inner.replace(credential)?;

        tracing::info!(expires_in = response.expires_in, "Logged in");
        Ok(())
    }

    /// Forget the credential. Never calls the server.
    pub fn logout(&self) {
        *self.inner.write() = AccessCredential::default();
        if let Err(e) = self.inner.store.clear() {
            tracing::warn!(error = %e, "Failed to remove persisted credential");
        }
        tracing::info!("Logged out");
    }

    /// Make sure an authorized request may proceed.
    ///
    /// - Never logged in: false, no I/O.
    /// - Token valid beyond the margin: true, no I/O.
    /// - Otherwise: one refresh (shared with any concurrent caller).
    ///   On failure the stored credential is left untouched.
    pub async fn ensure_valid(&self) -> bool {
        let credential = self.credential();
        if credential.is_logged_out() {
            return false;
        }
        if credential.remaining_ms(now_millis()) > self.inner.margin_ms {
            return true;
        }

        tracing::debug!("Access token expiring, refreshing");
        self.join_refresh().await
    }

    /// Refresh after the server rejected `rejected_token`.
    ///
    /// If the token was already replaced since that request was sent, the
    /// new one is used without another refresh.
    pub async fn refresh_rejected(&self, rejected_token: &str) -> bool {
        let credential = self.credential();
        if credential.is_logged_out() {
            return false;
        }
        if credential.token != rejected_token {
            return true;
        }
        self.join_refresh().await
    }

    /// Join the in-flight refresh or start one.
    fn join_refresh(&self) -> PendingRefresh {
        let mut slot = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(pending) = slot.as_ref() {
            return pending.clone();
        }

        let inner = Arc::clone(&self.inner);
        let pending = async move {
            let refreshed = inner.refresh_once().await;
            inner
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            refreshed
        }
        .boxed()
        .shared();

        *slot = Some(pending.clone());
        pending
    }
}

impl Inner {
    fn read(&self) -> std::sync::RwLockReadGuard<'_, AccessCredential> {
        self.credential.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, AccessCredential> {
        self.credential.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Swap in a new credential and persist it.
    fn replace(&self, credential: AccessCredential) -> Result<(), StoreError> {
        *self.write() = credential.clone();
        self.store.save(&credential)
    }

    async fn refresh_once(&self) -> bool {
        let response = match self.api.refresh().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed");
                return false;
            }
        };

        let user_reference = {
            let current = self.read();
            if current.is_logged_out() {
                // Logged out while the refresh was in flight.
                return false;
            }
            current.user_reference
        };

        let credential = AccessCredential::issued_now(
            response.access_token,
            response.expires_in,
            user_reference,
        );
        if let Err(e) = self.replace(credential) {
            tracing::warn!(error = %e, "Failed to persist refreshed token");
        }

        tracing::info!(expires_in = response.expires_in, "Access token refreshed");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LoginResponse, TokenResponse};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockAuth {
        refresh_calls: AtomicUsize,
        refresh_ok: bool,
        delay: Duration,
    }

    impl MockAuth {
        fn new(refresh_ok: bool, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                refresh_calls: AtomicUsize::new(0),
                refresh_ok,
                delay,
            })
        }

        fn calls(&self) -> usize {
            self.refresh_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AuthApi for MockAuth {
        async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError> {
            if request.password == "pass" {
                Ok(LoginResponse {
                    access_token: "login-token".to_string(),
                    expires_in: 3600,
                    user_reference: Some(12),
                })
            } else {
                Err(ApiError::Unauthorized)
            }
        }

        async fn refresh(&self) -> Result<TokenResponse, ApiError> {
            let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.delay).await;
            if self.refresh_ok {
                Ok(TokenResponse {
                    access_token: format!("refreshed-{}", n),
                    expires_in: 3600,
                })
            } else {
                Err(ApiError::Unauthorized)
            }
        }
    }

    fn manager_with(auth: Arc<MockAuth>, expires_in_ms: Option<i64>) -> (TokenManager, LocalStore) {
        let store = LocalStore::open_in_memory().unwrap();
        if let Some(ms) = expires_in_ms {
            store
                .save_credential(&AccessCredential {
                    token: "old-token".to_string(),
                    expires_at_ms: now_millis() + ms,
                    user_reference: Some(12),
                })
                .unwrap();
        }
        let manager = TokenManager::new(
            auth,
            Arc::new(store.clone()),
            Duration::from_secs(30),
        );
        manager.restore().unwrap();
        (manager, store)
    }

    #[tokio::test]
    async fn test_no_token_returns_false_without_io() {
        let auth = MockAuth::new(true, Duration::ZERO);
        let (manager, _) = manager_with(auth.clone(), None);

        assert!(!manager.ensure_valid().await);
        assert_eq!(auth.calls(), 0);
    }

    #[tokio::test]
    async fn test_fresh_token_needs_no_refresh() {
        let auth = MockAuth::new(true, Duration::ZERO);
        let (manager, _) = manager_with(auth.clone(), Some(60_000));

        assert!(manager.ensure_valid().await);
        assert_eq!(auth.calls(), 0);
        assert_eq!(manager.bearer().as_deref(), Some("old-token"));
    }

    #[tokio::test]
    async fn test_expiring_token_refreshes_once_and_persists() {
        let auth = MockAuth::new(true, Duration::ZERO);
        let (manager, store) = manager_with(auth.clone(), Some(10_000));

        assert!(manager.ensure_valid().await);
        assert_eq!(auth.calls(), 1);
        assert_eq!(manager.bearer().as_deref(), Some("refreshed-1"));
        assert_eq!(manager.user_reference(), Some(12));

        let persisted = store.load_credential().unwrap().unwrap();
        assert_eq!(persisted.token, "refreshed-1");

        // Now valid for an hour: no further calls.
        assert!(manager.ensure_valid().await);
        assert_eq!(auth.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_leaves_state_untouched() {
        let auth = MockAuth::new(false, Duration::ZERO);
        let (manager, _) = manager_with(auth.clone(), Some(10_000));
        let before = manager.credential();

        assert!(!manager.ensure_valid().await);
        assert_eq!(auth.calls(), 1);
        assert_eq!(manager.credential(), before);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let auth = MockAuth::new(true, Duration::from_millis(50));
        let (manager, _) = manager_with(auth.clone(), Some(5_000));

        let results = futures_util::future::join_all(
            (0..8).map(|_| {
                let m = manager.clone();
                async move { m.ensure_valid().await }
            }),
        )
        .await;

        assert!(results.iter().all(|ok| *ok));
        assert_eq!(auth.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_failure() {
        let auth = MockAuth::new(false, Duration::from_millis(50));
        let (manager, _) = manager_with(auth.clone(), Some(5_000));

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let m = manager.clone();
                tokio::spawn(async move { m.ensure_valid().await })
            })
            .collect();

        for task in tasks {
            assert!(!task.await.unwrap());
        }
        assert_eq!(auth.calls(), 1);

        // The guard is cleared once settled, so a later call tries again.
        assert!(!manager.ensure_valid().await);
        assert_eq!(auth.calls(), 2);
    }

    #[tokio::test]
    async fn test_refresh_rejected_skips_when_already_rotated() {
        let auth = MockAuth::new(true, Duration::ZERO);
        let (manager, _) = manager_with(auth.clone(), Some(60_000));

        assert!(manager.refresh_rejected("some-older-token").await);
        assert_eq!(auth.calls(), 0);

        assert!(manager.refresh_rejected("old-token").await);
        assert_eq!(auth.calls(), 1);
    }

    #[tokio::test]
    async fn test_login_then_logout() {
        let auth = MockAuth::new(true, Duration::ZERO);
        let (manager, store) = manager_with(auth, None);

        assert!(matches!(
            manager.login("user", "wrong").await,
            Err(AuthError::Api(ApiError::Unauthorized))
        ));
        assert!(!manager.is_logged_in());

        manager.login("user", "pass").await.unwrap();
        assert!(manager.is_logged_in());
        assert_eq!(manager.user_reference(), Some(12));
        assert!(store.load_credential().unwrap().is_some());

        manager.logout();
        assert!(!manager.is_logged_in());
        assert_eq!(manager.credential().expires_at_ms, 0);
        assert!(store.load_credential().unwrap().is_none());
        assert!(!manager.ensure_valid().await);
    }
}
