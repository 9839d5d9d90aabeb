//! Vault session: the one place the live encryption key exists
//!
//! The key is installed on a successful unlock and dropped (zeroized by
//! its `Drop` impl) on lock, logout, auto-lock, or re-encryption — every
//! exit path, including errors, ends in the same drop. Callers never
//! hold the key; they borrow it for the duration of a closure via
//! [`VaultSession::with_key`].

use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use cask_core::{CaskError, CaskResult};
use cask_crypto::VaultKey;

use crate::lockout::LockoutState;

#[derive(Default)]
struct SessionInner {
    key: Option<VaultKey>,
    /// True when the installed key came from the degraded KDF fallback
    degraded: bool,
    lockout: LockoutState,
}

#[derive(Default)]
pub struct VaultSession {
    inner: Mutex<SessionInner>,
}

impl VaultSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_unlocked(&self) -> bool {
        self.inner.lock().await.key.is_some()
    }

    /// True when the current session key was produced by the degraded
    /// KDF fallback rather than Argon2id.
    pub async fn is_degraded(&self) -> bool {
        let inner = self.inner.lock().await;
        inner.key.is_some() && inner.degraded
    }

    /// Install the encryption key after a successful unlock, replacing
    /// (and thereby zeroizing) any previous key.
    pub(crate) async fn install_key(&self, key: VaultKey, degraded: bool) {
        let mut inner = self.inner.lock().await;
        inner.key = Some(key);
        inner.degraded = degraded;
        if degraded {
            tracing::warn!("session key derived via degraded KDF fallback");
        }
    }

    /// Drop the session key. The key's `Drop` impl zeroizes it.
    pub async fn lock(&self) {
        let mut inner = self.inner.lock().await;
        if inner.key.take().is_some() {
            tracing::info!("vault locked");
        }
        inner.degraded = false;
    }

    /// Borrow the session key for one scoped operation.
    pub async fn with_key<R>(
        &self,
        f: impl FnOnce(&VaultKey) -> CaskResult<R>,
    ) -> CaskResult<R> {
        let inner = self.inner.lock().await;
        match &inner.key {
            Some(key) => f(key),
            None => Err(CaskError::SessionLocked),
        }
    }

    /// Reject the attempt if a lockout cool-down is active. Called
    /// before any key derivation, for both unlock paths.
    pub async fn check_lockout(&self) -> CaskResult<()> {
        self.inner
            .lock()
            .await
            .lockout
            .check(Instant::now())
            .map_err(|retry_after_secs| CaskError::LockoutActive { retry_after_secs })
    }

    pub async fn record_failure(&self) {
        self.inner.lock().await.lockout.record_failure(Instant::now());
    }

    pub async fn record_success(&self) {
        self.inner.lock().await.lockout.record_success();
    }

    /// Lifecycle signal: the app spent `elapsed` in the background. Lock
    /// when the configured threshold is crossed.
    pub async fn on_background(&self, elapsed: Duration, auto_lock_after: Duration) {
        if elapsed >= auto_lock_after {
            tracing::info!(elapsed_secs = elapsed.as_secs(), "auto-lock threshold crossed");
            self.lock().await;
        }
    }
}
