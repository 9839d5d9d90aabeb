//! The vault: setup, unlock paths, and key-wrap enrollment
//!
//! `Vault` owns the persisted header, the record store, the session, and
//! the key-wrap manager. Unlock is cancellable and runs the KDF off the
//! caller's thread; a cancelled derivation's key is dropped (and
//! zeroized) the moment the blocking task finishes.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use zeroize::Zeroize;

use cask_core::config::CaskConfig;
use cask_core::{CaskError, CaskResult, RecordEnvelope, VaultRecord};
use cask_crypto::{
    calibrate, check_verifier, create_verifier, derive_keypair, generate_salt, open, DerivedKey,
    KdfParams, VaultHeader,
};
use cask_keywrap::{BiometricPrompt, HardwareKeyStore, KeyWrapManager};
use cask_store::RecordStore;

use crate::session::VaultSession;

pub struct Vault<S, H, B> {
    pub(crate) header_path: PathBuf,
    pub(crate) header: RwLock<VaultHeader>,
    pub(crate) store: S,
    pub(crate) session: VaultSession,
    pub(crate) keywrap: KeyWrapManager<H, B>,
    /// Record CRUD holds this for read; rotation holds it for write.
    pub(crate) ops_gate: RwLock<()>,
    pub(crate) auto_lock_after: Duration,
}

impl<S, H, B> Vault<S, H, B>
where
    S: RecordStore,
    H: HardwareKeyStore,
    B: BiometricPrompt,
{
    /// Create a brand-new vault: random salt, calibrated KDF costs,
    /// fresh verifier. The session comes back unlocked.
    ///
    /// Setting `calibrate_target_ms` to 0 skips the hardware benchmark
    /// and uses the configured costs as-is.
    pub async fn setup(
        header_path: impl Into<PathBuf>,
        config: &CaskConfig,
        store: S,
        keywrap: KeyWrapManager<H, B>,
        password: SecretString,
    ) -> CaskResult<Self> {
        let header_path = header_path.into();
        let salt = generate_salt();

        let base = KdfParams {
            time_cost: config.crypto.argon2_time_cost,
            mem_cost_kib: config.crypto.argon2_mem_cost_kib,
            parallelism: config.crypto.argon2_parallelism,
        };
        let target_ms = config.crypto.calibrate_target_ms;

        let (params, verification, encryption) =
            tokio::task::spawn_blocking(move || -> CaskResult<_> {
                let params = if target_ms == 0 {
                    base
                } else {
                    calibrate(target_ms, &base)
                };
                let (verification, encryption) = derive_keypair(&password, &salt, &params)?;
                Ok((params, verification, encryption))
            })
            .await
            .map_err(|e| CaskError::KeyDerivationFailure(format!("derivation task: {e}")))??;

        let verifier = create_verifier(&verification.key)?;
        let header = VaultHeader::new(salt, &params, verifier, verification.degraded);
        header.save(&header_path).await?;

        tracing::info!(time_cost = params.time_cost, "vault initialized");

        let session = VaultSession::new();
        session.install_key(encryption.key, encryption.degraded).await;

        Ok(Self {
            header_path,
            header: RwLock::new(header),
            store,
            session,
            keywrap,
            ops_gate: RwLock::new(()),
            auto_lock_after: Duration::from_secs(config.session.auto_lock_secs),
        })
    }

    /// Open an existing vault in the locked state.
    pub async fn open(
        header_path: impl Into<PathBuf>,
        config: &CaskConfig,
        store: S,
        keywrap: KeyWrapManager<H, B>,
    ) -> CaskResult<Self> {
        let header_path = header_path.into();
        let header = VaultHeader::load(&header_path).await?;

        keywrap.load_envelope(header.biometric_envelope.clone()).await;

        Ok(Self {
            header_path,
            header: RwLock::new(header),
            store,
            session: VaultSession::new(),
            keywrap,
            ops_gate: RwLock::new(()),
            auto_lock_after: Duration::from_secs(config.session.auto_lock_secs),
        })
    }

    pub async fn is_unlocked(&self) -> bool {
        self.session.is_unlocked().await
    }

    /// Unlock with the master password.
    ///
    /// Checks the lockout before deriving anything, runs both sub-key
    /// derivations off-thread, and authenticates the attempt solely
    /// through the verifier blob. Cancellation abandons the attempt; the
    /// derived keys are dropped and zeroized when the blocking task
    /// completes.
    pub async fn unlock_with_password(
        &self,
        password: SecretString,
        cancel: &CancellationToken,
    ) -> CaskResult<()> {
        self.session.check_lockout().await?;

        let (salt, params, verifier) = {
            let header = self.header.read().await;
            (header.salt, header.kdf_params(), header.verifier())
        };

        let derived = tokio::select! {
            _ = cancel.cancelled() => return Err(CaskError::Cancelled),
            joined = tokio::task::spawn_blocking(move || derive_keypair(&password, &salt, &params)) => {
                joined.map_err(|e| CaskError::KeyDerivationFailure(format!("derivation task: {e}")))??
            }
        };
        let (verification, encryption): (DerivedKey, DerivedKey) = derived;

        if !check_verifier(&verifier, &verification.key) {
            self.session.record_failure().await;
            return Err(CaskError::WrongPassword);
        }

        self.session.record_success().await;
        self.session.install_key(encryption.key, encryption.degraded).await;
        tracing::info!("vault unlocked with password");
        Ok(())
    }

    /// Unlock through the biometric key-wrap envelope. Returns false
    /// when the fast path is unavailable (not enrolled, cancelled, or
    /// invalidated — in which case the stale envelope has already been
    /// purged) and the caller should fall back to the password path.
    pub async fn unlock_with_biometric(&self) -> CaskResult<bool> {
        self.session.check_lockout().await?;

        let result = self.keywrap.unlock().await;
        // The manager may have purged an invalidated envelope; keep the
        // persisted header in sync either way.
        self.sync_keywrap_envelope().await?;

        match result? {
            Some(key) => {
                self.session.record_success().await;
                self.session.install_key(key, false).await;
                tracing::info!("vault unlocked with biometrics");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Wrap the live session key for biometric unlock and persist the
    /// envelope. Requires an unlocked session and a fresh assertion.
    pub async fn enable_biometric(&self) -> CaskResult<()> {
        let key = self.session.with_key(|k| Ok(k.clone())).await?;
        self.keywrap.enable(&key).await?;
        self.sync_keywrap_envelope().await
    }

    /// Remove the envelope and the hardware secret behind it.
    pub async fn disable_biometric(&self) -> CaskResult<()> {
        self.keywrap.disable().await?;
        self.sync_keywrap_envelope().await
    }

    pub async fn biometric_enabled(&self) -> bool {
        self.keywrap.is_enabled().await
    }

    /// Drop the session key. Always succeeds; the key is zeroized by its
    /// Drop impl.
    pub async fn lock(&self) {
        self.session.lock().await;
    }

    /// Lifecycle signal from the host: the app was backgrounded for
    /// `elapsed`. Locks when the auto-lock threshold is crossed.
    pub async fn on_background(&self, elapsed: Duration) {
        self.session.on_background(elapsed, self.auto_lock_after).await;
    }

    /// True when the current session key came from the degraded KDF
    /// fallback — surfaced so audits can flag the event.
    pub async fn kdf_degraded(&self) -> bool {
        self.session.is_degraded().await || self.header.read().await.kdf_degraded
    }

    pub(crate) async fn sync_keywrap_envelope(&self) -> CaskResult<()> {
        let current = self.keywrap.envelope().await;
        let mut header = self.header.write().await;
        if header.biometric_envelope != current {
            header.biometric_envelope = current;
            header.save(&self.header_path).await?;
        }
        Ok(())
    }

    /// Decrypt a record's envelope under the session key. The returned
    /// envelope zeroizes itself on drop.
    pub(crate) async fn decrypt_envelope(&self, record: &VaultRecord) -> CaskResult<RecordEnvelope> {
        let mut plaintext = self.session.with_key(|k| open(k, &record.payload)).await?;
        let envelope = serde_json::from_slice(&plaintext);
        plaintext.zeroize();
        Ok(envelope?)
    }
}
