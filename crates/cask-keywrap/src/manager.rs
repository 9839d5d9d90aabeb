//! Key-wrap manager: the biometric fast-unlock state machine
//!
//! States: `Disabled → Enrolling → Enabled → (Invalidated → Disabled)`.
//! Enrollment wraps the live session key under a hardware-resident
//! secret; unlock asks for a fresh biometric assertion and unwraps. An
//! invalidated or undecryptable envelope is purged on the spot — the
//! manager never retries with a different key, because a silently
//! regenerated wrapping key would decrypt nothing and mask the real
//! condition from the user.

use tokio::sync::Mutex;
use zeroize::Zeroize;

use cask_core::{CaskError, CaskResult, EncryptedBlob, KEY_SIZE};
use cask_crypto::VaultKey;

use crate::traits::{BiometricOutcome, BiometricPrompt, HardwareKeyStore, KeyHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyWrapState {
    Disabled,
    Enrolling,
    Enabled,
    Invalidated,
}

struct Inner {
    state: KeyWrapState,
    envelope: Option<EncryptedBlob>,
}

pub struct KeyWrapManager<H, B> {
    store: H,
    prompt: B,
    alias: String,
    inner: Mutex<Inner>,
    /// Biometric prompts are modal: a second request while one is
    /// pending is rejected with `PromptBusy`, never silently dropped.
    prompt_gate: Mutex<()>,
}

impl<H: HardwareKeyStore, B: BiometricPrompt> KeyWrapManager<H, B> {
    pub fn new(store: H, prompt: B, alias: impl Into<String>) -> Self {
        Self {
            store,
            prompt,
            alias: alias.into(),
            inner: Mutex::new(Inner {
                state: KeyWrapState::Disabled,
                envelope: None,
            }),
            prompt_gate: Mutex::new(()),
        }
    }

    /// Access the underlying hardware key store.
    pub fn hardware_store(&self) -> &H {
        &self.store
    }

    /// Adopt a previously persisted envelope (from the vault header).
    pub async fn load_envelope(&self, envelope: Option<EncryptedBlob>) {
        let mut inner = self.inner.lock().await;
        inner.state = if envelope.is_some() {
            KeyWrapState::Enabled
        } else {
            KeyWrapState::Disabled
        };
        inner.envelope = envelope;
    }

    pub async fn state(&self) -> KeyWrapState {
        self.inner.lock().await.state
    }

    /// The current envelope, for persistence into the vault header.
    pub async fn envelope(&self) -> Option<EncryptedBlob> {
        self.inner.lock().await.envelope.clone()
    }

    pub async fn is_enabled(&self) -> bool {
        self.state().await == KeyWrapState::Enabled
    }

    /// Enroll biometric unlock: request a fresh assertion, wrap the
    /// session key under the hardware secret, and return the envelope
    /// for the caller to persist.
    pub async fn enable(&self, session_key: &VaultKey) -> CaskResult<EncryptedBlob> {
        let _gate = self
            .prompt_gate
            .try_lock()
            .map_err(|_| CaskError::PromptBusy)?;

        if !self.prompt.is_available() {
            return Err(CaskError::BiometricUnavailable);
        }

        self.inner.lock().await.state = KeyWrapState::Enrolling;

        match self.prompt.authenticate("Enable biometric unlock").await {
            BiometricOutcome::Success => {}
            BiometricOutcome::Cancelled => {
                self.inner.lock().await.state = KeyWrapState::Disabled;
                return Err(CaskError::Cancelled);
            }
            BiometricOutcome::Error => {
                self.inner.lock().await.state = KeyWrapState::Disabled;
                return Err(CaskError::BiometricFailed);
            }
        }

        let enrolled = (|| {
            let handle = self.store.generate_or_fetch_key(&self.alias, true)?;
            self.store.wrap(&handle, session_key.as_bytes())
        })();

        let mut inner = self.inner.lock().await;
        match enrolled {
            Ok(envelope) => {
                inner.envelope = Some(envelope.clone());
                inner.state = KeyWrapState::Enabled;
                tracing::info!(alias = %self.alias, "biometric unlock enrolled");
                Ok(envelope)
            }
            Err(e) => {
                inner.state = KeyWrapState::Disabled;
                Err(e)
            }
        }
    }

    /// Unlock via biometrics. Returns the session key, or `None` when no
    /// envelope is enrolled, the user cancels, or the hardware key turns
    /// out to be invalidated (in which case the stale envelope has been
    /// purged and subsequent calls also return `None`).
    pub async fn unlock(&self) -> CaskResult<Option<VaultKey>> {
        let envelope = {
            let inner = self.inner.lock().await;
            match (inner.state, &inner.envelope) {
                (KeyWrapState::Enabled, Some(envelope)) => envelope.clone(),
                _ => return Ok(None),
            }
        };

        let _gate = self
            .prompt_gate
            .try_lock()
            .map_err(|_| CaskError::PromptBusy)?;

        match self.prompt.authenticate("Unlock vault").await {
            BiometricOutcome::Success => {}
            BiometricOutcome::Cancelled => {
                tracing::debug!("biometric unlock cancelled");
                return Ok(None);
            }
            BiometricOutcome::Error => {
                tracing::warn!("biometric prompt error");
                return Ok(None);
            }
        }

        // Use the existing handle only; regenerating a key here would
        // guarantee a decryption failure with a misleading cause.
        let handle = KeyHandle {
            alias: self.alias.clone(),
        };

        match self.store.unwrap(&handle, &envelope) {
            Ok(mut plaintext) => {
                if plaintext.len() != KEY_SIZE {
                    plaintext.zeroize();
                    tracing::warn!("unwrapped key has wrong size, purging envelope");
                    self.purge().await;
                    return Ok(None);
                }
                let mut bytes = [0u8; KEY_SIZE];
                bytes.copy_from_slice(&plaintext);
                plaintext.zeroize();
                Ok(Some(VaultKey::from_bytes(bytes)))
            }
            Err(CaskError::BiometricInvalidated) => {
                tracing::warn!(alias = %self.alias, "hardware key invalidated, purging envelope");
                self.purge().await;
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(error = %e, "envelope unwrap failed, purging envelope");
                self.purge().await;
                Ok(None)
            }
        }
    }

    /// Remove the envelope and the hardware secret.
    pub async fn disable(&self) -> CaskResult<()> {
        let mut inner = self.inner.lock().await;
        inner.envelope = None;
        inner.state = KeyWrapState::Disabled;
        self.store.delete_key(&self.alias)?;
        tracing::info!(alias = %self.alias, "biometric unlock disabled");
        Ok(())
    }

    async fn purge(&self) {
        let mut inner = self.inner.lock().await;
        inner.state = KeyWrapState::Invalidated;
        inner.envelope = None;
        if let Err(e) = self.store.delete_key(&self.alias) {
            tracing::warn!(error = %e, "failed to delete invalidated hardware key");
        }
        inner.state = KeyWrapState::Disabled;
    }
}
