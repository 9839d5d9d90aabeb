//! Scriptable test doubles for the hardware key store and biometric
//! prompt. Used by this crate's tests and by the session/vault tests
//! upstream.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use cask_core::{CaskError, CaskResult, EncryptedBlob, KEY_SIZE};
use cask_crypto::{open, seal, VaultKey};

use crate::traits::{BiometricOutcome, BiometricPrompt, HardwareKeyStore, KeyHandle};

/// In-memory hardware key store with a flippable invalidation switch.
#[derive(Default)]
pub struct MockKeyStore {
    keys: Mutex<HashMap<String, [u8; KEY_SIZE]>>,
    invalidated: AtomicBool,
}

impl MockKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a biometric re-enrollment: every stored key becomes
    /// permanently unusable.
    pub fn invalidate(&self) {
        self.invalidated.store(true, Ordering::SeqCst);
    }

    pub fn has_key(&self, alias: &str) -> bool {
        self.keys.lock().unwrap().contains_key(alias)
    }
}

impl HardwareKeyStore for MockKeyStore {
    fn generate_or_fetch_key(&self, alias: &str, _require_biometric: bool) -> CaskResult<KeyHandle> {
        let mut keys = self.keys.lock().unwrap();
        keys.entry(alias.to_string())
            .or_insert_with(|| *VaultKey::generate().as_bytes());
        Ok(KeyHandle {
            alias: alias.to_string(),
        })
    }

    fn wrap(&self, handle: &KeyHandle, plaintext: &[u8]) -> CaskResult<EncryptedBlob> {
        let keys = self.keys.lock().unwrap();
        let key = keys
            .get(&handle.alias)
            .ok_or(CaskError::BiometricInvalidated)?;
        seal(&VaultKey::from_bytes(*key), plaintext)
    }

    fn unwrap(&self, handle: &KeyHandle, envelope: &EncryptedBlob) -> CaskResult<Vec<u8>> {
        if self.invalidated.load(Ordering::SeqCst) {
            return Err(CaskError::BiometricInvalidated);
        }
        let keys = self.keys.lock().unwrap();
        let key = keys
            .get(&handle.alias)
            .ok_or(CaskError::BiometricInvalidated)?;
        open(&VaultKey::from_bytes(*key), envelope)
    }

    fn delete_key(&self, alias: &str) -> CaskResult<()> {
        self.keys.lock().unwrap().remove(alias);
        Ok(())
    }
}

/// A prompt that always answers with a scripted outcome and counts how
/// often it was shown.
pub struct MockPrompt {
    outcome: Mutex<BiometricOutcome>,
    available: bool,
    prompts: AtomicUsize,
}

impl MockPrompt {
    pub fn accepting() -> Self {
        Self {
            outcome: Mutex::new(BiometricOutcome::Success),
            available: true,
            prompts: AtomicUsize::new(0),
        }
    }

    pub fn cancelling() -> Self {
        Self {
            outcome: Mutex::new(BiometricOutcome::Cancelled),
            available: true,
            prompts: AtomicUsize::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            outcome: Mutex::new(BiometricOutcome::Error),
            available: false,
            prompts: AtomicUsize::new(0),
        }
    }

    pub fn set_outcome(&self, outcome: BiometricOutcome) {
        *self.outcome.lock().unwrap() = outcome;
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BiometricPrompt for MockPrompt {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn authenticate(&self, _reason: &str) -> BiometricOutcome {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        *self.outcome.lock().unwrap()
    }
}
