//! Platform keychain implementation of [`HardwareKeyStore`]
//!
//! Uses the `keyring` crate for cross-platform access:
//! - macOS: Keychain Services
//! - Linux: GNOME Keyring / Secret Service (D-Bus)
//! - Windows: Credential Manager (DPAPI)
//!
//! The wrapping secret is 32 random bytes stored under the service name
//! `cask`; the actual AEAD wrapping key is derived from it with
//! HKDF-SHA256 under a dedicated domain string, so the stored secret and
//! the key that touches ciphertext are never the same bytes. Biometric
//! gating of the entry is the platform keychain's access-control job;
//! when the entry disappears (enrollment reset, user removal) `unwrap`
//! reports the key as invalidated.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use cask_core::{CaskError, CaskResult, EncryptedBlob, KEY_SIZE};
use cask_crypto::{open, seal, VaultKey};

use crate::traits::{HardwareKeyStore, KeyHandle};

const SERVICE_NAME: &str = "cask";
const HKDF_DOMAIN: &[u8] = b"cask-keywrap-v1";

#[derive(Default)]
pub struct KeyringKeyStore;

impl KeyringKeyStore {
    pub fn new() -> Self {
        Self
    }

    fn fetch_secret(&self, alias: &str) -> CaskResult<Option<Zeroizing<Vec<u8>>>> {
        let entry = keyring::Entry::new(SERVICE_NAME, alias)
            .map_err(|e| CaskError::Store(format!("keychain entry creation: {e}")))?;

        match entry.get_password() {
            Ok(mut encoded) => {
                let secret = STANDARD
                    .decode(&encoded)
                    .map_err(|e| CaskError::Store(format!("keychain secret corrupted: {e}")))?;
                encoded.zeroize();
                Ok(Some(Zeroizing::new(secret)))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(CaskError::Store(format!("keychain get for '{alias}': {e}"))),
        }
    }

    fn wrapping_key(secret: &[u8]) -> CaskResult<VaultKey> {
        let hkdf = Hkdf::<Sha256>::new(Some(HKDF_DOMAIN), secret);
        let mut okm = [0u8; KEY_SIZE];
        hkdf.expand(b"wrapping-key", &mut okm)
            .map_err(|e| CaskError::KeyDerivationFailure(format!("HKDF expand failed: {e}")))?;

        let key = VaultKey::from_bytes(okm);
        okm.zeroize();
        Ok(key)
    }
}

impl HardwareKeyStore for KeyringKeyStore {
    fn generate_or_fetch_key(&self, alias: &str, _require_biometric: bool) -> CaskResult<KeyHandle> {
        if self.fetch_secret(alias)?.is_none() {
            let secret = VaultKey::generate();
            let entry = keyring::Entry::new(SERVICE_NAME, alias)
                .map_err(|e| CaskError::Store(format!("keychain entry creation: {e}")))?;
            entry
                .set_password(&STANDARD.encode(secret.as_bytes()))
                .map_err(|e| CaskError::Store(format!("keychain store for '{alias}': {e}")))?;
            tracing::debug!(alias, "generated new wrapping secret in platform keychain");
        }

        Ok(KeyHandle {
            alias: alias.to_string(),
        })
    }

    fn wrap(&self, handle: &KeyHandle, plaintext: &[u8]) -> CaskResult<EncryptedBlob> {
        let secret = self
            .fetch_secret(&handle.alias)?
            .ok_or(CaskError::BiometricInvalidated)?;
        let key = Self::wrapping_key(&secret)?;
        seal(&key, plaintext)
    }

    fn unwrap(&self, handle: &KeyHandle, envelope: &EncryptedBlob) -> CaskResult<Vec<u8>> {
        let secret = self
            .fetch_secret(&handle.alias)?
            .ok_or(CaskError::BiometricInvalidated)?;
        let key = Self::wrapping_key(&secret)?;
        open(&key, envelope)
    }

    fn delete_key(&self, alias: &str) -> CaskResult<()> {
        let entry = keyring::Entry::new(SERVICE_NAME, alias)
            .map_err(|e| CaskError::Store(format!("keychain entry creation: {e}")))?;
        match entry.delete_credential() {
            Ok(()) => {
                tracing::debug!(alias, "deleted wrapping secret from platform keychain");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()), // already deleted
            Err(e) => Err(CaskError::Store(format!(
                "keychain delete for '{alias}': {e}"
            ))),
        }
    }
}
