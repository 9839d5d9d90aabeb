//! AES-256-GCM authenticated encryption with detached tags
//!
//! Every call generates a fresh random 12-byte nonce; nonces are never
//! derived from counters, so they stay unique across process restarts.
//! Decryption fails closed: a tag mismatch or truncated input returns
//! [`CaskError::AuthenticationFailed`], never partial plaintext.

use aes_gcm::aead::AeadInPlace;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce, Tag};
use rand::rngs::OsRng;
use rand::RngCore;

use cask_core::{CaskError, CaskResult, EncryptedBlob, NONCE_SIZE};

use crate::kdf::VaultKey;

/// Encrypt a payload under `key` with a fresh random nonce.
pub fn seal(key: &VaultKey, plaintext: &[u8]) -> CaskResult<EncryptedBlob> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let mut ciphertext = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&nonce), b"", &mut ciphertext)
        .map_err(|_| CaskError::EncryptionFailed)?;

    Ok(EncryptedBlob {
        ciphertext,
        nonce,
        tag: tag.into(),
    })
}

/// Decrypt a blob under `key`, verifying the authentication tag.
pub fn open(key: &VaultKey, blob: &EncryptedBlob) -> CaskResult<Vec<u8>> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let mut plaintext = blob.ciphertext.clone();
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(&blob.nonce),
            b"",
            &mut plaintext,
            Tag::from_slice(&blob.tag),
        )
        .map_err(|_| CaskError::AuthenticationFailed)?;

    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cask_core::{KEY_SIZE, TAG_SIZE};
    use proptest::prelude::*;

    fn test_key() -> VaultKey {
        VaultKey::from_bytes([42u8; KEY_SIZE])
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let key = test_key();
        let plaintext = b"hello, encrypted world!";

        let blob = seal(&key, plaintext).unwrap();
        let decrypted = open(&key, &blob).unwrap();

        assert_eq!(&decrypted, plaintext);
    }

    #[test]
    fn test_seal_open_empty() {
        let key = test_key();

        let blob = seal(&key, b"").unwrap();
        let decrypted = open(&key, &blob).unwrap();

        assert_eq!(decrypted, b"");
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let key = test_key();

        let a = seal(&key, b"same plaintext").unwrap();
        let b = seal(&key, b"same plaintext").unwrap();

        assert_ne!(a.nonce, b.nonce, "nonces must never repeat");
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_open_wrong_key() {
        let blob = seal(&test_key(), b"secret data").unwrap();
        let wrong = VaultKey::from_bytes([7u8; KEY_SIZE]);

        let result = open(&wrong, &blob);
        assert!(matches!(result, Err(CaskError::AuthenticationFailed)));
    }

    #[test]
    fn test_tampered_ciphertext() {
        let key = test_key();
        let mut blob = seal(&key, b"secret data").unwrap();
        blob.ciphertext[0] ^= 0x01;

        assert!(matches!(open(&key, &blob), Err(CaskError::AuthenticationFailed)));
    }

    #[test]
    fn test_tampered_nonce() {
        let key = test_key();
        let mut blob = seal(&key, b"secret data").unwrap();
        blob.nonce[0] ^= 0x01;

        assert!(matches!(open(&key, &blob), Err(CaskError::AuthenticationFailed)));
    }

    #[test]
    fn test_tampered_tag() {
        let key = test_key();
        let mut blob = seal(&key, b"secret data").unwrap();
        blob.tag[TAG_SIZE - 1] ^= 0x80;

        assert!(matches!(open(&key, &blob), Err(CaskError::AuthenticationFailed)));
    }

    #[test]
    fn test_blob_shape() {
        let blob = seal(&test_key(), &[0u8; 1000]).unwrap();

        assert_eq!(blob.ciphertext.len(), 1000);
        assert_eq!(blob.nonce.len(), NONCE_SIZE);
        assert_eq!(blob.tag.len(), TAG_SIZE);
    }

    proptest! {
        #[test]
        fn prop_roundtrip(plaintext in proptest::collection::vec(any::<u8>(), 0..4096)) {
            let key = test_key();
            let blob = seal(&key, &plaintext).unwrap();
            let decrypted = open(&key, &blob).unwrap();
            prop_assert_eq!(decrypted, plaintext);
        }

        #[test]
        fn prop_bit_flip_detected(
            plaintext in proptest::collection::vec(any::<u8>(), 1..256),
            byte_idx: usize,
            bit in 0u8..8,
        ) {
            let key = test_key();
            let mut blob = seal(&key, &plaintext).unwrap();
            let idx = byte_idx % blob.ciphertext.len();
            blob.ciphertext[idx] ^= 1 << bit;
            prop_assert!(open(&key, &blob).is_err());
        }
    }
}
