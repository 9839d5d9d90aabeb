//! Tamper-evident password verifier
//!
//! The verifier is a small AEAD ciphertext of a fixed constant, created
//! once at setup under the verification sub-key. Decrypting it back to the
//! constant is the *only* source of truth for "password correct" — no
//! password hash is ever stored. The GCM tag check is constant-time
//! already; the plaintext comparison afterwards also avoids early exit.

use zeroize::Zeroize;

use cask_core::{CaskResult, EncryptedBlob};

use crate::aead::{open, seal};
use crate::kdf::VaultKey;

const VERIFIER_PLAINTEXT: &[u8] = b"caskvault-session-verifier-v1";

/// Create the verifier blob for a freshly derived verification key.
pub fn create_verifier(verification_key: &VaultKey) -> CaskResult<EncryptedBlob> {
    seal(verification_key, VERIFIER_PLAINTEXT)
}

/// Check a password attempt: true iff `verification_key` decrypts the
/// blob to the known constant.
pub fn check_verifier(blob: &EncryptedBlob, verification_key: &VaultKey) -> bool {
    match open(verification_key, blob) {
        Ok(mut plaintext) => {
            let ok = eq_no_early_exit(&plaintext, VERIFIER_PLAINTEXT);
            plaintext.zeroize();
            ok
        }
        Err(_) => false,
    }
}

/// Byte comparison without a data-dependent early exit.
fn eq_no_early_exit(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
