//! Collaborator seams: the platform hardware key store and the biometric
//! prompt. The engine only ever talks to these traits; platform bindings
//! and test doubles implement them.

use async_trait::async_trait;

use cask_core::{CaskResult, EncryptedBlob};

/// Opaque handle to a hardware-resident wrapping key.
#[derive(Debug, Clone)]
pub struct KeyHandle {
    pub alias: String,
}

/// A platform key store holding wrapping secrets that never leave it.
///
/// `unwrap` must return [`cask_core::CaskError::BiometricInvalidated`]
/// when the hardware key has been invalidated (for example by a
/// biometric re-enrollment) so callers can purge the stale envelope.
pub trait HardwareKeyStore: Send + Sync {
    fn generate_or_fetch_key(&self, alias: &str, require_biometric: bool) -> CaskResult<KeyHandle>;

    fn wrap(&self, handle: &KeyHandle, plaintext: &[u8]) -> CaskResult<EncryptedBlob>;

    fn unwrap(&self, handle: &KeyHandle, envelope: &EncryptedBlob) -> CaskResult<Vec<u8>>;

    /// Remove the hardware secret. Removing an absent alias is a no-op.
    fn delete_key(&self, alias: &str) -> CaskResult<()>;
}

/// Outcome of a modal biometric assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiometricOutcome {
    Success,
    Cancelled,
    Error,
}

/// A modal biometric prompt. At most one prompt may be outstanding at a
/// time; the [`crate::KeyWrapManager`] enforces that.
#[async_trait]
pub trait BiometricPrompt: Send + Sync {
    fn is_available(&self) -> bool;

    /// Show the prompt; resolves when the user responds. The assertion
    /// authorizes exactly one use of the wrapping key.
    async fn authenticate(&self, reason: &str) -> BiometricOutcome;
}
