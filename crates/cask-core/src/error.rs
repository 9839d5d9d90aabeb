use thiserror::Error;

pub type CaskResult<T> = Result<T, CaskError>;

#[derive(Debug, Error)]
pub enum CaskError {
    #[error("wrong master password")]
    WrongPassword,

    #[error("key derivation failed: {0}")]
    KeyDerivationFailure(String),

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("decryption failed: authentication tag mismatch or corrupted data")]
    AuthenticationFailed,

    #[error("hardware key invalidated: biometric enrollment changed")]
    BiometricInvalidated,

    #[error("biometric authentication unavailable on this device")]
    BiometricUnavailable,

    #[error("biometric authentication failed")]
    BiometricFailed,

    #[error("a biometric prompt is already pending")]
    PromptBusy,

    #[error("rotation aborted at record {record_id}: no changes were committed")]
    RotationAborted { record_id: String },

    #[error("too many failed attempts: retry in {retry_after_secs}s")]
    LockoutActive { retry_after_secs: u64 },

    #[error("record not found: {0}")]
    RecordNotFound(String),

    #[error("vault is locked")]
    SessionLocked,

    #[error("operation cancelled")]
    Cancelled,

    #[error("store error: {0}")]
    Store(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
