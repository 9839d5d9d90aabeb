pub mod config;
pub mod error;
pub mod types;

pub use error::{CaskError, CaskResult};
pub use types::{
    Category, CustomField, EncryptedBlob, RecordBody, RecordEnvelope, VaultRecord, KEY_SIZE,
    NONCE_SIZE, SALT_SIZE, TAG_SIZE,
};
