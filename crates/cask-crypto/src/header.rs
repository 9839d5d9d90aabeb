//! Persisted vault header: salt, KDF costs, verifier, key-wrap envelope
//!
//! The header is the only vault metadata outside the record store. Its
//! JSON field names and sizes (16-byte salt, 12-byte nonces, 16-byte
//! tags, base64 encoding) are a wire contract that must round-trip
//! exactly across rotation and export/import.
//!
//! The whole header is replaced atomically (write temp + rename) so a
//! crash mid-write can never mix an old salt with a new verifier.

use serde::{Deserialize, Serialize};
use std::path::Path;

use cask_core::types::b64;
use cask_core::{CaskError, CaskResult, EncryptedBlob, NONCE_SIZE, SALT_SIZE, TAG_SIZE};

use crate::kdf::KdfParams;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultHeader {
    #[serde(with = "b64::array")]
    pub salt: [u8; SALT_SIZE],
    pub kdf_iterations: u32,
    #[serde(rename = "kdfMemoryKB")]
    pub kdf_memory_kb: u32,
    pub kdf_parallelism: u32,
    #[serde(with = "b64::vec")]
    pub verifier_ciphertext: Vec<u8>,
    #[serde(with = "b64::array")]
    pub verifier_nonce: [u8; NONCE_SIZE],
    #[serde(with = "b64::array")]
    pub verifier_tag: [u8; TAG_SIZE],
    /// The wrapped session key for biometric unlock, when enrolled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biometric_envelope: Option<EncryptedBlob>,
    /// True when the verifier was created by the degraded SHA-256
    /// fallback rather than Argon2id
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub kdf_degraded: bool,
}

impl VaultHeader {
    pub fn new(
        salt: [u8; SALT_SIZE],
        params: &KdfParams,
        verifier: EncryptedBlob,
        kdf_degraded: bool,
    ) -> Self {
        Self {
            salt,
            kdf_iterations: params.time_cost,
            kdf_memory_kb: params.mem_cost_kib,
            kdf_parallelism: params.parallelism,
            verifier_ciphertext: verifier.ciphertext,
            verifier_nonce: verifier.nonce,
            verifier_tag: verifier.tag,
            biometric_envelope: None,
            kdf_degraded,
        }
    }

    pub fn kdf_params(&self) -> KdfParams {
        KdfParams {
            time_cost: self.kdf_iterations,
            mem_cost_kib: self.kdf_memory_kb,
            parallelism: self.kdf_parallelism,
        }
    }

    pub fn verifier(&self) -> EncryptedBlob {
        EncryptedBlob {
            ciphertext: self.verifier_ciphertext.clone(),
            nonce: self.verifier_nonce,
            tag: self.verifier_tag,
        }
    }

    /// Load and parse the header file. A missing file is
    /// [`CaskError::Config`] ("vault not set up"); unparseable JSON is
    /// surfaced as corrupted metadata rather than a panic.
    pub async fn load(path: &Path) -> CaskResult<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CaskError::Config(format!("vault not set up: {}", path.display()))
            } else {
                CaskError::Io(e)
            }
        })?;

        serde_json::from_str(&content)
            .map_err(|e| CaskError::Config(format!("vault header corrupted: {e}")))
    }

    /// Atomically replace the header file (write temp + rename).
    pub async fn save(&self, path: &Path) -> CaskResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(self)?;

        let parent = path.parent().unwrap_or(Path::new("."));
        let tmp_path = parent.join(format!(
            ".{}.tmp",
            path.file_name().unwrap_or_default().to_string_lossy()
        ));

        tokio::fs::write(&tmp_path, json.as_bytes()).await?;
        tokio::fs::rename(&tmp_path, path).await?;

        tracing::debug!(path = %path.display(), "vault header written");
        Ok(())
    }
}
