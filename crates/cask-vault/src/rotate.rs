//! Master-password rotation: compute everything, then commit
//!
//! Rotation flow:
//!   1. Verify the old password via the verifier blob
//!   2. Derive the new sub-keys under a fresh salt
//!   3. Decrypt and re-encrypt every record (attachments included) in
//!      memory, with all-new nonces
//!   4. Only then commit: records as one atomic batch, then the header
//!
//! Any single record failing stage 3 aborts before a byte is persisted —
//! a vault where some records sit under the old key and some under the
//! new one is unrecoverable, so the stage gate is structural, not
//! best-effort. Rotation holds the ops gate for write, which excludes
//! all record CRUD for its duration.

use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use zeroize::Zeroize;

use cask_core::{CaskError, CaskResult, VaultRecord, SALT_SIZE};
use cask_crypto::{
    check_verifier, create_verifier, derive_keypair, generate_salt, open, seal, DerivedKey,
    KdfParams, VaultHeader, VaultKey,
};
use cask_keywrap::{BiometricPrompt, HardwareKeyStore};
use cask_store::RecordStore;

use crate::vault::Vault;

impl<S, H, B> Vault<S, H, B>
where
    S: RecordStore,
    H: HardwareKeyStore,
    B: BiometricPrompt,
{
    /// Re-encrypt the whole vault under a new master password.
    ///
    /// `progress` is called with `(done, total)` after each record.
    /// Cancellation aborts cleanly before the commit; every derived key
    /// is dropped and zeroized on all exit paths.
    pub async fn rotate(
        &self,
        old_password: SecretString,
        new_password: SecretString,
        cancel: &CancellationToken,
        mut progress: impl FnMut(usize, usize),
    ) -> CaskResult<()> {
        let _ops = self.ops_gate.write().await;

        let (salt, params, verifier) = {
            let header = self.header.read().await;
            (header.salt, header.kdf_params(), header.verifier())
        };

        let (old_verification, old_encryption) =
            derive_pair_blocking(old_password, salt, params.clone(), cancel).await?;
        if !check_verifier(&verifier, &old_verification.key) {
            return Err(CaskError::WrongPassword);
        }

        let new_salt = generate_salt();
        let (new_verification, new_encryption) =
            derive_pair_blocking(new_password, new_salt, params.clone(), cancel).await?;
        let new_verifier = create_verifier(&new_verification.key)?;

        // Stage 1: everything in memory, nothing persisted
        let originals = self.store.list().await?;
        let total = originals.len();
        let mut reencrypted = Vec::with_capacity(total);

        for (done, record) in originals.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(CaskError::Cancelled);
            }

            let rotated = reencrypt_record(record, &old_encryption.key, &new_encryption.key)
                .map_err(|e| {
                    tracing::error!(
                        id = %record.id,
                        error = %e,
                        "record failed to re-encrypt, aborting rotation"
                    );
                    CaskError::RotationAborted {
                        record_id: record.id.clone(),
                    }
                })?;
            reencrypted.push(rotated);
            progress(done + 1, total);
        }

        // Stage 2: commit. Records land as one atomic batch, then the
        // header swaps salt/params/verifier in a single file replace.
        self.store.put_many(reencrypted).await?;

        let new_header =
            VaultHeader::new(new_salt, &params, new_verifier, new_verification.degraded);
        if let Err(e) = new_header.save(&self.header_path).await {
            tracing::error!(
                error = %e,
                "header swap failed, restoring records under the previous key"
            );
            if let Err(rollback) = self.store.put_many(originals).await {
                tracing::error!(error = %rollback, "rollback failed: vault requires manual recovery");
            }
            return Err(e);
        }
        *self.header.write().await = new_header;

        // The old key-wrap envelope wraps a retired key; purge it rather
        // than leave an enrollment that can never decrypt again.
        if let Err(e) = self.keywrap.disable().await {
            tracing::warn!(error = %e, "failed to clear key-wrap enrollment after rotation");
        }

        self.session
            .install_key(new_encryption.key, new_encryption.degraded)
            .await;

        tracing::info!(records = total, "master password rotated");
        Ok(())
    }
}

async fn derive_pair_blocking(
    password: SecretString,
    salt: [u8; SALT_SIZE],
    params: KdfParams,
    cancel: &CancellationToken,
) -> CaskResult<(DerivedKey, DerivedKey)> {
    tokio::select! {
        _ = cancel.cancelled() => Err(CaskError::Cancelled),
        joined = tokio::task::spawn_blocking(move || derive_keypair(&password, &salt, &params)) => {
            joined.map_err(|e| CaskError::KeyDerivationFailure(format!("derivation task: {e}")))?
        }
    }
}

/// Decrypt one record under the old key and re-encrypt under the new
/// one, payload and attachment each with a fresh nonce.
fn reencrypt_record(
    record: &VaultRecord,
    old_key: &VaultKey,
    new_key: &VaultKey,
) -> CaskResult<VaultRecord> {
    let mut plaintext = open(old_key, &record.payload)?;
    let payload = seal(new_key, &plaintext);
    plaintext.zeroize();
    let payload = payload?;

    let attachment = match &record.attachment {
        Some(blob) => {
            let mut plaintext = open(old_key, blob)?;
            let sealed = seal(new_key, &plaintext);
            plaintext.zeroize();
            Some(sealed?)
        }
        None => None,
    };

    Ok(VaultRecord {
        payload,
        attachment,
        ..record.clone()
    })
}
