//! Record CRUD through the live session key
//!
//! Every write seals the envelope (and any attachment) with fresh,
//! independent nonces. Deletion is a tombstone first; ciphertext leaves
//! the store only on explicit purge. All operations hold the ops gate
//! for read, so they are concurrent with each other but excluded while a
//! rotation holds it for write.

use zeroize::{Zeroize, Zeroizing};

use cask_core::{CaskError, CaskResult, RecordEnvelope, VaultRecord};
use cask_crypto::{open, seal};
use cask_keywrap::{BiometricPrompt, HardwareKeyStore};
use cask_store::RecordStore;

use crate::now_epoch;
use crate::vault::Vault;

/// Input for creating or updating a record.
pub struct NewRecord {
    pub envelope: RecordEnvelope,
    pub folder_id: Option<String>,
    pub favorite: bool,
    pub attachment: Option<Vec<u8>>,
}

impl<S, H, B> Vault<S, H, B>
where
    S: RecordStore,
    H: HardwareKeyStore,
    B: BiometricPrompt,
{
    /// Encrypt and store a new record.
    pub async fn create_record(&self, new: NewRecord) -> CaskResult<VaultRecord> {
        let _ops = self.ops_gate.read().await;
        let now = now_epoch();

        let record = VaultRecord {
            id: uuid::Uuid::new_v4().to_string(),
            category: new.envelope.body.category(),
            folder_id: new.folder_id,
            favorite: new.favorite,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            payload: self.seal_envelope(&new.envelope).await?,
            attachment: self.seal_attachment(new.attachment.as_deref()).await?,
        };

        self.store.put(record.clone()).await?;
        tracing::debug!(id = %record.id, category = %record.category, "record created");
        Ok(record)
    }

    /// Re-encrypt a record with new contents, keeping its identity and
    /// creation time. Fresh nonces on payload and attachment.
    pub async fn update_record(&self, id: &str, new: NewRecord) -> CaskResult<VaultRecord> {
        let _ops = self.ops_gate.read().await;
        let existing = self.require_record(id).await?;

        let record = VaultRecord {
            id: existing.id,
            category: new.envelope.body.category(),
            folder_id: new.folder_id,
            favorite: new.favorite,
            created_at: existing.created_at,
            updated_at: now_epoch(),
            deleted_at: existing.deleted_at,
            payload: self.seal_envelope(&new.envelope).await?,
            attachment: self.seal_attachment(new.attachment.as_deref()).await?,
        };

        self.store.put(record.clone()).await?;
        Ok(record)
    }

    /// Decrypt a record's envelope.
    pub async fn read_record(&self, id: &str) -> CaskResult<RecordEnvelope> {
        let _ops = self.ops_gate.read().await;
        let record = self.require_record(id).await?;
        self.decrypt_envelope(&record).await
    }

    /// Decrypt a record's attachment, if it has one. The buffer zeroizes
    /// itself on drop.
    pub async fn read_attachment(&self, id: &str) -> CaskResult<Option<Zeroizing<Vec<u8>>>> {
        let _ops = self.ops_gate.read().await;
        let record = self.require_record(id).await?;

        match &record.attachment {
            Some(blob) => {
                let plaintext = self.session.with_key(|k| open(k, blob)).await?;
                Ok(Some(Zeroizing::new(plaintext)))
            }
            None => Ok(None),
        }
    }

    pub async fn set_favorite(&self, id: &str, favorite: bool) -> CaskResult<()> {
        let _ops = self.ops_gate.read().await;
        let mut record = self.require_record(id).await?;
        record.favorite = favorite;
        record.updated_at = now_epoch();
        self.store.put(record).await
    }

    /// Tombstone a record. It stays in the store, decryptable, until
    /// explicitly purged.
    pub async fn soft_delete(&self, id: &str) -> CaskResult<()> {
        let _ops = self.ops_gate.read().await;
        let mut record = self.require_record(id).await?;
        record.deleted_at = Some(now_epoch());
        self.store.put(record).await
    }

    /// Clear a tombstone.
    pub async fn restore(&self, id: &str) -> CaskResult<()> {
        let _ops = self.ops_gate.read().await;
        let mut record = self.require_record(id).await?;
        record.deleted_at = None;
        record.updated_at = now_epoch();
        self.store.put(record).await
    }

    /// Physically remove a record from the store.
    pub async fn purge(&self, id: &str) -> CaskResult<()> {
        let _ops = self.ops_gate.read().await;
        self.store.delete(id).await
    }

    /// All records, tombstoned included.
    pub async fn list_records(&self) -> CaskResult<Vec<VaultRecord>> {
        let _ops = self.ops_gate.read().await;
        self.store.list().await
    }

    /// Substring search over non-sensitive routing metadata.
    pub async fn search_records(&self, substring: &str) -> CaskResult<Vec<VaultRecord>> {
        let _ops = self.ops_gate.read().await;
        self.store.search(substring).await
    }

    async fn require_record(&self, id: &str) -> CaskResult<VaultRecord> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| CaskError::RecordNotFound(id.to_string()))
    }

    async fn seal_envelope(&self, envelope: &RecordEnvelope) -> CaskResult<cask_core::EncryptedBlob> {
        let mut plaintext = serde_json::to_vec(envelope)?;
        let sealed = self.session.with_key(|k| seal(k, &plaintext)).await;
        plaintext.zeroize();
        sealed
    }

    async fn seal_attachment(
        &self,
        attachment: Option<&[u8]>,
    ) -> CaskResult<Option<cask_core::EncryptedBlob>> {
        match attachment {
            Some(bytes) => Ok(Some(self.session.with_key(|k| seal(k, bytes)).await?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::test_support::setup_vault;
    use cask_core::{Category, RecordBody};

    fn login(title: &str, username: &str, password: &str) -> NewRecord {
        NewRecord {
            envelope: RecordEnvelope {
                title: title.into(),
                username: username.into(),
                notes: String::new(),
                body: RecordBody::Login {
                    password: password.into(),
                    url: String::new(),
                    totp_seed: None,
                    custom_fields: vec![],
                },
            },
            folder_id: None,
            favorite: false,
            attachment: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let vault = setup_vault(dir.path(), "master").await;

        let record = vault
            .create_record(login("GitHub", "octocat", "hunter2"))
            .await
            .unwrap();
        assert_eq!(record.category, Category::Login);

        let envelope = vault.read_record(&record.id).await.unwrap();
        assert_eq!(envelope.title, "GitHub");
        assert_eq!(envelope.body.password(), Some("hunter2"));
    }

    #[tokio::test]
    async fn test_attachment_has_independent_nonce() {
        let dir = tempfile::tempdir().unwrap();
        let vault = setup_vault(dir.path(), "master").await;

        let mut new = login("Scan", "", "");
        new.envelope.body = RecordBody::File {
            file_name: "passport.pdf".into(),
            file_mime: "application/pdf".into(),
            file_size: 4,
        };
        new.attachment = Some(vec![0xDE, 0xAD, 0xBE, 0xEF]);

        let record = vault.create_record(new).await.unwrap();
        let attachment = record.attachment.as_ref().expect("attachment stored");
        assert_ne!(attachment.nonce, record.payload.nonce);

        let bytes = vault.read_attachment(&record.id).await.unwrap().unwrap();
        assert_eq!(&bytes[..], &[0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[tokio::test]
    async fn test_update_rotates_nonce() {
        let dir = tempfile::tempdir().unwrap();
        let vault = setup_vault(dir.path(), "master").await;

        let record = vault
            .create_record(login("Mail", "me", "old-pass"))
            .await
            .unwrap();

        let updated = vault
            .update_record(&record.id, login("Mail", "me", "new-pass"))
            .await
            .unwrap();

        assert_eq!(updated.id, record.id);
        assert_eq!(updated.created_at, record.created_at);
        assert_ne!(updated.payload.nonce, record.payload.nonce);
        assert_eq!(
            vault.read_record(&record.id).await.unwrap().body.password(),
            Some("new-pass")
        );
    }

    #[tokio::test]
    async fn test_soft_delete_restore_purge() {
        let dir = tempfile::tempdir().unwrap();
        let vault = setup_vault(dir.path(), "master").await;
        let record = vault.create_record(login("a", "b", "c")).await.unwrap();

        vault.soft_delete(&record.id).await.unwrap();
        let listed = vault.list_records().await.unwrap();
        assert!(listed[0].is_deleted());
        // Tombstoned records stay decryptable
        assert!(vault.read_record(&record.id).await.is_ok());

        vault.restore(&record.id).await.unwrap();
        assert!(!vault.list_records().await.unwrap()[0].is_deleted());

        vault.purge(&record.id).await.unwrap();
        assert!(vault.list_records().await.unwrap().is_empty());
        assert!(matches!(
            vault.read_record(&record.id).await,
            Err(CaskError::RecordNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_locked_session_rejects_crud() {
        let dir = tempfile::tempdir().unwrap();
        let vault = setup_vault(dir.path(), "master").await;
        let record = vault.create_record(login("a", "b", "c")).await.unwrap();

        vault.lock().await;

        assert!(matches!(
            vault.read_record(&record.id).await,
            Err(CaskError::SessionLocked)
        ));
        assert!(matches!(
            vault.create_record(login("x", "y", "z")).await,
            Err(CaskError::SessionLocked)
        ));
    }
}
