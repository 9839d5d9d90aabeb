//! In-memory record store for tests and ephemeral vaults

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use cask_core::{CaskResult, VaultRecord};

use crate::{matches_metadata, sort_newest_first, RecordStore};

#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, VaultRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn put(&self, record: VaultRecord) -> CaskResult<()> {
        self.records.write().await.insert(record.id.clone(), record);
        Ok(())
    }

    async fn put_many(&self, records: Vec<VaultRecord>) -> CaskResult<()> {
        let mut guard = self.records.write().await;
        for record in records {
            guard.insert(record.id.clone(), record);
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> CaskResult<Option<VaultRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn delete(&self, id: &str) -> CaskResult<()> {
        self.records.write().await.remove(id);
        Ok(())
    }

    async fn list(&self) -> CaskResult<Vec<VaultRecord>> {
        let mut records: Vec<_> = self.records.read().await.values().cloned().collect();
        sort_newest_first(&mut records);
        Ok(records)
    }

    async fn search(&self, substring: &str) -> CaskResult<Vec<VaultRecord>> {
        let mut records: Vec<_> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| matches_metadata(r, substring))
            .cloned()
            .collect();
        sort_newest_first(&mut records);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cask_core::{Category, EncryptedBlob, NONCE_SIZE, TAG_SIZE};

    fn record(id: &str, updated_at: u64) -> VaultRecord {
        VaultRecord {
            id: id.into(),
            category: Category::Login,
            folder_id: None,
            favorite: false,
            created_at: updated_at,
            updated_at,
            deleted_at: None,
            payload: EncryptedBlob {
                ciphertext: vec![0xAA],
                nonce: [0u8; NONCE_SIZE],
                tag: [0u8; TAG_SIZE],
            },
            attachment: None,
        }
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryStore::new();
        store.put(record("a", 1)).await.unwrap();

        assert!(store.get("a").await.unwrap().is_some());
        store.delete("a").await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());

        // Deleting an absent id is a no-op
        store.delete("a").await.unwrap();
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let store = MemoryStore::new();
        store.put(record("old", 1)).await.unwrap();
        store.put(record("new", 9)).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, "new");
    }

    #[tokio::test]
    async fn test_put_replaces() {
        let store = MemoryStore::new();
        store.put(record("a", 1)).await.unwrap();
        store.put(record("a", 2)).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].updated_at, 2);
    }

    #[tokio::test]
    async fn test_search_metadata_only() {
        let store = MemoryStore::new();
        let mut r = record("abc-123", 1);
        r.folder_id = Some("Work".into());
        store.put(r).await.unwrap();

        assert_eq!(store.search("work").await.unwrap().len(), 1);
        assert_eq!(store.search("login").await.unwrap().len(), 1);
        assert_eq!(store.search("nothing").await.unwrap().len(), 0);
    }
}
