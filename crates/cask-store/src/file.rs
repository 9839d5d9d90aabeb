//! JSON file store: the whole record set in one file, replaced atomically
//!
//! Every mutation rewrites the file through a temp + rename, so a batch
//! `put_many` (the rotation commit) is a single durable step — the file
//! never holds a half-written mix of old and new ciphertext.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

use cask_core::{CaskError, CaskResult, VaultRecord};

use crate::{matches_metadata, sort_newest_first, RecordStore};

pub struct JsonFileStore {
    path: PathBuf,
    records: RwLock<HashMap<String, VaultRecord>>,
}

impl JsonFileStore {
    /// Open a store backed by `path`, loading any existing records. A
    /// missing file is an empty vault, not an error.
    pub async fn open(path: impl Into<PathBuf>) -> CaskResult<Self> {
        let path = path.into();

        let records = match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let list: Vec<VaultRecord> = serde_json::from_str(&content)
                    .map_err(|e| CaskError::Store(format!("record file corrupted: {e}")))?;
                list.into_iter().map(|r| (r.id.clone(), r)).collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(CaskError::Io(e)),
        };

        tracing::debug!(path = %path.display(), count = records.len(), "record store opened");

        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    /// Serialize the full record set and atomically replace the file.
    async fn persist(&self, records: &HashMap<String, VaultRecord>) -> CaskResult<()> {
        let mut list: Vec<_> = records.values().cloned().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));

        let json = serde_json::to_string_pretty(&list)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let parent = self.path.parent().unwrap_or(Path::new("."));
        let tmp_path = parent.join(format!(
            ".{}.tmp",
            self.path.file_name().unwrap_or_default().to_string_lossy()
        ));

        tokio::fs::write(&tmp_path, json.as_bytes()).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn put(&self, record: VaultRecord) -> CaskResult<()> {
        let mut guard = self.records.write().await;
        guard.insert(record.id.clone(), record);
        self.persist(&guard).await
    }

    async fn put_many(&self, records: Vec<VaultRecord>) -> CaskResult<()> {
        let mut guard = self.records.write().await;
        let before = guard.clone();
        for record in records {
            guard.insert(record.id.clone(), record);
        }
        if let Err(e) = self.persist(&guard).await {
            // Keep the cache consistent with what is actually on disk.
            *guard = before;
            return Err(e);
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> CaskResult<Option<VaultRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn delete(&self, id: &str) -> CaskResult<()> {
        let mut guard = self.records.write().await;
        if guard.remove(id).is_some() {
            self.persist(&guard).await?;
        }
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
