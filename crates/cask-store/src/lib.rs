//! cask-store: durable storage for encrypted vault records
//!
//! The store holds records whose sensitive fields are already opaque
//! ciphertext; it is responsible for durability and non-sensitive
//! indexing (category, folder, timestamps) and never performs a
//! cryptographic operation. Two implementations ship: an in-memory store
//! for tests and a JSON file store whose whole-file atomic replace makes
//! batch writes a single durable step.

pub mod file;
pub mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

use cask_core::{CaskResult, VaultRecord};

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert or replace a single record.
    async fn put(&self, record: VaultRecord) -> CaskResult<()>;

    /// Insert or replace a set of records as one atomic batch: either
    /// every record is durable or none is.
    async fn put_many(&self, records: Vec<VaultRecord>) -> CaskResult<()>;

    async fn get(&self, id: &str) -> CaskResult<Option<VaultRecord>>;

    /// Physically remove a record. Removing an absent id is a no-op.
    async fn delete(&self, id: &str) -> CaskResult<()>;

    /// All records, tombstoned ones included, newest first.
    async fn list(&self) -> CaskResult<Vec<VaultRecord>>;

    /// Case-insensitive substring match over non-sensitive routing
    /// metadata (id, category, folder). Titles and usernames live inside
    /// the encrypted payload and are searchable only after decryption.
    async fn search(&self, substring: &str) -> CaskResult<Vec<VaultRecord>>;
}

fn matches_metadata(record: &VaultRecord, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    record.id.to_lowercase().contains(&needle)
        || record.category.as_str().contains(&needle)
        || record
            .folder_id
            .as_deref()
            .is_some_and(|f| f.to_lowercase().contains(&needle))
}

fn sort_newest_first(records: &mut [VaultRecord]) {
    records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
}
