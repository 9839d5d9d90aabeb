//! Duplicate cleanup: collapse records with the same normalized identity
//!
//! Two records are duplicates when their normalized `(title, username,
//! category)` match. Within a group the favorited copy wins over a
//! non-favorite; on a favorite tie, the most recently modified copy
//! wins. Losers are removed from the store. Grouping needs the titles
//! and usernames from inside the encrypted envelope, so every live
//! record is decrypted exactly once.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use cask_core::{CaskResult, Category};
use cask_keywrap::{BiometricPrompt, HardwareKeyStore};
use cask_store::RecordStore;

use crate::vault::Vault;

#[derive(Debug, Clone)]
pub struct DedupReport {
    /// Records removed as duplicate losers
    pub deleted_ids: Vec<String>,
    /// Records skipped because they could not be decrypted
    pub skipped: usize,
}

/// Lowercase, trim, NFD with combining marks stripped, zero-width
/// characters removed.
fn normalize(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .nfd()
        .filter(|&c| !is_combining_mark(c) && !is_zero_width(c))
        .collect()
}

fn is_zero_width(c: char) -> bool {
    matches!(c, '\u{200B}'..='\u{200D}' | '\u{FEFF}')
}

#[derive(Debug)]
pub(crate) struct Candidate {
    pub id: String,
    pub title: String,
    pub username: String,
    pub category: Category,
    pub favorite: bool,
    pub updated_at: u64,
}

/// Decide which records to delete. Pure; operates on already-decrypted
/// grouping metadata.
pub(crate) fn plan(candidates: Vec<Candidate>) -> Vec<String> {
    let mut kept: HashMap<(String, String, Category), Candidate> = HashMap::new();
    let mut to_delete = Vec::new();

    for candidate in candidates {
        let key = (
            normalize(&candidate.title),
            normalize(&candidate.username),
            candidate.category,
        );

        match kept.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(candidate);
            }
            Entry::Occupied(mut slot) => {
                let existing = slot.get();
                let keep_new = (candidate.favorite && !existing.favorite)
                    || (candidate.favorite == existing.favorite
                        && candidate.updated_at > existing.updated_at);

                if keep_new {
                    to_delete.push(slot.get().id.clone());
                    slot.insert(candidate);
                } else {
                    to_delete.push(candidate.id);
                }
            }
        }
    }

    to_delete
}

impl<S, H, B> Vault<S, H, B>
where
    S: RecordStore,
    H: HardwareKeyStore,
    B: BiometricPrompt,
{
    /// Find and remove duplicate records. Tombstoned records are already
    /// on their way out and are not considered.
    pub async fn dedup(&self) -> CaskResult<DedupReport> {
        let _ops = self.ops_gate.read().await;
        let records = self.store.list().await?;

        let mut candidates = Vec::new();
        let mut skipped = 0;

        for record in records.iter().filter(|r| !r.is_deleted()) {
            match self.decrypt_envelope(record).await {
                Ok(envelope) => candidates.push(Candidate {
                    id: record.id.clone(),
                    title: envelope.title.clone(),
                    username: envelope.username.clone(),
                    category: record.category,
                    favorite: record.favorite,
                    updated_at: record.updated_at,
                }),
                Err(e) => {
                    tracing::warn!(id = %record.id, error = %e, "skipping unreadable record in dedup");
                    skipped += 1;
                }
            }
        }

        let deleted_ids = plan(candidates);
        for id in &deleted_ids {
            self.store.delete(id).await?;
        }

        if !deleted_ids.is_empty() {
            tracing::info!(count = deleted_ids.len(), "duplicate records removed");
        }

        Ok(DedupReport {
            deleted_ids,
            skipped,
        })
    }
}
