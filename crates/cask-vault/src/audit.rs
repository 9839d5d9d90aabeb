//! Security audit: strength classification, reuse detection, vault score
//!
//! Passwords are decrypted transiently — each one lives in a `Zeroizing`
//! buffer scoped to the audit call and is wiped when the call returns.
//! Records that fail to decrypt are skipped and logged; a partial audit
//! is still useful, unlike a partial rotation.

use std::collections::HashMap;

use zeroize::Zeroizing;

use cask_core::CaskResult;
use cask_keywrap::{BiometricPrompt, HardwareKeyStore};
use cask_store::RecordStore;

use crate::vault::Vault;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Strength {
    Weak,
    Medium,
    Strong,
    VeryStrong,
}

/// Point-scored strength classification.
///
/// +1 each for: length ≥ 8, length ≥ 12, an uppercase letter, a
/// lowercase letter, a digit, a symbol. Score ≥ 6 → VeryStrong, ≥ 4 →
/// Strong, ≥ 2 → Medium, else Weak. Anything under 6 characters is Weak
/// outright, whatever its mix.
pub fn classify_strength(password: &str) -> Strength {
    let length = password.chars().count();
    if length < 6 {
        return Strength::Weak;
    }

    let mut score = 0;
    if length >= 8 {
        score += 1;
    }
    if length >= 12 {
        score += 1;
    }
    if password.chars().any(|c| c.is_uppercase()) {
        score += 1;
    }
    if password.chars().any(|c| c.is_lowercase()) {
        score += 1;
    }
    if password.chars().any(|c| c.is_ascii_digit()) {
        score += 1;
    }
    if password.chars().any(|c| !c.is_alphanumeric()) {
        score += 1;
    }

    match score {
        s if s >= 6 => Strength::VeryStrong,
        s if s >= 4 => Strength::Strong,
        s if s >= 2 => Strength::Medium,
        _ => Strength::Weak,
    }
}

#[derive(Debug, Clone)]
pub struct AuditReport {
    /// Password-bearing records that were audited
    pub total: usize,
    /// Records classified Weak or Medium
    pub weak_ids: Vec<String>,
    /// Records whose exact password appears on at least one other record
    pub reused_ids: Vec<String>,
    /// `total − weak − distinct reused groups`. A record that is both
    /// weak and reused is subtracted twice, so this is a deliberate
    /// lower bound, not an exact count of healthy records.
    pub secure_count: usize,
    /// 0–100; an empty vault scores 100
    pub score: u8,
    /// Records skipped because they could not be decrypted
    pub skipped: usize,
}

pub(crate) fn run(entries: &[(String, Zeroizing<String>)], skipped: usize) -> AuditReport {
    let total = entries.len();

    let mut weak_ids = Vec::new();
    for (id, password) in entries {
        if classify_strength(password) <= Strength::Medium {
            weak_ids.push(id.clone());
        }
    }

    let mut groups: HashMap<&str, Vec<&str>> = HashMap::new();
    for (id, password) in entries {
        groups.entry(password.as_str()).or_default().push(id);
    }

    let mut reused_ids = Vec::new();
    let mut reused_groups = 0usize;
    for ids in groups.values() {
        if ids.len() > 1 {
            reused_groups += 1;
            reused_ids.extend(ids.iter().map(|id| id.to_string()));
        }
    }
    reused_ids.sort();

    let secure_count = total
        .saturating_sub(weak_ids.len())
        .saturating_sub(reused_groups);

    let score = if total == 0 {
        100
    } else {
        ((secure_count as f64 / total as f64) * 100.0).round() as u8
    };

    AuditReport {
        total,
        weak_ids,
        reused_ids,
        secure_count,
        score,
        skipped,
    }
}

impl<S, H, B> Vault<S, H, B>
where
    S: RecordStore,
    H: HardwareKeyStore,
    B: BiometricPrompt,
{
    /// Audit every live (non-tombstoned) password-bearing record.
    pub async fn audit(&self) -> CaskResult<AuditReport> {
        let _ops = self.ops_gate.read().await;
        let records = self.store.list().await?;

        let mut entries: Vec<(String, Zeroizing<String>)> = Vec::new();
        let mut skipped = 0;

        for record in records.iter().filter(|r| !r.is_deleted()) {
            match self.decrypt_envelope(record).await {
                Ok(envelope) => {
                    if let Some(password) = envelope.body.password() {
                        entries.push((record.id.clone(), Zeroizing::new(password.to_string())));
                    }
                }
                Err(e) => {
                    tracing::warn!(id = %record.id, error = %e, "skipping unreadable record in audit");
                    skipped += 1;
                }
            }
        }

        let report = run(&entries, skipped);
        tracing::info!(
            total = report.total,
            weak = report.weak_ids.len(),
            reused = report.reused_ids.len(),
            score = report.score,
            "vault audit complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::NewRecord;
    use crate::vault::test_support::setup_vault;
    use cask_core::{RecordBody, RecordEnvelope};

    #[test]
    fn test_short_is_always_weak() {
        assert_eq!(classify_strength("short"), Strength::Weak);
        // Five characters of every class still fail the length floor
        assert_eq!(classify_strength("aB1!x"), Strength::Weak);
    }

    #[test]
    fn test_classification_tiers() {
        // 8+ chars, lowercase, digits: 3 points
        assert_eq!(classify_strength("pass1234"), Strength::Medium);
        // 9 chars, upper+lower+digit: 4 points
        assert_eq!(classify_strength("Password1"), Strength::Strong);
        // 13 chars, all four classes: 6 points
        assert_eq!(classify_strength("StrongP@ss123"), Strength::VeryStrong);
        assert_eq!(
            classify_strength("V3ry$tr0ng!P@ssw0rd#2024"),
            Strength::VeryStrong
        );
        // 6 lowercase letters: 1 point
        assert_eq!(classify_strength("abcdef"), Strength::Weak);
    }

    fn entry(id: &str, password: &str) -> (String, Zeroizing<String>) {
        (id.to_string(), Zeroizing::new(password.to_string()))
    }

    #[test]
    fn test_empty_vault_scores_100() {
        let report = run(&[], 0);
        assert_eq!(report.score, 100);
        assert_eq!(report.total, 0);
    }

    #[test]
    fn test_reuse_flags_all_group_members() {
        let entries = vec![
            entry("a", "Sh4red!Secret99"),
            entry("b", "Sh4red!Secret99"),
            entry("c", "Un1que&Value123"),
        ];
        let report = run(&entries, 0);

        assert!(report.reused_ids.contains(&"a".to_string()));
        assert!(report.reused_ids.contains(&"b".to_string()));
        assert!(!report.reused_ids.contains(&"c".to_string()));
        // One distinct reused group, no weak entries: 3 - 0 - 1 = 2
        assert_eq!(report.secure_count, 2);
        assert_eq!(report.score, 67);
    }

    #[test]
    fn test_weak_and_reused_is_a_lower_bound() {
        // Both records share a weak password: subtracted from the weak
        // bucket and as a reused group, so secure saturates at zero.
        let entries = vec![entry("a", "abc123"), entry("b", "abc123")];
        let report = run(&entries, 0);

        assert_eq!(report.weak_ids.len(), 2);
        assert_eq!(report.reused_ids.len(), 2);
        assert_eq!(report.secure_count, 0);
        assert_eq!(report.score, 0);
    }

    fn login(title: &str, password: &str) -> NewRecord {
        NewRecord {
            envelope: RecordEnvelope {
                title: title.into(),
                username: "user".into(),
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
    async fn test_vault_audit_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let vault = setup_vault(dir.path(), "master").await;

        vault.create_record(login("a", "Sh4red!Secret99")).await.unwrap();
        vault.create_record(login("b", "Sh4red!Secret99")).await.unwrap();
        vault.create_record(login("c", "weak")).await.unwrap();
        vault
            .create_record(login("d", "V3ry$tr0ng!P@ssw0rd#2024"))
            .await
            .unwrap();

        let report = vault.audit().await.unwrap();
        assert_eq!(report.total, 4);
        assert_eq!(report.weak_ids.len(), 1);
        assert_eq!(report.reused_ids.len(), 2);
        // 4 - 1 weak - 1 reused group = 2 → 50
        assert_eq!(report.secure_count, 2);
        assert_eq!(report.score, 50);
        assert_eq!(report.skipped, 0);
    }

    #[tokio::test]
    async fn test_audit_skips_unreadable_records() {
        let dir = tempfile::tempdir().unwrap();
        let vault = setup_vault(dir.path(), "master").await;

        vault.create_record(login("ok", "F1ne&Dandy123")).await.unwrap();
        let broken = vault.create_record(login("bad", "whatever")).await.unwrap();

        let mut corrupted = vault.store.get(&broken.id).await.unwrap().unwrap();
        corrupted.payload.ciphertext[0] ^= 0xFF;
        vault.store.put(corrupted).await.unwrap();

        let report = vault.audit().await.unwrap();
        assert_eq!(report.total, 1);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn test_audit_ignores_tombstones_and_non_password_records() {
        let dir = tempfile::tempdir().unwrap();
        let vault = setup_vault(dir.path(), "master").await;

        let dead = vault.create_record(login("dead", "weak")).await.unwrap();
        vault.soft_delete(&dead.id).await.unwrap();

        let mut note = login("note", "");
        note.envelope.body = RecordBody::Note;
        vault.create_record(note).await.unwrap();

        let report = vault.audit().await.unwrap();
        assert_eq!(report.total, 0);
        assert_eq!(report.score, 100);
    }
}
