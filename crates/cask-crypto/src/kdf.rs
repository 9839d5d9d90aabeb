//! Key derivation: Argon2id password → domain-separated sub-keys
//!
//! The same password yields two independent 256-bit keys: a verification
//! key (prefix "V:") that only ever decrypts the verifier blob, and an
//! encryption key (prefix "E:") for record payloads. If the Argon2id
//! primitive fails, derivation falls back to iterated SHA-256 — a
//! documented, weaker path that is logged and flagged on the returned key
//! so it is never silently equivalent.

use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, Zeroizing};

use cask_core::{CaskResult, KEY_SIZE, SALT_SIZE};

/// Lower bound on the Argon2id time cost. Calibration never goes below
/// this, whatever the hardware.
pub const MIN_TIME_COST: u32 = 3;

/// Upper bound on the Argon2id time cost from calibration.
pub const MAX_TIME_COST: u32 = 60;

/// A 256-bit derived key. Zeroized on drop to prevent secrets lingering
/// in memory.
#[derive(Clone)]
pub struct VaultKey {
    bytes: [u8; KEY_SIZE],
}

impl VaultKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Generate a random key (used for hardware wrapping secrets).
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }
}

impl Drop for VaultKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Argon2id cost parameters. Output length is fixed at 32 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KdfParams {
    /// Time cost / iterations (default: 3)
    pub time_cost: u32,
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub mem_cost_kib: u32,
    /// Parallelism (default: 4)
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            time_cost: 3,
            mem_cost_kib: 65536,
            parallelism: 4,
        }
    }
}

/// Domain prefix selecting which sub-key a derivation produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPurpose {
    /// "V:" — the key that decrypts the verifier blob
    Verification,
    /// "E:" — the key that encrypts record payloads
    Encryption,
}

impl KeyPurpose {
    fn prefix(self) -> &'static [u8] {
        match self {
            KeyPurpose::Verification => b"V:",
            KeyPurpose::Encryption => b"E:",
        }
    }
}

/// A derived sub-key plus the provenance flag audits care about.
#[derive(Debug)]
pub struct DerivedKey {
    pub key: VaultKey,
    /// True when the SHA-256 fallback produced this key instead of
    /// Argon2id. Callers must surface this as a degraded-security event.
    pub degraded: bool,
}

/// Generate a random 16-byte KDF salt. Salts are not secret and are
/// persisted in plaintext alongside the cost parameters.
pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive a 256-bit sub-key from a password with Argon2id.
///
/// Deterministic for identical `(password, salt, params, purpose)`. The
/// domain prefix is prepended to the password bytes before hashing, so the
/// verification and encryption keys cannot be computed from each other.
pub fn derive_subkey(
    password: &SecretString,
    salt: &[u8; SALT_SIZE],
    params: &KdfParams,
    purpose: KeyPurpose,
) -> CaskResult<DerivedKey> {
    let mut input = Zeroizing::new(Vec::with_capacity(
        purpose.prefix().len() + password.expose_secret().len(),
    ));
    input.extend_from_slice(purpose.prefix());
    input.extend_from_slice(password.expose_secret().as_bytes());

    match argon2_derive(&input, salt, params) {
        Ok(key) => Ok(DerivedKey {
            key,
            degraded: false,
        }),
        Err(reason) => {
            tracing::warn!(
                %reason,
                purpose = ?purpose,
                "argon2id derivation failed, falling back to iterated SHA-256 (degraded security)"
            );
            Ok(DerivedKey {
                key: fallback_derive(&input, salt, params),
                degraded: true,
            })
        }
    }
}

/// Derive both sub-keys from the same password/salt/params.
///
/// Returns `(verification, encryption)`.
pub fn derive_keypair(
    password: &SecretString,
    salt: &[u8; SALT_SIZE],
    params: &KdfParams,
) -> CaskResult<(DerivedKey, DerivedKey)> {
    let verification = derive_subkey(password, salt, params, KeyPurpose::Verification)?;
    let encryption = derive_subkey(password, salt, params, KeyPurpose::Encryption)?;
    Ok((verification, encryption))
}

fn argon2_derive(
    input: &[u8],
    salt: &[u8; SALT_SIZE],
    params: &KdfParams,
) -> Result<VaultKey, String> {
    let argon2_params = Params::new(
        params.mem_cost_kib,
        params.time_cost,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| format!("invalid Argon2id params: {e}"))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(input, salt, &mut key)
        .map_err(|e| format!("Argon2id failed: {e}"))?;

    Ok(VaultKey::from_bytes(key))
}

/// The documented degraded fallback: `time_cost` rounds of
/// `SHA-256(salt || previous)`, seeded with the prefixed password. Far
/// weaker than Argon2id against offline brute force; only reached when
/// the memory-hard primitive itself fails.
fn fallback_derive(input: &[u8], salt: &[u8; SALT_SIZE], params: &KdfParams) -> VaultKey {
    let mut digest: [u8; KEY_SIZE] = {
        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(input);
        hasher.finalize().into()
    };

    for _ in 1..params.time_cost.max(1) {
        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(digest);
        digest = hasher.finalize().into();
    }

    VaultKey::from_bytes(digest)
}

/// Benchmark this device and pick a time cost that lands derivation in a
/// `target_ms` wall-clock window.
///
/// Runs a single-iteration derivation with the base memory/parallelism
/// costs, then scales the iteration count, clamped to
/// `[MIN_TIME_COST, MAX_TIME_COST]` so a fast device never drops below
/// the brute-force floor. On benchmark failure the base params are
/// returned unchanged.
pub fn calibrate(target_ms: u64, base: &KdfParams) -> KdfParams {
    let probe = KdfParams {
        time_cost: 1,
        ..base.clone()
    };
    let salt = [0u8; SALT_SIZE];

    let start = std::time::Instant::now();
    if argon2_derive(b"cask-calibration-probe", &salt, &probe).is_err() {
        tracing::warn!("KDF calibration probe failed, keeping base params");
        return base.clone();
    }
    let single_ms = start.elapsed().as_millis().max(1) as u64;

    let time_cost = (target_ms / single_ms).clamp(MIN_TIME_COST as u64, MAX_TIME_COST as u64) as u32;

    tracing::info!(
        time_cost,
        single_ms,
        target_ms,
        "calibrated Argon2id time cost"
    );

    KdfParams {
        time_cost,
        ..base.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Fast params for testing
    fn test_params() -> KdfParams {
        KdfParams {
            time_cost: 1,
            mem_cost_kib: 1024,
            parallelism: 1,
        }
    }

    #[test]
    fn test_derive_deterministic() {
        let password = SecretString::from("test-passphrase-123");
        let salt = [1u8; SALT_SIZE];

        let k1 = derive_subkey(&password, &salt, &test_params(), KeyPurpose::Encryption).unwrap();
        let k2 = derive_subkey(&password, &salt, &test_params(), KeyPurpose::Encryption).unwrap();

        assert_eq!(k1.key.as_bytes(), k2.key.as_bytes(), "KDF must be deterministic");
        assert!(!k1.degraded);
    }

    #[test]
    fn test_sub_keys_differ() {
        let password = SecretString::from("same-password");
        let salt = [1u8; SALT_SIZE];

        let (verification, encryption) = derive_keypair(&password, &salt, &test_params()).unwrap();

        assert_ne!(
            verification.key.as_bytes(),
            encryption.key.as_bytes(),
            "domain prefixes must separate the sub-keys"
        );
    }

    #[test]
    fn test_different_passwords() {
        let salt = [1u8; SALT_SIZE];

        let k1 = derive_subkey(
            &SecretString::from("password-a"),
            &salt,
            &test_params(),
            KeyPurpose::Encryption,
        )
        .unwrap();
        let k2 = derive_subkey(
            &SecretString::from("password-b"),
            &salt,
            &test_params(),
            KeyPurpose::Encryption,
        )
        .unwrap();

        assert_ne!(k1.key.as_bytes(), k2.key.as_bytes());
    }

    #[test]
    fn test_different_salts() {
        let password = SecretString::from("same-password");

        let k1 =
            derive_subkey(&password, &[1u8; SALT_SIZE], &test_params(), KeyPurpose::Encryption)
                .unwrap();
        let k2 =
            derive_subkey(&password, &[2u8; SALT_SIZE], &test_params(), KeyPurpose::Encryption)
                .unwrap();

        assert_ne!(k1.key.as_bytes(), k2.key.as_bytes());
    }

    #[test]
    fn test_invalid_params_take_degraded_fallback() {
        let password = SecretString::from("pw");
        let salt = [3u8; SALT_SIZE];
        // parallelism 0 is rejected by Argon2id
        let broken = KdfParams {
            time_cost: 1,
            mem_cost_kib: 1024,
            parallelism: 0,
        };

        let derived = derive_subkey(&password, &salt, &broken, KeyPurpose::Encryption).unwrap();
        assert!(derived.degraded, "fallback must be visible to callers");

        // Still deterministic and still domain-separated
        let again = derive_subkey(&password, &salt, &broken, KeyPurpose::Encryption).unwrap();
        assert_eq!(derived.key.as_bytes(), again.key.as_bytes());

        let verification =
            derive_subkey(&password, &salt, &broken, KeyPurpose::Verification).unwrap();
        assert_ne!(derived.key.as_bytes(), verification.key.as_bytes());
    }

    #[test]
    fn test_fallback_differs_from_argon2() {
        let password = SecretString::from("pw");
        let salt = [3u8; SALT_SIZE];
        let broken = KdfParams {
            time_cost: 1,
            mem_cost_kib: 1024,
            parallelism: 0,
        };

        let argon = derive_subkey(&password, &salt, &test_params(), KeyPurpose::Encryption).unwrap();
        let fallback = derive_subkey(&password, &salt, &broken, KeyPurpose::Encryption).unwrap();
        assert_ne!(argon.key.as_bytes(), fallback.key.as_bytes());
    }

    #[test]
    fn test_generate_salt_unique() {
        assert_ne!(generate_salt(), generate_salt());
    }

    #[test]
    fn test_calibrate_respects_floor() {
        // A huge single-run time relative to the target must still land at
        // the floor, never below it.
        let params = calibrate(1, &test_params());
        assert!(params.time_cost >= MIN_TIME_COST);
        assert!(params.time_cost <= MAX_TIME_COST);
        assert_eq!(params.mem_cost_kib, test_params().mem_cost_kib);
    }

    #[test]
    fn test_vault_key_debug_redacted() {
        let key = VaultKey::from_bytes([42u8; KEY_SIZE]);
        let debug = format!("{key:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("42"));
    }
}
