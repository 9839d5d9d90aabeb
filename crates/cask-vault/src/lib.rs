//! cask-vault: the vault engine
//!
//! Ties the cryptographic primitives, the record store, and the key-wrap
//! manager together behind one [`Vault`] type:
//!
//! - unlock via password (Argon2id + verifier) or biometric envelope,
//!   with an escalating lockout shared by both paths
//! - record CRUD through the live session key, payload and attachment
//!   each under their own nonce
//! - master-password rotation with a compute-all-then-commit stage gate
//! - security audit and duplicate cleanup over transiently decrypted
//!   records
//!
//! Record CRUD runs under a shared read lock and rotation under the
//! write lock, so ordinary operations are concurrent with each other but
//! never with a rotation in flight.

pub mod audit;
pub mod dedup;
pub mod generate;
pub mod lockout;
pub mod records;
pub mod rotate;
pub mod session;
mod vault;

pub use audit::{classify_strength, AuditReport, Strength};
pub use dedup::DedupReport;
pub use generate::generate_password;
pub use lockout::LockoutState;
pub use records::NewRecord;
pub use session::VaultSession;
pub use vault::Vault;

pub(crate) fn now_epoch() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
