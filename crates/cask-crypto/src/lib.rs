//! cask-crypto: the vault cryptographic engine
//!
//! Key hierarchy:
//! ```text
//! Master password
//!   ├── Verification sub-key (Argon2id over "V:" || password)
//!   │     └── decrypts the verifier blob — the only proof of "password correct"
//!   └── Encryption sub-key (Argon2id over "E:" || password)
//!         └── Record AEAD: AES-256-GCM (nonce=random_96bit, detached 128-bit tag)
//! ```
//!
//! Both sub-keys share the same salt and cost parameters; the domain
//! prefix keeps them mutually underivable. Neither the password nor any
//! reversible hash of it is ever persisted — only the salt, the cost
//! parameters, and the verifier ciphertext.

pub mod aead;
pub mod header;
pub mod kdf;
pub mod verifier;

pub use aead::{open, seal};
pub use header::VaultHeader;
pub use kdf::{
    calibrate, derive_keypair, derive_subkey, generate_salt, DerivedKey, KdfParams, KeyPurpose,
    VaultKey,
};
pub use verifier::{check_verifier, create_verifier};

pub use cask_core::{KEY_SIZE, NONCE_SIZE, SALT_SIZE, TAG_SIZE};
