//! Shared vault data types: encrypted blobs, records, and the decrypted
//! record envelope.
//!
//! A [`VaultRecord`] is what the record store sees: opaque ciphertext plus
//! the non-sensitive routing metadata it may index (category, folder,
//! timestamps, tombstone). Everything sensitive — title, username,
//! password, notes, category-specific fields — lives inside the
//! AEAD-encrypted [`RecordEnvelope`].

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of a derived key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-256-GCM nonce
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Size of the KDF salt
pub const SALT_SIZE: usize = 16;

/// An AEAD ciphertext with its detached nonce and tag.
///
/// Serialized with base64 string fields so it can be embedded in the
/// persisted vault header and record store JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBlob {
    #[serde(with = "b64::vec")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "b64::array")]
    pub nonce: [u8; NONCE_SIZE],
    #[serde(with = "b64::array")]
    pub tag: [u8; TAG_SIZE],
}

/// Record category. Persisted in plaintext on the record for routing and
/// non-sensitive indexing; also the tag of [`RecordBody`] inside the
/// encrypted envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Login,
    Card,
    Note,
    File,
    Crypto,
    Passkey,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Login => "login",
            Category::Card => "card",
            Category::Note => "note",
            Category::File => "file",
            Category::Crypto => "crypto",
            Category::Passkey => "passkey",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-defined extra field on a record.
#[derive(Debug, Clone, Serialize, Deserialize, Zeroize)]
pub struct CustomField {
    pub label: String,
    pub value: String,
    #[zeroize(skip)]
    #[serde(default)]
    pub secret: bool,
}

/// Category-specific sensitive fields, tagged by category.
#[derive(Debug, Clone, Serialize, Deserialize, Zeroize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum RecordBody {
    Login {
        #[serde(default)]
        password: String,
        #[serde(default)]
        url: String,
        #[serde(default)]
        totp_seed: Option<String>,
        #[serde(default)]
        custom_fields: Vec<CustomField>,
    },
    Card {
        number: String,
        expiry: String,
        cvv: String,
        holder: String,
    },
    Note,
    File {
        file_name: String,
        #[serde(default)]
        file_mime: String,
        #[serde(default)]
        file_size: u64,
    },
    Crypto {
        wallet_name: String,
        network: String,
        address: String,
        seed: String,
        #[serde(default)]
        private_key: Option<String>,
    },
    Passkey {
        credential_id: String,
        public_key: String,
        sign_count: u32,
        rp_id: String,
        display_name: String,
    },
}

impl RecordBody {
    pub fn category(&self) -> Category {
        match self {
            RecordBody::Login { .. } => Category::Login,
            RecordBody::Card { .. } => Category::Card,
            RecordBody::Note => Category::Note,
            RecordBody::File { .. } => Category::File,
            RecordBody::Crypto { .. } => Category::Crypto,
            RecordBody::Passkey { .. } => Category::Passkey,
        }
    }

    /// The password-like secret audited for strength and reuse, if any.
    pub fn password(&self) -> Option<&str> {
        match self {
            RecordBody::Login { password, .. } if !password.is_empty() => Some(password),
            _ => None,
        }
    }
}

/// The decrypted contents of a record: common display fields plus the
/// category-specific body. Zeroized on drop so plaintext secrets do not
/// linger after a scoped decryption.
#[derive(Debug, Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct RecordEnvelope {
    pub title: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub notes: String,
    #[serde(flatten)]
    pub body: RecordBody,
}

/// A stored vault record: encrypted payload plus routing metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultRecord {
    /// Opaque stable identifier (UUID v4)
    pub id: String,
    pub category: Category,
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub favorite: bool,
    pub created_at: u64,
    pub updated_at: u64,
    /// Soft-delete tombstone (Unix epoch seconds); physical deletion only
    /// happens on explicit purge.
    #[serde(default)]
    pub deleted_at: Option<u64>,
    /// The encrypted [`RecordEnvelope`]
    pub payload: EncryptedBlob,
    /// Separately encrypted file attachment, with its own nonce/tag
    #[serde(default)]
    pub attachment: Option<EncryptedBlob>,
}

impl VaultRecord {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Base64 serde adapters for binary fields in persisted JSON.
pub mod b64 {
    pub mod vec {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
            s.serialize_str(&STANDARD.encode(bytes))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
            let encoded = String::deserialize(d)?;
            STANDARD.decode(&encoded).map_err(serde::de::Error::custom)
        }
    }

    pub mod array {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer, const N: usize>(
            bytes: &[u8; N],
            s: S,
        ) -> Result<S::Ok, S::Error> {
            s.serialize_str(&STANDARD.encode(bytes))
        }

        pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
            d: D,
        ) -> Result<[u8; N], D::Error> {
            let encoded = String::deserialize(d)?;
            let decoded = STANDARD.decode(&encoded).map_err(serde::de::Error::custom)?;
            decoded.try_into().map_err(|v: Vec<u8>| {
                serde::de::Error::custom(format!("expected {N} bytes, got {}", v.len()))
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_blob() -> EncryptedBlob {
        EncryptedBlob {
            ciphertext: vec![1, 2, 3, 4],
            nonce: [7u8; NONCE_SIZE],
            tag: [9u8; TAG_SIZE],
        }
    }

    #[test]
    fn test_blob_serde_roundtrip() {
        let blob = sample_blob();
        let json = serde_json::to_string(&blob).unwrap();
        let restored: EncryptedBlob = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, blob);
    }

    #[test]
    fn test_blob_fields_are_base64_strings() {
        let json = serde_json::to_value(sample_blob()).unwrap();
        assert!(json["ciphertext"].is_string());
        assert!(json["nonce"].is_string());
        assert!(json["tag"].is_string());
    }

    #[test]
    fn test_blob_rejects_wrong_nonce_length() {
        let mut json = serde_json::to_value(sample_blob()).unwrap();
        // 8 bytes instead of 12
        json["nonce"] = serde_json::Value::String("AAAAAAAAAAA=".into());
        let result: Result<EncryptedBlob, _> = serde_json::from_value(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_envelope_tagged_by_category() {
        let envelope = RecordEnvelope {
            title: "GitHub".into(),
            username: "octocat".into(),
            notes: String::new(),
            body: RecordBody::Login {
                password: "hunter2".into(),
                url: "https://github.com".into(),
                totp_seed: None,
                custom_fields: vec![],
            },
        };

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["category"], "login");
        assert_eq!(json["password"], "hunter2");

        let restored: RecordEnvelope = serde_json::from_value(json).unwrap();
        assert_eq!(restored.body.category(), Category::Login);
        assert_eq!(restored.body.password(), Some("hunter2"));
    }

    #[test]
    fn test_note_body_has_no_password() {
        let envelope = RecordEnvelope {
            title: "wifi".into(),
            username: String::new(),
            notes: "the router password is on the box".into(),
            body: RecordBody::Note,
        };

        let json = serde_json::to_string(&envelope).unwrap();
        let restored: RecordEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.body.category(), Category::Note);
        assert!(restored.body.password().is_none());
    }

    #[test]
    fn test_record_tombstone() {
        let mut record = VaultRecord {
            id: "r1".into(),
            category: Category::Login,
            folder_id: None,
            favorite: false,
            created_at: 100,
            updated_at: 100,
            deleted_at: None,
            payload: sample_blob(),
            attachment: None,
        };
        assert!(!record.is_deleted());

        record.deleted_at = Some(200);
        assert!(record.is_deleted());
    }
}
