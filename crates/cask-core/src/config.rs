use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration (loaded from cask.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CaskConfig {
    pub crypto: CryptoConfig,
    pub session: SessionConfig,
    pub store: StoreConfig,
    pub log: LogConfig,
}

/// Argon2id cost parameters and calibration bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Argon2id time cost / iterations (default: 3)
    pub argon2_time_cost: u32,
    /// Argon2id memory cost in KiB (default: 65536 = 64 MiB)
    pub argon2_mem_cost_kib: u32,
    /// Argon2id parallelism (default: 4)
    pub argon2_parallelism: u32,
    /// Target wall-clock unlock time for per-device calibration, in ms
    pub calibrate_target_ms: u64,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            argon2_time_cost: 3,
            argon2_mem_cost_kib: 65536,
            argon2_parallelism: 4,
            calibrate_target_ms: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Auto-lock after this many seconds in the background (default: 120)
    pub auto_lock_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { auto_lock_secs: 120 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the vault header and record files
    pub vault_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            vault_dir: PathBuf::from("~/.local/share/cask"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[crypto]
argon2_time_cost = 4
argon2_mem_cost_kib = 131072
argon2_parallelism = 8
calibrate_target_ms = 800

[session]
auto_lock_secs = 30

[store]
vault_dir = "/var/lib/cask"

[log]
level = "debug"
format = "json"
"#;
        let config: CaskConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.crypto.argon2_time_cost, 4);
        assert_eq!(config.crypto.argon2_mem_cost_kib, 131072);
        assert_eq!(config.crypto.argon2_parallelism, 8);
        assert_eq!(config.crypto.calibrate_target_ms, 800);
        assert_eq!(config.session.auto_lock_secs, 30);
        assert_eq!(config.store.vault_dir, PathBuf::from("/var/lib/cask"));
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, "json");
    }

    #[test]
    fn test_parse_defaults() {
        let config: CaskConfig = toml::from_str("").unwrap();

        assert_eq!(config.crypto.argon2_time_cost, 3);
        assert_eq!(config.crypto.argon2_mem_cost_kib, 65536);
        assert_eq!(config.crypto.argon2_parallelism, 4);
        assert_eq!(config.session.auto_lock_secs, 120);
        assert_eq!(config.log.level, "info");
        assert_eq!(config.log.format, "text");
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[crypto]
argon2_time_cost = 5
"#;
        let config: CaskConfig = toml::from_str(toml_str).unwrap();

        // Overridden
        assert_eq!(config.crypto.argon2_time_cost, 5);
        // Defaults
        assert_eq!(config.crypto.argon2_mem_cost_kib, 65536);
        assert_eq!(config.session.auto_lock_secs, 120);
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = CaskConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: CaskConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.crypto.argon2_time_cost, config.crypto.argon2_time_cost);
        assert_eq!(parsed.session.auto_lock_secs, config.session.auto_lock_secs);
        assert_eq!(parsed.store.vault_dir, config.store.vault_dir);
    }
}
