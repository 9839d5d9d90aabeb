//! cask: caskvault command-line client
//!
//! Commands:
//!   init                - create a new vault (choose a master password)
//!   status              - show vault metadata and record counts
//!   add                 - add a login record (optionally with attachment)
//!   list                - list records with decrypted titles
//!   show <id>           - show one record (password only with --reveal)
//!   rm / restore / purge <id> - tombstone, un-tombstone, or remove a record
//!   rotate              - change the master password (full re-encryption)
//!   audit               - password strength / reuse report and vault score
//!   dedup               - collapse duplicate records
//!   gen                 - generate a random password
//!   keywrap enable|disable|status - manage the fast-unlock envelope

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;

use cask_core::config::CaskConfig;
use cask_core::{CustomField, RecordBody, RecordEnvelope};
use cask_keywrap::{KeyringKeyStore, KeyWrapManager};
use cask_store::JsonFileStore;
use cask_vault::{generate_password, NewRecord, Vault};

mod prompt;

use prompt::ConsolePrompt;

type CliVault = Vault<JsonFileStore, KeyringKeyStore, ConsolePrompt>;

const KEYWRAP_ALIAS: &str = "cask-vault-key";

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "cask",
    version,
    about = "caskvault: local-first encrypted secrets vault",
    long_about = "cask: manage an on-device secrets vault encrypted under a master password"
)]
struct Cli {
    /// Path to cask.toml configuration file
    #[arg(long, short = 'c', env = "CASK_CONFIG")]
    config: Option<PathBuf>,

    /// Vault directory (overrides config)
    #[arg(long, env = "CASK_VAULT_DIR")]
    vault_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new vault
    Init,

    /// Show vault metadata and record counts
    Status,

    /// Add a login record
    Add {
        /// Record title
        title: String,
        /// Username / account name
        #[arg(long, short = 'u', default_value = "")]
        username: String,
        /// Site URL
        #[arg(long, default_value = "")]
        url: String,
        /// Free-text notes
        #[arg(long, default_value = "")]
        notes: String,
        /// Folder id
        #[arg(long)]
        folder: Option<String>,
        /// Mark as favorite
        #[arg(long)]
        favorite: bool,
        /// Attach a file
        #[arg(long)]
        attach: Option<PathBuf>,
        /// Generate the password instead of prompting for it
        #[arg(long)]
        generate: bool,
    },

    /// List records (tombstoned ones with --all)
    List {
        #[arg(long)]
        all: bool,
    },

    /// Show a single record
    Show {
        id: String,
        /// Print the password in the clear
        #[arg(long)]
        reveal: bool,
    },

    /// Tombstone a record (recoverable until purged)
    Rm { id: String },

    /// Clear a record's tombstone
    Restore { id: String },

    /// Physically remove a record
    Purge { id: String },

    /// Change the master password, re-encrypting every record
    Rotate,

    /// Password strength / reuse report
    Audit,

    /// Collapse duplicate records
    Dedup,

    /// Generate a random password
    Gen {
        #[arg(long, default_value_t = 20)]
        length: usize,
        #[arg(long)]
        no_upper: bool,
        #[arg(long)]
        no_digits: bool,
        #[arg(long)]
        no_symbols: bool,
    },

    /// Fast-unlock envelope management
    Keywrap {
        #[command(subcommand)]
        action: KeywrapAction,
    },
}

#[derive(Subcommand, Debug)]
enum KeywrapAction {
    /// Wrap the session key for fast unlock
    Enable,
    /// Remove the envelope and its wrapping secret
    Disable,
    /// Show enrollment state
    Status,
}

// ── Entrypoint ─────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(&config.log.level, &config.log.format);

    let vault_dir = cli
        .vault_dir
        .clone()
        .unwrap_or_else(|| expand_home(&config.store.vault_dir));
    let header_path = vault_dir.join("header.json");
    let records_path = vault_dir.join("records.json");

    match cli.command {
        Commands::Init => {
            if header_path.exists() {
                anyhow::bail!("vault already exists at {}", vault_dir.display());
            }
            let password = prompt::new_password()?;
            let store = JsonFileStore::open(&records_path).await?;
            let keywrap = keywrap_manager();

            println!("Calibrating key derivation for this device...");
            Vault::setup(&header_path, &config, store, keywrap, password).await?;
            println!("Vault created at {}", vault_dir.display());
        }

        Commands::Status => {
            let header = cask_crypto::VaultHeader::load(&header_path)
                .await
                .context("no vault found; run `cask init` first")?;
            let store = JsonFileStore::open(&records_path).await?;
            let records = {
                use cask_store::RecordStore;
                store.list().await?
            };
            let live = records.iter().filter(|r| !r.is_deleted()).count();

            println!("Vault:            {}", vault_dir.display());
            println!(
                "KDF:              Argon2id t={} m={}KiB p={}",
                header.kdf_iterations, header.kdf_memory_kb, header.kdf_parallelism
            );
            if header.kdf_degraded {
                println!("KDF health:       DEGRADED (SHA-256 fallback in use)");
            }
            println!(
                "Fast unlock:      {}",
                if header.biometric_envelope.is_some() {
                    "enrolled"
                } else {
                    "not enrolled"
                }
            );
            println!("Records:          {live} live, {} tombstoned", records.len() - live);
        }

        Commands::Add {
            title,
            username,
            url,
            notes,
            folder,
            favorite,
            attach,
            generate,
        } => {
            let vault = open_unlocked(&header_path, &records_path, &config).await?;

            let password = if generate {
                let password = generate_password(20, true, true, true);
                println!("Generated password: {password}");
                password
            } else {
                prompt::record_password()?
            };

            let attachment = match &attach {
                Some(path) => Some(
                    std::fs::read(path)
                        .with_context(|| format!("reading attachment {}", path.display()))?,
                ),
                None => None,
            };

            let record = vault
                .create_record(NewRecord {
                    envelope: RecordEnvelope {
                        title,
                        username,
                        notes,
                        body: RecordBody::Login {
                            password,
                            url,
                            totp_seed: None,
                            custom_fields: Vec::<CustomField>::new(),
                        },
                    },
                    folder_id: folder,
                    favorite,
                    attachment,
                })
                .await?;
            println!("Added {}", record.id);
        }

        Commands::List { all } => {
            let vault = open_unlocked(&header_path, &records_path, &config).await?;
            let records = vault.list_records().await?;

            for record in records {
                if record.is_deleted() && !all {
                    continue;
                }
                let marker = match (record.favorite, record.is_deleted()) {
                    (_, true) => "✗",
                    (true, false) => "★",
                    (false, false) => " ",
                };
                match vault.read_record(&record.id).await {
                    Ok(envelope) => println!(
                        "{marker} {}  [{}]  {}  {}",
                        record.id, record.category, envelope.title, envelope.username
                    ),
                    Err(e) => println!("{marker} {}  [{}]  <unreadable: {e}>", record.id, record.category),
                }
            }
        }

        Commands::Show { id, reveal } => {
            let vault = open_unlocked(&header_path, &records_path, &config).await?;
            let envelope = vault.read_record(&id).await?;

            println!("Title:    {}", envelope.title);
            println!("Username: {}", envelope.username);
            if let RecordBody::Login { password, url, .. } = &envelope.body {
                if reveal {
                    println!("Password: {password}");
                } else {
                    println!("Password: ******** (use --reveal)");
                }
                if !url.is_empty() {
                    println!("URL:      {url}");
                }
            }
            if !envelope.notes.is_empty() {
                println!("Notes:    {}", envelope.notes);
            }
        }

        Commands::Rm { id } => {
            let vault = open_unlocked(&header_path, &records_path, &config).await?;
            vault.soft_delete(&id).await?;
            println!("Tombstoned {id} (restore with `cask restore`, remove with `cask purge`)");
        }

        Commands::Restore { id } => {
            let vault = open_unlocked(&header_path, &records_path, &config).await?;
            vault.restore(&id).await?;
            println!("Restored {id}");
        }

        Commands::Purge { id } => {
            let vault = open_unlocked(&header_path, &records_path, &config).await?;
            vault.purge(&id).await?;
            println!("Purged {id}");
        }

        Commands::Rotate => {
            let store = JsonFileStore::open(&records_path).await?;
            let vault: CliVault =
                Vault::open(&header_path, &config, store, keywrap_manager()).await?;

            let old_password = prompt::password("Current master password: ")?;
            let new_password = prompt::new_password()?;

            let bar = ProgressBar::new(0);
            bar.set_style(
                ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len}")
                    .expect("static template"),
            );
            bar.set_message("re-encrypting");

            vault
                .rotate(old_password, new_password, &CancellationToken::new(), |done, total| {
                    bar.set_length(total as u64);
                    bar.set_position(done as u64);
                })
                .await?;
            bar.finish_with_message("done");
            println!("Master password rotated. Fast-unlock enrollment was reset.");
        }

        Commands::Audit => {
            let vault = open_unlocked(&header_path, &records_path, &config).await?;
            let report = vault.audit().await?;

            println!("Audited:   {} password records", report.total);
            println!("Weak:      {}", report.weak_ids.len());
            println!("Reused:    {}", report.reused_ids.len());
            if report.skipped > 0 {
                println!("Skipped:   {} unreadable", report.skipped);
            }
            if vault.kdf_degraded().await {
                println!("Warning:   KDF running in degraded fallback mode");
            }
            println!("Score:     {}/100", report.score);
        }

        Commands::Dedup => {
            let vault = open_unlocked(&header_path, &records_path, &config).await?;
            let report = vault.dedup().await?;

            if report.deleted_ids.is_empty() {
                println!("No duplicates found");
            } else {
                for id in &report.deleted_ids {
                    println!("Removed duplicate {id}");
                }
            }
            if report.skipped > 0 {
                println!("Skipped {} unreadable records", report.skipped);
            }
        }

        Commands::Gen {
            length,
            no_upper,
            no_digits,
            no_symbols,
        } => {
            println!(
                "{}",
                generate_password(length, !no_upper, !no_digits, !no_symbols)
            );
        }

        Commands::Keywrap { action } => {
            let vault = match action {
                KeywrapAction::Status => {
                    let header = cask_crypto::VaultHeader::load(&header_path).await?;
                    println!(
                        "Fast unlock: {}",
                        if header.biometric_envelope.is_some() {
                            "enrolled"
                        } else {
                            "not enrolled"
                        }
                    );
                    return Ok(());
                }
                KeywrapAction::Enable => {
                    let vault = open_unlocked(&header_path, &records_path, &config).await?;
                    vault.enable_biometric().await?;
                    println!("Fast unlock enrolled");
                    vault
                }
                KeywrapAction::Disable => {
                    let vault = open_unlocked(&header_path, &records_path, &config).await?;
                    vault.disable_biometric().await?;
                    println!("Fast unlock disabled");
                    vault
                }
            };
            vault.lock().await;
        }
    }

    Ok(())
}

// ── Helpers ────────────────────────────────────────────────────────────────────

/// Open the vault and unlock it, trying the fast-unlock envelope first
/// and falling back to the master password.
async fn open_unlocked(
    header_path: &PathBuf,
    records_path: &PathBuf,
    config: &CaskConfig,
) -> Result<CliVault> {
    let store = JsonFileStore::open(records_path).await?;
    let vault: CliVault = Vault::open(header_path, config, store, keywrap_manager())
        .await
        .context("no vault found; run `cask init` first")?;

    if vault.biometric_enabled().await && vault.unlock_with_biometric().await? {
        return Ok(vault);
    }

    let password = prompt::password("Master password: ")?;
    vault
        .unlock_with_password(password, &CancellationToken::new())
        .await?;
    Ok(vault)
}

fn keywrap_manager() -> KeyWrapManager<KeyringKeyStore, ConsolePrompt> {
    KeyWrapManager::new(KeyringKeyStore::new(), ConsolePrompt::new(), KEYWRAP_ALIAS)
}

fn load_config(cli: &Cli) -> Result<CaskConfig> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| expand_home(&PathBuf::from("~/.config/cask/cask.toml")));

    match std::fs::read_to_string(&path) {
        Ok(content) => {
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(CaskConfig::default()),
        Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
    }
}

fn expand_home(path: &std::path::Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
            PathBuf::from(home).join(rest)
        }
        Err(_) => path.to_path_buf(),
    }
}

fn init_logging(level: &str, format: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_expand_home() {
        std::env::set_var("HOME", "/home/tester");
        assert_eq!(
            expand_home(&PathBuf::from("~/.local/share/cask")),
            PathBuf::from("/home/tester/.local/share/cask")
        );
        assert_eq!(
            expand_home(&PathBuf::from("/absolute/path")),
            PathBuf::from("/absolute/path")
        );
    }
}
