//! Console prompts: no-echo password entry and the fast-unlock
//! confirmation prompt

use std::io::Write;

use anyhow::Result;
use async_trait::async_trait;
use secrecy::SecretString;
use zeroize::Zeroize;

use cask_keywrap::{BiometricOutcome, BiometricPrompt};

const MIN_MASTER_PASSWORD_LEN: usize = 8;

pub fn password(prompt_text: &str) -> Result<SecretString> {
    let entered = rpassword::prompt_password(prompt_text)?;
    Ok(SecretString::from(entered))
}

/// Prompt for a new master password with confirmation.
pub fn new_password() -> Result<SecretString> {
    let first = rpassword::prompt_password("New master password: ")?;
    let mut second = rpassword::prompt_password("Confirm master password: ")?;

    let matches = first == second;
    second.zeroize();

    if !matches {
        anyhow::bail!("passwords do not match");
    }
    if first.chars().count() < MIN_MASTER_PASSWORD_LEN {
        anyhow::bail!("master password must be at least {MIN_MASTER_PASSWORD_LEN} characters");
    }

    Ok(SecretString::from(first))
}

pub fn record_password() -> Result<String> {
    Ok(rpassword::prompt_password("Password for this record: ")?)
}

/// Terminal stand-in for a platform biometric prompt: asks for an
/// explicit confirmation. The wrapping secret itself lives in the
/// platform keychain, whose own access control applies on top.
#[derive(Default)]
pub struct ConsolePrompt;

impl ConsolePrompt {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BiometricPrompt for ConsolePrompt {
    fn is_available(&self) -> bool {
        true
    }

    async fn authenticate(&self, reason: &str) -> BiometricOutcome {
        let reason = reason.to_string();
        let confirmed = tokio::task::spawn_blocking(move || -> std::io::Result<bool> {
            eprintln!("{reason}");
            eprint!("Confirm [y/N]: ");
            std::io::stderr().flush()?;

            let mut line = String::new();
            std::io::stdin().read_line(&mut line)?;
            Ok(matches!(line.trim(), "y" | "Y" | "yes"))
        })
        .await;

        match confirmed {
            Ok(Ok(true)) => BiometricOutcome::Success,
            Ok(Ok(false)) => BiometricOutcome::Cancelled,
            _ => BiometricOutcome::Error,
        }
    }
}
