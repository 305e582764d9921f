//! CLI command implementations

pub mod backup;
pub mod key;
pub mod logs;
pub mod password;
pub mod status;

use std::path::PathBuf;

use anyhow::{Context, Result};
use dialoguer::Password;
use pocketvault_core::config::Config;
use pocketvault_core::domain::KeySource;
use pocketvault_core::{LogEvent, LoggingService, VaultContext};

/// Master password for non-interactive use
pub const ENV_MASTER_PASSWORD: &str = "POCKETVAULT_MASTER_PASSWORD";

/// Open the event log for the current data directory
pub fn open_log() -> Result<LoggingService> {
    let data_dir = get_data_dir()?;
    std::fs::create_dir_all(&data_dir)?;
    LoggingService::new(&data_dir, env!("CARGO_PKG_VERSION"))
}

/// `None` when the log cannot be opened; commands still run without it
pub fn get_logger() -> Option<LoggingService> {
    open_log().ok()
}

/// Record an event, ignoring failures
pub fn log_event(logger: &Option<LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        let _ = l.log(event);
    }
}

/// Get the data directory from POCKETVAULT_DIR or default to ~/.pocketvault
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("POCKETVAULT_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".pocketvault"))
        .context("Could not find home directory; set POCKETVAULT_DIR")
}

/// Read a secret from a flag, an environment variable, or a prompt
pub fn secret_or_prompt(flag: Option<String>, env_var: Option<&str>, prompt: &str) -> Result<String> {
    if let Some(s) = flag.or_else(|| env_var.and_then(|v| std::env::var(v).ok())) {
        return Ok(s);
    }
    Ok(Password::new().with_prompt(prompt).interact()?)
}

/// Like [`secret_or_prompt`], but an interactive entry is asked twice
pub fn secret_with_confirm(
    flag: Option<String>,
    env_var: Option<&str>,
    prompt: &str,
) -> Result<String> {
    if let Some(s) = flag.or_else(|| env_var.and_then(|v| std::env::var(v).ok())) {
        return Ok(s);
    }
    Ok(Password::new()
        .with_prompt(prompt)
        .with_confirmation("Confirm", "Entries do not match")
        .interact()?)
}

/// Open the vault, asking for the master password when no raw key is
/// configured
pub fn get_context() -> Result<VaultContext> {
    let data_dir = get_data_dir()?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

    let config = Config::load(&data_dir)?;
    let keys = pocketvault_core::key_service(&data_dir, &config);
    if keys.status()?.source == KeySource::Uninitialized {
        anyhow::bail!(
            "No field key set up. Run `pocketvault key init` or set POCKETVAULT_FIELD_KEY"
        );
    }

    let master_password = if keys.needs_master_password() {
        Some(secret_or_prompt(None, Some(ENV_MASTER_PASSWORD), "Master password")?)
    } else {
        None
    };

    VaultContext::new(&data_dir, master_password.as_deref())
        .context("Failed to open vault")
}
