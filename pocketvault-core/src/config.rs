//! Configuration management
//!
//! Settings live in `settings.json` inside the data directory:
//! ```json
//! {
//!   "security": { "fieldKey": "<64 hex chars>" },
//!   "backup": { "maxBackups": 10 }
//! }
//! ```
//! Environment variables take precedence over the file.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

pub const SETTINGS_FILE: &str = "settings.json";
pub const ENV_FIELD_KEY: &str = "POCKETVAULT_FIELD_KEY";
pub const ENV_MAX_BACKUPS: &str = "POCKETVAULT_MAX_BACKUPS";

/// settings.json as written by the user; unknown keys are ignored
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    security: SecuritySettings,
    #[serde(default)]
    backup: BackupSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecuritySettings {
    #[serde(default)]
    field_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackupSettings {
    #[serde(default)]
    max_backups: Option<usize>,
}

/// Resolved configuration
#[derive(Clone, Default)]
pub struct Config {
    /// Raw 256-bit field key as hex, if one is configured
    pub field_key: Option<String>,
    /// Number of archives kept by `backup create`; unlimited when unset
    pub max_backups: Option<usize>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("field_key", &self.field_key.as_ref().map(|_| "[REDACTED]"))
            .field("max_backups", &self.max_backups)
            .finish()
    }
}

impl Config {
    /// Load config from the data directory.
    ///
    /// `POCKETVAULT_FIELD_KEY` overrides `security.fieldKey` and
    /// `POCKETVAULT_MAX_BACKUPS` overrides `backup.maxBackups`. A malformed
    /// settings file is treated as empty.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let raw = read_settings(data_dir)?;

        let field_key = match std::env::var(ENV_FIELD_KEY) {
            Ok(key) if !key.trim().is_empty() => Some(key.trim().to_string()),
            _ => raw.security.field_key,
        };

        let max_backups = match std::env::var(ENV_MAX_BACKUPS) {
            Ok(value) if !value.trim().is_empty() => Some(
                value
                    .trim()
                    .parse()
                    .with_context(|| format!("{} must be a number, got '{}'", ENV_MAX_BACKUPS, value))?,
            ),
            _ => raw.backup.max_backups,
        };

        Ok(Self {
            field_key,
            max_backups,
        })
    }
}

fn read_settings(data_dir: &Path) -> Result<SettingsFile> {
    let settings_path = data_dir.join(SETTINGS_FILE);
    if !settings_path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(&settings_path)
        .with_context(|| format!("Failed to read {}", settings_path.display()))?;
    Ok(serde_json::from_str(&content).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert!(config.max_backups.is_none());
    }

    #[test]
    fn test_load_settings_file() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{"security":{"fieldKey":"ab"},"backup":{"maxBackups":3},"theme":"dark"}"#,
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.max_backups, Some(3));
        if std::env::var(ENV_FIELD_KEY).is_err() {
            assert_eq!(config.field_key.as_deref(), Some("ab"));
        }
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = Config {
            field_key: Some("00ff".repeat(16)),
            max_backups: None,
        };
        assert!(!format!("{:?}", config).contains("00ff"));
    }
}
