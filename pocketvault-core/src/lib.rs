//! PocketVault Core - encrypted storage and backup for personal finance and
//! password records
//!
//! This crate follows a hexagonal layout:
//!
//! - **domain**: Records, archive envelope, encrypted field and key types
//! - **ports**: Trait definitions for external dependencies (Repository)
//! - **services**: Field cipher, backup/restore, passwords, keys, logging
//! - **adapters**: Concrete implementations (DuckDB)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use adapters::duckdb::DuckDbRepository;
use config::Config;
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::Error;
pub use domain::{
    BackupArchive, BackupMetadata, Dataset, EncryptedField, EntityKind, FieldKey, KeyStatus,
    PasswordEntry, RestoreReport,
};
pub use services::{events, LogEvent, LogFilter, LoggingService};

pub const DB_FILENAME: &str = "pocketvault.duckdb";

/// Main context for PocketVault operations
///
/// Holds the database, the resolved field cipher and every service built on
/// them. The field key is resolved once here and injected; nothing else
/// reads it from configuration.
pub struct VaultContext {
    pub config: Config,
    pub data_dir: PathBuf,
    pub repository: Arc<DuckDbRepository>,
    pub cipher: Arc<CipherService>,
    pub password_service: PasswordService,
    pub backup_service: BackupService,
    pub status_service: StatusService,
}

impl VaultContext {
    /// Open the vault in `data_dir`, resolving the field key from
    /// configuration or the master password.
    pub fn new(data_dir: &Path, master_password: Option<&str>) -> Result<Self> {
        let config = Config::load(data_dir)?;
        let key = key_service(data_dir, &config)
            .resolve(master_password)
            .context("Failed to resolve field key")?;
        Self::with_key(data_dir, config, &key)
    }

    /// Open the vault with an already resolved key
    pub fn with_key(data_dir: &Path, config: Config, key: &FieldKey) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create {}", data_dir.display()))?;

        let repository = Arc::new(DuckDbRepository::new(&data_dir.join(DB_FILENAME))?);
        repository.ensure_schema()?;

        let cipher = Arc::new(CipherService::new(key));
        let password_service = PasswordService::new(repository.clone(), Arc::clone(&cipher));
        let backup_service = BackupService::new(
            repository.clone(),
            Arc::clone(&cipher),
            data_dir.to_path_buf(),
        );
        let status_service = StatusService::new(repository.clone());

        Ok(Self {
            config,
            data_dir: data_dir.to_path_buf(),
            repository,
            cipher,
            password_service,
            backup_service,
            status_service,
        })
    }

    pub fn key_service(&self) -> KeyService {
        key_service(&self.data_dir, &self.config)
    }
}

/// Key service for a data directory, honoring a configured hex key
pub fn key_service(data_dir: &Path, config: &Config) -> KeyService {
    KeyService::new(data_dir, config.field_key.clone())
}
