//! Backup domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::records::{EntityKind, EntityRef};
use super::result::{Error, Result};

/// The on-disk backup envelope.
///
/// `data` is `base64(salt[16] || nonce[12] || ciphertext+tag)`; the plaintext
/// behind it is a JSON [`Dataset`](super::Dataset).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupArchive {
    pub version: String,
    pub encrypted: bool,
    pub date: DateTime<Utc>,
    pub data: String,
}

impl BackupArchive {
    pub fn new(data: String) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            encrypted: true,
            date: Utc::now(),
            data,
        }
    }

    /// Parse an envelope from raw file bytes.
    ///
    /// Anything that is not JSON with `"encrypted": true` is rejected with
    /// [`Error::Format`] before any decryption is attempted. Plaintext
    /// archives from older releases are not restorable through this path.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| Error::format(format!("archive is not valid JSON: {}", e)))?;

        match value.get("encrypted") {
            Some(serde_json::Value::Bool(true)) => {}
            Some(serde_json::Value::Bool(false)) | None => {
                return Err(Error::format(
                    "archive is not encrypted (legacy plaintext backups are not supported)",
                ));
            }
            Some(_) => return Err(Error::format("'encrypted' flag must be a boolean")),
        }

        serde_json::from_value(value)
            .map_err(|e| Error::format(format!("invalid archive envelope: {}", e)))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Metadata for a backup file in the backups directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupMetadata {
    /// Backup filename (e.g., "pocketvault-2025-01-15T10-30-00-123456.json")
    pub name: String,
    /// When the backup was created
    pub created_at: DateTime<Utc>,
    /// File size in bytes
    pub size_bytes: u64,
}

impl BackupMetadata {
    pub fn new(name: impl Into<String>, created_at: DateTime<Utc>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            created_at,
            size_bytes,
        }
    }

    /// Format size for human display
    pub fn size_display(&self) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;
        const GB: u64 = MB * 1024;

        if self.size_bytes >= GB {
            format!("{:.1} GB", self.size_bytes as f64 / GB as f64)
        } else if self.size_bytes >= MB {
            format!("{:.1} MB", self.size_bytes as f64 / MB as f64)
        } else if self.size_bytes >= KB {
            format!("{:.1} KB", self.size_bytes as f64 / KB as f64)
        } else {
            format!("{} bytes", self.size_bytes)
        }
    }
}

/// A record that could not be written back during restore
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedEntity {
    pub kind: EntityKind,
    pub id: Uuid,
    pub error: String,
}

/// Outcome of a restore.
///
/// Replay is best effort: one bad record does not stop the rest, but every
/// failure is listed here so it can be shown to the user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RestoreReport {
    /// Number of records deleted before replay
    pub removed: u64,
    pub restored: Vec<EntityRef>,
    pub failed: Vec<FailedEntity>,
}

impl RestoreReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn restored_count(&self, kind: EntityKind) -> usize {
        self.restored.iter().filter(|r| r.kind == kind).count()
    }
}
