//! Result and error types for the core library

use thiserror::Error;

/// Message shown for every archive authentication failure. A wrong passphrase
/// and a corrupted file must stay indistinguishable to the caller.
pub const AUTHENTICATION_FAILED: &str = "wrong passphrase or corrupted file";

/// Core library error type
#[derive(Error, Debug)]
pub enum Error {
    /// A field could not be encrypted (missing or malformed key)
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// A stored field could not be decrypted. Terminal for that field's data.
    #[error("Decryption error: {0}")]
    Decryption(String),

    /// The archive is not a recognized encrypted envelope
    #[error("Unsupported backup format: {0}")]
    Format(String),

    /// Passphrase incorrect or archive corrupted
    #[error("{}", AUTHENTICATION_FAILED)]
    Authentication,

    /// A source collection could not be read while collecting a backup
    #[error("Backup failed: {0}")]
    Backup(String),

    /// Another backup or restore is already running
    #[error("Another backup or restore is already in progress")]
    Busy,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a format error
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;
