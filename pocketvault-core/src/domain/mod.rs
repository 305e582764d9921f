//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod backup;
mod dataset;
mod encryption;
mod records;
pub mod result;

pub use backup::{BackupArchive, BackupMetadata, FailedEntity, RestoreReport};
pub use dataset::Dataset;
pub use encryption::{
    Argon2Params, EncryptedField, FieldKey, KeyMetadata, KeySource, KeyStatus, IV_SIZE, KEY_SIZE,
    TAG_SIZE,
};
pub use records::{
    Category, CategoryKind, Debt, DebtDirection, EntityKind, EntityRecord, EntityRef, Expense,
    Income, PasswordEntry, Person, StoredPassword,
};
