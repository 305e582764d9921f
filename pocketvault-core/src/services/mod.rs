//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod backup;
mod cipher;
mod keys;
pub mod logging;
pub mod migration;
mod password;
mod status;

pub use backup::{
    BackupService, ClearResult, MIN_PASSPHRASE_LEN, NONCE_SIZE, PBKDF2_ITERATIONS, SALT_SIZE,
};
pub use cipher::CipherService;
pub use keys::{KeyService, KEY_METADATA_FILE};
pub use logging::{events, LogEntry, LogEvent, LogFilter, LogStats, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use password::{NewPassword, PasswordService, PasswordSummary};
pub use status::{CollectionCount, StatusService, StatusSummary};
