//! Backup service - passphrase-encrypted snapshots of the whole dataset
//!
//! A backup is the JSON dataset sealed with AES-256-GCM under a key stretched
//! from the user's passphrase with PBKDF2-HMAC-SHA256. The salt and nonce
//! travel with the ciphertext inside the archive's `data` field.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, NaiveDateTime, Utc};
use fs2::FileExt;
use rand::RngCore;
use serde::Serialize;
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use crate::domain::result::{Error, Result};
use crate::domain::{
    BackupArchive, BackupMetadata, Dataset, EntityKind, EntityRecord, FailedEntity,
    RestoreReport, KEY_SIZE, TAG_SIZE,
};
use crate::ports::Repository;
use crate::services::CipherService;

pub const PBKDF2_ITERATIONS: u32 = 100_000;
pub const SALT_SIZE: usize = 16;
pub const NONCE_SIZE: usize = 12;
pub const MIN_PASSPHRASE_LEN: usize = 4;

const BACKUP_PREFIX: &str = "pocketvault-";
const BACKUP_EXT: &str = ".json";
const LOCK_FILE: &str = ".lock";

/// Held for the duration of one backup, restore or clear
struct OperationGuard<'a> {
    _permit: MutexGuard<'a, ()>,
    lock_file: File,
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.lock_file);
    }
}

fn derive_backup_key(passphrase: &str, salt: &[u8]) -> Zeroizing<[u8; KEY_SIZE]> {
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, PBKDF2_ITERATIONS, &mut *key);
    key
}

fn backup_cipher(passphrase: &str, salt: &[u8]) -> Result<Aes256Gcm> {
    let key = derive_backup_key(passphrase, salt);
    Aes256Gcm::new_from_slice(key.as_slice())
        .map_err(|_| Error::Encryption("invalid backup key length".to_string()))
}

/// `salt || nonce || ciphertext+tag`, base64 encoded
fn seal_payload(plaintext: &[u8], passphrase: &str) -> Result<String> {
    let mut salt = [0u8; SALT_SIZE];
    let mut nonce = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    rand::thread_rng().fill_bytes(&mut nonce);

    let sealed = backup_cipher(passphrase, &salt)?
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| Error::Encryption("backup encryption failed".to_string()))?;

    let mut blob = Vec::with_capacity(SALT_SIZE + NONCE_SIZE + sealed.len());
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&sealed);
    Ok(STANDARD.encode(blob))
}

/// Inverse of [`seal_payload`]. Any tag failure is reported as
/// [`Error::Authentication`], whether the passphrase or the bytes are wrong.
fn open_payload(data: &str, passphrase: &str) -> Result<Zeroizing<Vec<u8>>> {
    let blob = STANDARD
        .decode(data.trim())
        .map_err(|_| Error::format("archive data is not valid base64"))?;

    if blob.len() < SALT_SIZE + NONCE_SIZE + TAG_SIZE {
        return Err(Error::format("archive data is truncated"));
    }

    let (salt, rest) = blob.split_at(SALT_SIZE);
    let (nonce, sealed) = rest.split_at(NONCE_SIZE);

    backup_cipher(passphrase, salt)?
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map(Zeroizing::new)
        .map_err(|_| Error::Authentication)
}

/// Result of clearing the backups directory
#[derive(Debug, Serialize)]
pub struct ClearResult {
    pub deleted: usize,
}

/// Creates, lists and restores encrypted backups
pub struct BackupService {
    repository: Arc<dyn Repository>,
    cipher: Arc<CipherService>,
    data_dir: PathBuf,
    lock: Mutex<()>,
}

impl BackupService {
    pub fn new(
        repository: Arc<dyn Repository>,
        cipher: Arc<CipherService>,
        data_dir: PathBuf,
    ) -> Self {
        Self {
            repository,
            cipher,
            data_dir,
            lock: Mutex::new(()),
        }
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.data_dir.join("backups")
    }

    /// Take the single in-process permit and the on-disk lock, or fail fast
    /// with [`Error::Busy`].
    fn begin(&self) -> Result<OperationGuard<'_>> {
        let permit = match self.lock.try_lock() {
            Ok(permit) => permit,
            Err(TryLockError::WouldBlock) => return Err(Error::Busy),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        let backups_dir = self.backups_dir();
        fs::create_dir_all(&backups_dir)?;
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(backups_dir.join(LOCK_FILE))?;

        match lock_file.try_lock_exclusive() {
            Ok(()) => {}
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => return Err(Error::Busy),
            Err(e) => return Err(e.into()),
        }

        Ok(OperationGuard {
            _permit: permit,
            lock_file,
        })
    }

    /// Snapshot every collection into an encrypted archive.
    ///
    /// Password secrets are decrypted with the field key and carried in
    /// plaintext inside the sealed payload.
    pub fn create_backup(&self, passphrase: &str) -> Result<BackupArchive> {
        validate_passphrase(passphrase)?;
        let _guard = self.begin()?;
        self.build_archive(passphrase)
    }

    /// Caller holds the operation guard
    fn build_archive(&self, passphrase: &str) -> Result<BackupArchive> {
        let mut dataset = self.collect()?;
        let plaintext = serde_json::to_vec(&dataset).map(Zeroizing::new);
        dataset.scrub_secrets();

        let data = seal_payload(&plaintext?, passphrase)?;
        Ok(BackupArchive::new(data))
    }

    fn collect(&self) -> Result<Dataset> {
        let mut dataset = Dataset::default();

        for kind in EntityKind::ALL {
            let records = self
                .repository
                .list_entities(kind)
                .map_err(|e| Error::Backup(format!("could not read {}: {}", kind, e)))?;

            for record in records {
                match record {
                    EntityRecord::Category(r) => dataset.categories.push(r),
                    EntityRecord::Person(r) => dataset.people.push(r),
                    EntityRecord::Expense(r) => dataset.expenses.push(r),
                    EntityRecord::Income(r) => dataset.incomes.push(r),
                    EntityRecord::Debt(r) => dataset.debts.push(r),
                    EntityRecord::Password(stored) => {
                        let password = self.cipher.decrypt_field(&stored.secret).map_err(|e| {
                            Error::Backup(format!("could not decrypt password {}: {}", stored.id, e))
                        })?;
                        dataset.passwords.push(stored.with_plaintext(password));
                    }
                }
            }
        }

        Ok(dataset)
    }

    /// Restore from raw archive bytes.
    ///
    /// The envelope is parsed, authenticated and deserialized before anything
    /// is deleted. Replay then continues past individual record failures,
    /// which are listed in the returned report.
    pub fn restore_backup(&self, archive_bytes: &[u8], passphrase: &str) -> Result<RestoreReport> {
        let _guard = self.begin()?;
        self.apply_archive(archive_bytes, passphrase)
    }

    /// Caller holds the operation guard
    fn apply_archive(&self, archive_bytes: &[u8], passphrase: &str) -> Result<RestoreReport> {
        let archive = BackupArchive::parse(archive_bytes)?;
        let plaintext = open_payload(&archive.data, passphrase)?;
        let dataset: Dataset = serde_json::from_slice(&plaintext)
            .map_err(|e| Error::format(format!("payload is not a valid dataset: {}", e)))?;

        let mut report = RestoreReport::default();
        for kind in EntityKind::ALL.iter().rev() {
            report.removed += self.repository.delete_all(*kind)?;
        }

        self.replay(dataset, &mut report);
        Ok(report)
    }

    fn replay(&self, dataset: Dataset, report: &mut RestoreReport) {
        let Dataset {
            expenses,
            incomes,
            debts,
            people,
            passwords,
            categories,
        } = dataset;

        for r in categories {
            self.write(EntityRecord::Category(r), report);
        }
        for r in people {
            self.write(EntityRecord::Person(r), report);
        }
        for r in expenses {
            self.write(EntityRecord::Expense(r), report);
        }
        for r in incomes {
            self.write(EntityRecord::Income(r), report);
        }
        for r in debts {
            self.write(EntityRecord::Debt(r), report);
        }
        for mut entry in passwords {
            let id = entry.id;
            let sealed = self.cipher.encrypt_field(&entry.password);
            entry.password.zeroize();
            match sealed {
                Ok(secret) => self.write(EntityRecord::Password(entry.into_stored(secret)), report),
                Err(e) => report.failed.push(FailedEntity {
                    kind: EntityKind::Passwords,
                    id,
                    error: e.to_string(),
                }),
            }
        }
    }

    fn write(&self, record: EntityRecord, report: &mut RestoreReport) {
        match self.repository.create_entity(&record) {
            Ok(()) => report.restored.push(record.entity_ref()),
            Err(e) => report.failed.push(FailedEntity {
                kind: record.kind(),
                id: record.id(),
                error: e.to_string(),
            }),
        }
    }

    /// Create a backup and write it to the backups directory.
    ///
    /// With `max_backups` set, the oldest archives beyond that count are
    /// removed afterwards. The new archive always counts toward the limit,
    /// so the limit must be at least one.
    pub fn create(&self, passphrase: &str, max_backups: Option<usize>) -> Result<BackupMetadata> {
        validate_passphrase(passphrase)?;
        if max_backups == Some(0) {
            return Err(Error::validation("max backups must be at least 1"));
        }

        let _guard = self.begin()?;
        let archive = self.build_archive(passphrase)?;

        let now = Utc::now();
        let name = format!(
            "{}{}-{:06}{}",
            BACKUP_PREFIX,
            now.format("%Y-%m-%dT%H-%M-%S"),
            now.timestamp_subsec_micros(),
            BACKUP_EXT
        );
        let path = self.backups_dir().join(&name);
        fs::write(&path, archive.to_json_pretty()?)?;
        let size_bytes = fs::metadata(&path)?.len();

        if let Some(max) = max_backups {
            self.apply_retention(max, &name)?;
        }

        Ok(BackupMetadata::new(name, archive.date, size_bytes))
    }

    /// Restore a named archive from the backups directory
    pub fn restore(&self, name: &str, passphrase: &str) -> Result<RestoreReport> {
        if !is_backup_name(name) {
            return Err(Error::validation(format!("not a backup file name: {}", name)));
        }

        let _guard = self.begin()?;
        let path = self.backups_dir().join(name);
        if !path.exists() {
            return Err(Error::not_found(format!("Backup not found: {}", name)));
        }

        let bytes = fs::read(&path)?;
        self.apply_archive(&bytes, passphrase)
    }

    /// All archives in the backups directory, newest first
    pub fn list(&self) -> Result<Vec<BackupMetadata>> {
        let backups_dir = self.backups_dir();
        if !backups_dir.exists() {
            return Ok(Vec::new());
        }

        let mut backups = Vec::new();
        for entry in fs::read_dir(&backups_dir)? {
            let entry = entry?;
            let name = match entry.file_name().into_string() {
                Ok(name) if is_backup_name(&name) => name,
                _ => continue,
            };

            let size_bytes = entry.metadata()?.len();
            let created_at = parse_backup_time(&name).unwrap_or_else(Utc::now);
            backups.push(BackupMetadata::new(name, created_at, size_bytes));
        }

        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.name.cmp(&a.name)));
        Ok(backups)
    }

    /// Delete every archive
    pub fn clear(&self) -> Result<ClearResult> {
        let _guard = self.begin()?;

        let backups = self.list()?;
        let mut deleted = 0;
        for backup in &backups {
            if remove_archive(&self.backups_dir().join(&backup.name))? {
                deleted += 1;
            }
        }
        Ok(ClearResult { deleted })
    }

    /// Keep the newest `max_backups` archives. `keep` is never removed.
    fn apply_retention(&self, max_backups: usize, keep: &str) -> Result<()> {
        let expired = self
            .list()?
            .into_iter()
            .filter(|b| b.name != keep)
            .skip(max_backups.saturating_sub(1));

        for backup in expired {
            remove_archive(&self.backups_dir().join(&backup.name))?;
        }
        Ok(())
    }
}

/// `Ok(false)` when the file is already gone
fn remove_archive(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn validate_passphrase(passphrase: &str) -> Result<()> {
    if passphrase.chars().count() < MIN_PASSPHRASE_LEN {
        return Err(Error::validation(format!(
            "passphrase must be at least {} characters",
            MIN_PASSPHRASE_LEN
        )));
    }
    Ok(())
}

fn is_backup_name(name: &str) -> bool {
    name.starts_with(BACKUP_PREFIX)
        && name.ends_with(BACKUP_EXT)
        && !name.contains(['/', '\\'])
}

/// "pocketvault-2025-01-15T10-30-00-123456.json" -> 2025-01-15 10:30:00.123456
fn parse_backup_time(name: &str) -> Option<DateTime<Utc>> {
    let ts = name.strip_prefix(BACKUP_PREFIX)?.strip_suffix(BACKUP_EXT)?;
    NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H-%M-%S-%6f")
        .or_else(|_| NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H-%M-%S"))
        .map(|dt| dt.and_utc())
        .ok()
}
