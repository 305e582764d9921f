//! Integration tests for encrypted backup and restore
//!
//! These run against real DuckDB files in temporary directories. Faults in
//! the persistence layer are injected with a wrapping repository.
//!
//! Run with: cargo test --test backup_restore_test -- --nocapture

use std::str::FromStr;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tempfile::TempDir;
use uuid::Uuid;

use pocketvault_core::adapters::duckdb::DuckDbRepository;
use pocketvault_core::domain::result::Result;
use pocketvault_core::domain::{
    Category, CategoryKind, Dataset, Debt, DebtDirection, EntityKind, EntityRecord, Expense,
    FieldKey, Income, Person,
};
use pocketvault_core::ports::Repository;
use pocketvault_core::services::{
    BackupService, CipherService, NewPassword, PasswordService, NONCE_SIZE, SALT_SIZE,
};
use pocketvault_core::{BackupArchive, Error};

// ============================================================================
// Test Helpers
// ============================================================================

struct Vault {
    dir: TempDir,
    repo: Arc<DuckDbRepository>,
    cipher: Arc<CipherService>,
    backups: BackupService,
    passwords: PasswordService,
}

/// A vault in a fresh temp dir with its own random field key
fn create_vault() -> Vault {
    let dir = TempDir::new().unwrap();
    let repo = DuckDbRepository::new(&dir.path().join("test.duckdb"))
        .expect("Failed to create repository");
    repo.ensure_schema().expect("Failed to initialize schema");
    let repo = Arc::new(repo);
    let cipher = Arc::new(CipherService::new(&FieldKey::generate()));

    Vault {
        backups: BackupService::new(repo.clone(), cipher.clone(), dir.path().to_path_buf()),
        passwords: PasswordService::new(repo.clone(), cipher.clone()),
        dir,
        repo,
        cipher,
    }
}

fn add_password(vault: &Vault, title: &str, password: &str) -> Uuid {
    vault
        .passwords
        .add(NewPassword {
            title: title.to_string(),
            password: password.to_string(),
            ..Default::default()
        })
        .unwrap()
        .id
}

/// Fill every collection with a couple of records
fn populate(vault: &Vault) {
    let ana = Person::new("Ana");
    let ana_id = ana.id;
    let records = vec![
        EntityRecord::Category(Category::new("Groceries", CategoryKind::Expense)),
        EntityRecord::Category(Category::new("Salary", CategoryKind::Income)),
        EntityRecord::Person(ana),
        EntityRecord::Expense({
            let mut e = Expense::new(
                "Market",
                Decimal::from_str("42.50").unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            );
            e.category = Some("Groceries".to_string());
            e.person_id = Some(ana_id);
            e
        }),
        EntityRecord::Income(Income::new(
            "March salary",
            Decimal::from_str("2500.00").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 28).unwrap(),
        )),
        EntityRecord::Debt({
            let mut d = Debt::new("Dinner", Decimal::from_str("18.75").unwrap(), DebtDirection::Owed);
            d.person_id = Some(ana_id);
            d
        }),
    ];
    for record in &records {
        vault.repo.create_entity(record).unwrap();
    }
    add_password(vault, "Email", "secret123");
    add_password(vault, "Bank", "p@ss:w0rd");
}

/// Read everything back as a plaintext dataset
fn snapshot(vault: &Vault) -> Dataset {
    let mut dataset = Dataset::default();
    for kind in EntityKind::ALL {
        for record in vault.repo.list_entities(kind).unwrap() {
            match record {
                EntityRecord::Category(r) => dataset.categories.push(r),
                EntityRecord::Person(r) => dataset.people.push(r),
                EntityRecord::Expense(r) => dataset.expenses.push(r),
                EntityRecord::Income(r) => dataset.incomes.push(r),
                EntityRecord::Debt(r) => dataset.debts.push(r),
                EntityRecord::Password(stored) => {
                    let password = vault.cipher.decrypt_field(&stored.secret).unwrap();
                    dataset.passwords.push(stored.with_plaintext(password));
                }
            }
        }
    }
    dataset
}

/// Wraps a repository and fails selected operations
struct FaultyRepository {
    inner: Arc<DuckDbRepository>,
    fail_list: Option<EntityKind>,
    fail_create: Option<EntityKind>,
}

impl Repository for FaultyRepository {
    fn list_entities(&self, kind: EntityKind) -> Result<Vec<EntityRecord>> {
        if self.fail_list == Some(kind) {
            return Err(Error::database(format!("{} table is unreadable", kind)));
        }
        self.inner.list_entities(kind)
    }

    fn create_entity(&self, record: &EntityRecord) -> Result<()> {
        if self.fail_create == Some(record.kind()) {
            return Err(Error::database("disk full"));
        }
        self.inner.create_entity(record)
    }

    fn delete_all(&self, kind: EntityKind) -> Result<u64> {
        self.inner.delete_all(kind)
    }

    fn get_entity(&self, kind: EntityKind, id: Uuid) -> Result<Option<EntityRecord>> {
        self.inner.get_entity(kind, id)
    }

    fn delete_entity(&self, kind: EntityKind, id: Uuid) -> Result<bool> {
        self.inner.delete_entity(kind, id)
    }
}

fn total_records(vault: &Vault) -> u64 {
    EntityKind::ALL
        .iter()
        .map(|k| vault.repo.count(*k).unwrap())
        .sum()
}

// ============================================================================
// Round Trip
// ============================================================================

#[test]
fn test_backup_round_trip_restores_every_collection() {
    let source = create_vault();
    populate(&source);
    let before = snapshot(&source);

    let archive = source.backups.create_backup("correct-horse").unwrap();
    let bytes = archive.to_json_pretty().unwrap();

    // Different machine, different field key
    let target = create_vault();
    let report = target
        .backups
        .restore_backup(bytes.as_bytes(), "correct-horse")
        .unwrap();

    assert!(report.is_complete(), "failures: {:?}", report.failed);
    assert_eq!(report.restored.len(), before.total());
    assert_eq!(snapshot(&target), before);
}

#[test]
fn test_restore_replaces_existing_data() {
    let vault = create_vault();
    populate(&vault);
    let before = snapshot(&vault);
    let archive = vault.backups.create_backup("correct-horse").unwrap();

    vault
        .repo
        .create_entity(&EntityRecord::Person(Person::new("Added later")))
        .unwrap();
    add_password(&vault, "Added later", "x");

    let report = vault
        .backups
        .restore_backup(archive.to_json_pretty().unwrap().as_bytes(), "correct-horse")
        .unwrap();

    assert_eq!(report.removed, before.total() as u64 + 2);
    assert_eq!(snapshot(&vault), before);
}

#[test]
fn test_passwords_are_re_encrypted_under_current_key() {
    let source = create_vault();
    let id = add_password(&source, "Email", "secret123");
    let archive = source.backups.create_backup("correct-horse").unwrap();

    let target = create_vault();
    target
        .backups
        .restore_backup(archive.to_json_pretty().unwrap().as_bytes(), "correct-horse")
        .unwrap();

    assert_eq!(target.passwords.get(id).unwrap().password, "secret123");

    // The source key cannot read what the target stored
    match target.repo.get_entity(EntityKind::Passwords, id).unwrap() {
        Some(EntityRecord::Password(stored)) => {
            assert!(matches!(
                source.cipher.decrypt_field(&stored.secret),
                Err(Error::Decryption(_))
            ));
        }
        other => panic!("unexpected record: {:?}", other),
    }
}

#[test]
fn test_ana_email_scenario() {
    let vault = create_vault();
    vault
        .repo
        .create_entity(&EntityRecord::Person(Person::new("Ana")))
        .unwrap();
    add_password(&vault, "Email", "secret123");

    let archive = vault.backups.create_backup("correct-horse").unwrap();
    let bytes = archive.to_json_pretty().unwrap();

    let target = create_vault();

    let err = target
        .backups
        .restore_backup(bytes.as_bytes(), "wrong-pass")
        .unwrap_err();
    assert!(matches!(err, Error::Authentication));
    assert_eq!(err.to_string(), "wrong passphrase or corrupted file");
    assert_eq!(total_records(&target), 0);

    target
        .backups
        .restore_backup(bytes.as_bytes(), "correct-horse")
        .unwrap();

    let restored = snapshot(&target);
    assert_eq!(restored.people.len(), 1);
    assert_eq!(restored.people[0].name, "Ana");
    assert_eq!(restored.passwords.len(), 1);
    assert_eq!(restored.passwords[0].title, "Email");
    assert_eq!(restored.passwords[0].password, "secret123");
}

// ============================================================================
// Rejections Before Any Data Is Touched
// ============================================================================

#[test]
fn test_wrong_passphrase_leaves_data_untouched() {
    let vault = create_vault();
    populate(&vault);
    let before = snapshot(&vault);
    let archive = vault.backups.create_backup("pw-one").unwrap();

    let err = vault
        .backups
        .restore_backup(archive.to_json_pretty().unwrap().as_bytes(), "pw-two")
        .unwrap_err();

    assert!(matches!(err, Error::Authentication));
    assert_eq!(snapshot(&vault), before);
}

#[test]
fn test_corrupted_archive_reports_same_message_as_wrong_passphrase() {
    let vault = create_vault();
    populate(&vault);
    let mut archive = vault.backups.create_backup("correct-horse").unwrap();

    let mut blob = STANDARD.decode(&archive.data).unwrap();
    let mid = blob.len() / 2;
    blob[mid] ^= 0xFF;
    archive.data = STANDARD.encode(blob);

    let err = vault
        .backups
        .restore_backup(archive.to_json_pretty().unwrap().as_bytes(), "correct-horse")
        .unwrap_err();
    assert!(matches!(err, Error::Authentication));
    assert_eq!(err.to_string(), "wrong passphrase or corrupted file");
}

#[test]
fn test_legacy_plaintext_archive_rejected_before_decryption() {
    let vault = create_vault();
    populate(&vault);
    let before = snapshot(&vault);

    let legacy = r#"{
        "version": "1.0.0",
        "date": "2024-01-01T00:00:00Z",
        "data": {"people": [{"name": "Mallory"}], "passwords": []}
    }"#;

    let err = vault
        .backups
        .restore_backup(legacy.as_bytes(), "correct-horse")
        .unwrap_err();
    assert!(matches!(err, Error::Format(_)), "got {:?}", err);
    assert_eq!(snapshot(&vault), before);
}

#[test]
fn test_truncated_payload_is_format_error() {
    let vault = create_vault();
    let archive = BackupArchive::new(STANDARD.encode([0u8; 20]));

    let err = vault
        .backups
        .restore_backup(archive.to_json_pretty().unwrap().as_bytes(), "correct-horse")
        .unwrap_err();
    assert!(matches!(err, Error::Format(_)));
}

#[test]
fn test_short_passphrase_rejected() {
    let vault = create_vault();
    assert!(matches!(
        vault.backups.create_backup("abc"),
        Err(Error::Validation(_))
    ));
}

// ============================================================================
// Archive Format
// ============================================================================

#[test]
fn test_archive_envelope_and_payload_layout() {
    let vault = create_vault();
    populate(&vault);

    let meta = vault.backups.create("correct-horse", None).unwrap();
    let path = vault.backups.backups_dir().join(&meta.name);
    let content = std::fs::read_to_string(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&content).unwrap();

    assert_eq!(value["encrypted"], serde_json::Value::Bool(true));
    assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
    assert!(value["date"].as_str().unwrap().parse::<chrono::DateTime<chrono::Utc>>().is_ok());

    let blob = STANDARD.decode(value["data"].as_str().unwrap()).unwrap();
    assert!(blob.len() > SALT_SIZE + NONCE_SIZE + 16);

    // No plaintext secret anywhere in the file
    assert!(!content.contains("secret123"));
}

#[test]
fn test_each_backup_uses_fresh_salt_and_nonce() {
    let vault = create_vault();
    populate(&vault);

    let a = STANDARD
        .decode(vault.backups.create_backup("correct-horse").unwrap().data)
        .unwrap();
    let b = STANDARD
        .decode(vault.backups.create_backup("correct-horse").unwrap().data)
        .unwrap();

    assert_ne!(a[..SALT_SIZE], b[..SALT_SIZE]);
    assert_ne!(
        a[SALT_SIZE..SALT_SIZE + NONCE_SIZE],
        b[SALT_SIZE..SALT_SIZE + NONCE_SIZE]
    );
    assert_ne!(a, b);
}

// ============================================================================
// Fault Handling
// ============================================================================

#[test]
fn test_unreadable_collection_aborts_backup() {
    let vault = create_vault();
    populate(&vault);

    let faulty = BackupService::new(
        Arc::new(FaultyRepository {
            inner: vault.repo.clone(),
            fail_list: Some(EntityKind::Debts),
            fail_create: None,
        }),
        vault.cipher.clone(),
        vault.dir.path().to_path_buf(),
    );

    let err = faulty.create("correct-horse", None).unwrap_err();
    assert!(matches!(err, Error::Backup(_)), "got {:?}", err);
    assert!(faulty.list().unwrap().is_empty());
}

#[test]
fn test_undecryptable_password_aborts_backup() {
    let vault = create_vault();
    populate(&vault);

    // Same data, wrong field key
    let other_key = BackupService::new(
        vault.repo.clone(),
        Arc::new(CipherService::new(&FieldKey::generate())),
        vault.dir.path().to_path_buf(),
    );

    assert!(matches!(
        other_key.create_backup("correct-horse"),
        Err(Error::Backup(_))
    ));
}

#[test]
fn test_failed_records_are_reported_and_rest_restored() {
    let source = create_vault();
    populate(&source);
    let before = snapshot(&source);
    let archive = source.backups.create_backup("correct-horse").unwrap();

    let target = create_vault();
    let faulty = BackupService::new(
        Arc::new(FaultyRepository {
            inner: target.repo.clone(),
            fail_list: None,
            fail_create: Some(EntityKind::Expenses),
        }),
        target.cipher.clone(),
        target.dir.path().to_path_buf(),
    );

    let report = faulty
        .restore_backup(archive.to_json_pretty().unwrap().as_bytes(), "correct-horse")
        .unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.failed.len(), before.expenses.len());
    assert!(report.failed.iter().all(|f| f.kind == EntityKind::Expenses));
    assert_eq!(report.failed[0].id, before.expenses[0].id);
    assert_eq!(report.restored.len(), before.total() - before.expenses.len());

    let after = snapshot(&target);
    assert!(after.expenses.is_empty());
    assert_eq!(after.people, before.people);
    assert_eq!(after.passwords, before.passwords);
}

// ============================================================================
// Backup Files
// ============================================================================

#[test]
fn test_create_list_restore_by_name() {
    let vault = create_vault();
    populate(&vault);
    let before = snapshot(&vault);

    let meta = vault.backups.create("correct-horse", None).unwrap();
    assert!(meta.name.starts_with("pocketvault-"));
    assert!(meta.name.ends_with(".json"));

    let listed = vault.backups.list().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, meta.name);
    assert_eq!(listed[0].size_bytes, meta.size_bytes);

    for kind in EntityKind::ALL {
        vault.repo.delete_all(kind).unwrap();
    }

    vault.backups.restore(&meta.name, "correct-horse").unwrap();
    assert_eq!(snapshot(&vault), before);
}

#[test]
fn test_restore_missing_backup() {
    let vault = create_vault();
    let err = vault
        .backups
        .restore("pocketvault-2020-01-01T00-00-00-000000.json", "correct-horse")
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    assert!(matches!(
        vault.backups.restore("../test.duckdb", "correct-horse"),
        Err(Error::Validation(_))
    ));
}

#[test]
fn test_retention_keeps_newest() {
    let vault = create_vault();
    populate(&vault);

    let mut names = Vec::new();
    for _ in 0..4 {
        names.push(vault.backups.create("correct-horse", Some(2)).unwrap().name);
        std::thread::sleep(std::time::Duration::from_millis(5));
    }

    let listed: Vec<String> = vault
        .backups
        .list()
        .unwrap()
        .into_iter()
        .map(|b| b.name)
        .collect();
    assert_eq!(listed, vec![names[3].clone(), names[2].clone()]);
}

#[test]
fn test_zero_retention_is_rejected_and_writes_nothing() {
    let vault = create_vault();
    populate(&vault);
    let existing = vault.backups.create("correct-horse", None).unwrap();

    let err = vault.backups.create("correct-horse", Some(0)).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let listed = vault.backups.list().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, existing.name);
}

#[test]
fn test_retention_of_one_keeps_the_new_archive() {
    let vault = create_vault();
    populate(&vault);
    vault.backups.create("correct-horse", None).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));

    let meta = vault.backups.create("correct-horse", Some(1)).unwrap();
    assert!(vault.backups.backups_dir().join(&meta.name).exists());

    let listed = vault.backups.list().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, meta.name);
}

#[test]
fn test_clear_removes_only_archives() {
    let vault = create_vault();
    vault.backups.create("correct-horse", None).unwrap();
    vault.backups.create("correct-horse", None).unwrap();
    std::fs::write(vault.backups.backups_dir().join("notes.txt"), "keep me").unwrap();

    let result = vault.backups.clear().unwrap();
    assert_eq!(result.deleted, 2);
    assert!(vault.backups.list().unwrap().is_empty());
    assert!(vault.backups.backups_dir().join("notes.txt").exists());
}
