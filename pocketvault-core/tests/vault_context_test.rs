//! End-to-end tests through VaultContext with an on-disk data directory

use tempfile::TempDir;

use pocketvault_core::config::Config;
use pocketvault_core::domain::{Argon2Params, KeySource, KEY_SIZE};
use pocketvault_core::services::{KeyService, NewPassword};
use pocketvault_core::{EntityKind, Error, VaultContext, DB_FILENAME};

fn fast_params() -> Argon2Params {
    Argon2Params {
        time_cost: 1,
        memory_cost: 1024,
        parallelism: 1,
        hash_len: KEY_SIZE as u32,
    }
}

#[test]
fn test_master_password_vault_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let keys = KeyService::new(dir.path(), None).with_params(fast_params());
    let key = keys.init("master-pw").unwrap();

    let id = {
        let ctx = VaultContext::with_key(dir.path(), Config::default(), &key).unwrap();
        assert!(dir.path().join(DB_FILENAME).exists());
        ctx.password_service
            .add(NewPassword {
                title: "Email".to_string(),
                password: "secret123".to_string(),
                ..Default::default()
            })
            .unwrap()
            .id
    };

    let unlocked = keys.resolve(Some("master-pw")).unwrap();
    let ctx = VaultContext::with_key(dir.path(), Config::default(), &unlocked).unwrap();
    assert_eq!(ctx.password_service.get(id).unwrap().password, "secret123");
    assert_eq!(
        ctx.key_service().status().unwrap().source,
        KeySource::MasterPassword
    );
}

#[test]
fn test_wrong_master_password_never_opens_vault() {
    let dir = TempDir::new().unwrap();
    let keys = KeyService::new(dir.path(), None).with_params(fast_params());
    keys.init("master-pw").unwrap();

    assert!(matches!(
        keys.resolve(Some("not-it")),
        Err(Error::Decryption(_))
    ));
}

#[test]
fn test_backup_and_status_through_context() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        field_key: Some("ab".repeat(KEY_SIZE)),
        max_backups: Some(1),
    };
    let key = pocketvault_core::key_service(dir.path(), &config)
        .resolve(None)
        .unwrap();
    let ctx = VaultContext::with_key(dir.path(), config.clone(), &key).unwrap();

    ctx.password_service
        .add(NewPassword {
            title: "Bank".to_string(),
            password: "hunter2".to_string(),
            ..Default::default()
        })
        .unwrap();

    ctx.backup_service
        .create("correct-horse", config.max_backups)
        .unwrap();
    ctx.backup_service
        .create("correct-horse", config.max_backups)
        .unwrap();
    let backups = ctx.backup_service.list().unwrap();
    assert_eq!(backups.len(), 1);

    let key_status = ctx.key_service().status().unwrap();
    assert_eq!(key_status.source, KeySource::Configured);

    let status = ctx
        .status_service
        .get_status(key_status, backups.len())
        .unwrap();
    assert_eq!(status.total_records, 1);
    let passwords = status
        .collections
        .iter()
        .find(|c| c.kind == EntityKind::Passwords)
        .unwrap();
    assert_eq!(passwords.count, 1);
}
