//! Key service - resolves the field key at startup
//!
//! The key comes from configuration as raw hex, or is derived from a master
//! password with Argon2id using the salt and parameters in field-key.json.

use std::fs;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::domain::result::{Error, Result};
use crate::domain::{Argon2Params, FieldKey, KeyMetadata, KeyStatus, KEY_SIZE};
use crate::services::CipherService;

pub const KEY_METADATA_FILE: &str = "field-key.json";
const CHECK_MARKER: &str = "pocketvault-field-key-check";
const SALT_SIZE: usize = 16;

/// Manages where the field key comes from
pub struct KeyService {
    data_dir: PathBuf,
    configured_key: Option<String>,
    params: Argon2Params,
}

impl KeyService {
    pub fn new(data_dir: &Path, configured_key: Option<String>) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            configured_key,
            params: Argon2Params::default(),
        }
    }

    /// Use different Argon2 parameters for newly initialized keys
    pub fn with_params(mut self, params: Argon2Params) -> Self {
        self.params = params;
        self
    }

    fn metadata_file(&self) -> PathBuf {
        self.data_dir.join(KEY_METADATA_FILE)
    }

    fn load_metadata(&self) -> Result<Option<KeyMetadata>> {
        let path = self.metadata_file();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn status(&self) -> Result<KeyStatus> {
        if self.configured_key.is_some() {
            return Ok(KeyStatus::configured());
        }
        Ok(match self.load_metadata()? {
            Some(meta) => KeyStatus::from_metadata(&meta),
            None => KeyStatus::uninitialized(),
        })
    }

    /// Whether a master password is needed to obtain the key
    pub fn needs_master_password(&self) -> bool {
        self.configured_key.is_none()
    }

    /// Set up master-password key derivation.
    ///
    /// Writes field-key.json with a fresh salt and a check value so that a
    /// wrong password is detected on unlock.
    pub fn init(&self, master_password: &str) -> Result<FieldKey> {
        if self.configured_key.is_some() {
            return Err(Error::validation(
                "a field key is already configured; remove it before using a master password",
            ));
        }
        if self.metadata_file().exists() {
            return Err(Error::validation("field key is already initialized"));
        }
        if master_password.is_empty() {
            return Err(Error::validation("master password must not be empty"));
        }

        let mut salt = [0u8; SALT_SIZE];
        rand::thread_rng().fill_bytes(&mut salt);

        let key = derive_field_key(master_password, &salt, &self.params)?;
        let check = CipherService::new(&key).encrypt_to_string(CHECK_MARKER)?;

        let metadata = KeyMetadata::new(STANDARD.encode(salt), self.params.clone(), check);
        fs::create_dir_all(&self.data_dir)?;
        fs::write(self.metadata_file(), serde_json::to_string_pretty(&metadata)?)?;

        Ok(key)
    }

    /// Derive the key from the master password and verify it against the
    /// stored check value
    pub fn unlock(&self, master_password: &str) -> Result<FieldKey> {
        let metadata = self.load_metadata()?.ok_or_else(|| {
            Error::config("field key is not initialized; run `pocketvault key init`")
        })?;

        if metadata.algorithm != "argon2id" {
            return Err(Error::config(format!(
                "unsupported key algorithm: {}",
                metadata.algorithm
            )));
        }

        let salt = STANDARD
            .decode(&metadata.salt)
            .map_err(|_| Error::config("invalid salt in field-key.json"))?;
        let key = derive_field_key(master_password, &salt, &metadata.argon2_params)?;

        match CipherService::new(&key).decrypt_str(&metadata.check) {
            Ok(marker) if marker == CHECK_MARKER => Ok(key),
            _ => Err(Error::Decryption("wrong master password".to_string())),
        }
    }

    /// Resolve the process field key.
    ///
    /// A configured hex key wins; otherwise the master password is required.
    pub fn resolve(&self, master_password: Option<&str>) -> Result<FieldKey> {
        if let Some(hex_key) = &self.configured_key {
            return FieldKey::from_hex(hex_key);
        }
        match master_password {
            Some(password) => self.unlock(password),
            None if self.metadata_file().exists() => {
                Err(Error::config("master password required to unlock the field key"))
            }
            None => Err(Error::config(
                "no field key configured; set POCKETVAULT_FIELD_KEY or run `pocketvault key init`",
            )),
        }
    }
}

fn derive_field_key(password: &str, salt: &[u8], params: &Argon2Params) -> Result<FieldKey> {
    if params.hash_len as usize != KEY_SIZE {
        return Err(Error::config(format!(
            "argon2 hash length must be {}, got {}",
            KEY_SIZE, params.hash_len
        )));
    }

    let argon2_params = argon2::Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| Error::config(format!("invalid argon2 params: {}", e)))?;

    let argon2 = argon2::Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        argon2_params,
    );

    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut *key)
        .map_err(|e| Error::Encryption(format!("key derivation failed: {}", e)))?;

    Ok(FieldKey::from_bytes(*key))
}
