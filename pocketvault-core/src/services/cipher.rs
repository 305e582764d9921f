//! Cipher service - field-level encryption of credential secrets
//!
//! Each field is sealed with AES-256-GCM under the process field key and a
//! fresh random 96-bit IV. The service is built once at startup and handed to
//! whatever needs it; nothing reads the key from global state.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;

use crate::domain::result::{Error, Result};
use crate::domain::{EncryptedField, FieldKey, IV_SIZE, KEY_SIZE};

/// Encrypts and decrypts individual fields under one [`FieldKey`]
pub struct CipherService {
    cipher: Aes256Gcm,
}

impl CipherService {
    pub fn new(key: &FieldKey) -> Self {
        Self {
            cipher: Aes256Gcm::new(key.as_bytes().into()),
        }
    }

    /// Build from raw key bytes, failing if they are not a 256-bit key
    pub fn from_slice(key: &[u8]) -> Result<Self> {
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|_| Error::Encryption(format!("field key must be {} bytes", KEY_SIZE)))?;
        Ok(Self { cipher })
    }

    /// Encrypt a plaintext value with a fresh IV
    pub fn encrypt_field(&self, plaintext: &str) -> Result<EncryptedField> {
        let mut iv = [0u8; IV_SIZE];
        rand::thread_rng().fill_bytes(&mut iv);

        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
            .map_err(|_| Error::Encryption("field encryption failed".to_string()))?;

        EncryptedField::from_sealed(iv, &sealed)
    }

    /// Decrypt a field, verifying its authentication tag.
    ///
    /// Fails when the field was tampered with or was encrypted under a
    /// different key. That data is unrecoverable; the record has to be
    /// deleted and recreated.
    pub fn decrypt_field(&self, encrypted: &EncryptedField) -> Result<String> {
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&encrypted.iv), encrypted.sealed().as_slice())
            .map_err(|_| {
                Error::Decryption(
                    "authentication failed: field was modified or encrypted under a different key"
                        .to_string(),
                )
            })?;

        String::from_utf8(plaintext)
            .map_err(|_| Error::Decryption("decrypted field is not valid UTF-8".to_string()))
    }

    /// Encrypt straight to the storage encoding
    pub fn encrypt_to_string(&self, plaintext: &str) -> Result<String> {
        Ok(self.encrypt_field(plaintext)?.to_string())
    }

    /// Decrypt from the storage encoding
    pub fn decrypt_str(&self, stored: &str) -> Result<String> {
        let field: EncryptedField = stored.parse()?;
        self.decrypt_field(&field)
    }
}
