//! Encryption domain models

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::result::{Error, Result};

/// Size of a field key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce/IV
pub const IV_SIZE: usize = 12;

/// Size of an AES-GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Prefix of the storage encoding of an [`EncryptedField`]
const FIELD_FORMAT_V1: &str = "v1";

/// Default Argon2id parameters
pub const DEFAULT_TIME_COST: u32 = 3;
pub const DEFAULT_MEMORY_COST: u32 = 65536; // 64 MiB
pub const DEFAULT_PARALLELISM: u32 = 4;
pub const DEFAULT_HASH_LEN: u32 = KEY_SIZE as u32;

/// The process-wide 256-bit key protecting credential fields at rest.
///
/// Zeroized on drop. Losing it makes every field encrypted under it
/// permanently unrecoverable.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct FieldKey {
    bytes: [u8; KEY_SIZE],
}

impl FieldKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Parse a key from 64 hex characters
    pub fn from_hex(hex_key: &str) -> Result<Self> {
        let mut decoded = hex::decode(hex_key.trim())
            .map_err(|_| Error::config("field key must be hex-encoded"))?;
        if decoded.len() != KEY_SIZE {
            let len = decoded.len();
            decoded.zeroize();
            return Err(Error::config(format!(
                "field key must be {} bytes, got {}",
                KEY_SIZE, len
            )));
        }
        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&decoded);
        decoded.zeroize();
        Ok(Self { bytes })
    }

    /// Generate a fresh random key
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl fmt::Debug for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// A credential secret encrypted with AES-256-GCM.
///
/// Stored as `v1:<iv>:<ciphertext>:<tag>` with each part base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedField {
    pub iv: [u8; IV_SIZE],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_SIZE],
}

impl EncryptedField {
    /// Split AES-GCM output (`ciphertext || tag`) into a field
    pub fn from_sealed(iv: [u8; IV_SIZE], sealed: &[u8]) -> Result<Self> {
        if sealed.len() < TAG_SIZE {
            return Err(Error::Encryption("cipher output shorter than tag".to_string()));
        }
        let (ciphertext, tag_bytes) = sealed.split_at(sealed.len() - TAG_SIZE);
        let mut tag = [0u8; TAG_SIZE];
        tag.copy_from_slice(tag_bytes);
        Ok(Self {
            iv,
            ciphertext: ciphertext.to_vec(),
            tag,
        })
    }

    /// `ciphertext || tag`, the layout the AEAD expects on decrypt
    pub fn sealed(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.ciphertext.len() + TAG_SIZE);
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.tag);
        out
    }
}

impl fmt::Display for EncryptedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b64 = base64::engine::general_purpose::STANDARD;
        write!(
            f,
            "{}:{}:{}:{}",
            FIELD_FORMAT_V1,
            b64.encode(self.iv),
            b64.encode(&self.ciphertext),
            b64.encode(self.tag)
        )
    }
}

impl FromStr for EncryptedField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || Error::Decryption("malformed encrypted field".to_string());
        let b64 = base64::engine::general_purpose::STANDARD;

        let parts: Vec<&str> = s.split(':').collect();
        let [version, iv, ciphertext, tag] = parts.as_slice() else {
            return Err(malformed());
        };
        if *version != FIELD_FORMAT_V1 {
            return Err(malformed());
        }

        let iv: [u8; IV_SIZE] = b64
            .decode(iv)
            .map_err(|_| malformed())?
            .try_into()
            .map_err(|_| malformed())?;
        let ciphertext = b64.decode(ciphertext).map_err(|_| malformed())?;
        let tag: [u8; TAG_SIZE] = b64
            .decode(tag)
            .map_err(|_| malformed())?
            .try_into()
            .map_err(|_| malformed())?;

        Ok(Self {
            iv,
            ciphertext,
            tag,
        })
    }
}

/// Argon2id parameters for stretching a master password into a field key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argon2Params {
    pub time_cost: u32,
    pub memory_cost: u32,
    pub parallelism: u32,
    pub hash_len: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            time_cost: DEFAULT_TIME_COST,
            memory_cost: DEFAULT_MEMORY_COST,
            parallelism: DEFAULT_PARALLELISM,
            hash_len: DEFAULT_HASH_LEN,
        }
    }
}

/// Field key metadata stored in field-key.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyMetadata {
    pub version: u32,
    pub algorithm: String,
    /// Base64-encoded random salt
    pub salt: String,
    pub argon2_params: Argon2Params,
    /// A known marker encrypted under the derived key, used to reject a
    /// wrong master password before any record is read
    pub check: String,
}

impl KeyMetadata {
    pub fn new(salt: String, argon2_params: Argon2Params, check: String) -> Self {
        Self {
            version: 1,
            algorithm: "argon2id".to_string(),
            salt,
            argon2_params,
            check,
        }
    }
}

/// Where the field key comes from, for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    /// Raw hex key from the environment or settings.json
    Configured,
    /// Derived from a master password via field-key.json
    MasterPassword,
    /// Nothing set up yet
    Uninitialized,
}

/// Field key status for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyStatus {
    pub source: KeySource,
    pub algorithm: Option<String>,
    pub version: Option<u32>,
}

impl KeyStatus {
    pub fn configured() -> Self {
        Self {
            source: KeySource::Configured,
            algorithm: None,
            version: None,
        }
    }

    pub fn uninitialized() -> Self {
        Self {
            source: KeySource::Uninitialized,
            algorithm: None,
            version: None,
        }
    }

    pub fn from_metadata(meta: &KeyMetadata) -> Self {
        Self {
            source: KeySource::MasterPassword,
            algorithm: Some(meta.algorithm.clone()),
            version: Some(meta.version),
        }
    }
}
