//! Password service - credential CRUD over encrypted storage
//!
//! Secrets are encrypted with the field key before they reach the repository
//! and only decrypted on an explicit `get`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{EntityKind, EntityRecord, PasswordEntry, StoredPassword};
use crate::ports::Repository;
use crate::services::CipherService;

/// Input for a new credential
#[derive(Clone, Default)]
pub struct NewPassword {
    pub title: String,
    pub username: Option<String>,
    pub url: Option<String>,
    pub password: String,
    pub notes: Option<String>,
}

/// A credential without its secret
#[derive(Debug, Clone, Serialize)]
pub struct PasswordSummary {
    pub id: Uuid,
    pub title: String,
    pub username: Option<String>,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&StoredPassword> for PasswordSummary {
    fn from(stored: &StoredPassword) -> Self {
        Self {
            id: stored.id,
            title: stored.title.clone(),
            username: stored.username.clone(),
            url: stored.url.clone(),
            created_at: stored.created_at,
        }
    }
}

pub struct PasswordService {
    repository: Arc<dyn Repository>,
    cipher: Arc<CipherService>,
}

impl PasswordService {
    pub fn new(repository: Arc<dyn Repository>, cipher: Arc<CipherService>) -> Self {
        Self { repository, cipher }
    }

    pub fn add(&self, new: NewPassword) -> Result<PasswordSummary> {
        let title = new.title.trim();
        if title.is_empty() {
            return Err(Error::validation("title must not be empty"));
        }

        let mut entry = PasswordEntry::new(title, new.password);
        entry.username = new.username.filter(|s| !s.is_empty());
        entry.url = new.url.filter(|s| !s.is_empty());
        entry.notes = new.notes.filter(|s| !s.is_empty());

        let secret = self.cipher.encrypt_field(&entry.password)?;
        let stored = entry.into_stored(secret);
        self.repository
            .create_entity(&EntityRecord::Password(stored.clone()))?;

        Ok(PasswordSummary::from(&stored))
    }

    /// All credentials sorted by title, secrets left encrypted
    pub fn list(&self) -> Result<Vec<PasswordSummary>> {
        let mut summaries: Vec<PasswordSummary> = self
            .repository
            .list_entities(EntityKind::Passwords)?
            .iter()
            .filter_map(|record| match record {
                EntityRecord::Password(stored) => Some(PasswordSummary::from(stored)),
                _ => None,
            })
            .collect();

        summaries.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()));
        Ok(summaries)
    }

    /// Fetch a credential and decrypt its secret
    pub fn get(&self, id: Uuid) -> Result<PasswordEntry> {
        match self.repository.get_entity(EntityKind::Passwords, id)? {
            Some(EntityRecord::Password(stored)) => {
                let password = self.cipher.decrypt_field(&stored.secret)?;
                Ok(stored.with_plaintext(password))
            }
            Some(_) => Err(Error::database("unexpected record kind in passwords")),
            None => Err(Error::not_found(format!("Password not found: {}", id))),
        }
    }

    pub fn remove(&self, id: Uuid) -> Result<()> {
        if !self.repository.delete_entity(EntityKind::Passwords, id)? {
            return Err(Error::not_found(format!("Password not found: {}", id)));
        }
        Ok(())
    }
}
