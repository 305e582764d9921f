//! Record domain models
//!
//! Records deserialize leniently so hand-written or older exports still load:
//! a missing id is generated and missing optionals stay `None`.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::encryption::EncryptedField;

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// The six record collections, in replay order.
///
/// Categories and people come first so records that refer to them by name or
/// id are written after their targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Categories,
    People,
    Expenses,
    Incomes,
    Debts,
    Passwords,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Categories,
        EntityKind::People,
        EntityKind::Expenses,
        EntityKind::Incomes,
        EntityKind::Debts,
        EntityKind::Passwords,
    ];

    /// Collection name as used in the backup payload
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Categories => "categories",
            EntityKind::People => "people",
            EntityKind::Expenses => "expenses",
            EntityKind::Incomes => "incomes",
            EntityKind::Debts => "debts",
            EntityKind::Passwords => "passwords",
        }
    }

    /// Inverse of [`as_str`](Self::as_str)
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single spending record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub amount: Decimal,
    #[serde(default = "today")]
    pub date: NaiveDate,
    /// Category name
    #[serde(default)]
    pub category: Option<String>,
    /// Person the expense was shared with, if any
    #[serde(default)]
    pub person_id: Option<Uuid>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Expense {
    pub fn new(description: impl Into<String>, amount: Decimal, date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            amount,
            date,
            category: None,
            person_id: None,
            created_at: Utc::now(),
        }
    }
}

/// A single income record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Income {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub amount: Decimal,
    #[serde(default = "today")]
    pub date: NaiveDate,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Income {
    pub fn new(description: impl Into<String>, amount: Decimal, date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            amount,
            date,
            source: None,
            category: None,
            created_at: Utc::now(),
        }
    }
}

/// Which side of a debt the user is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtDirection {
    /// The user owes the other person
    #[default]
    Owing,
    /// The other person owes the user
    Owed,
}

impl DebtDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            DebtDirection::Owing => "owing",
            DebtDirection::Owed => "owed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "owing" => Some(DebtDirection::Owing),
            "owed" => Some(DebtDirection::Owed),
            _ => None,
        }
    }
}

/// Money owed between the user and a person
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Debt {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default)]
    pub person_id: Option<Uuid>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub amount: Decimal,
    #[serde(default)]
    pub direction: DebtDirection,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub settled: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Debt {
    pub fn new(description: impl Into<String>, amount: Decimal, direction: DebtDirection) -> Self {
        Self {
            id: Uuid::new_v4(),
            person_id: None,
            description: description.into(),
            amount,
            direction,
            due_date: None,
            settled: false,
            created_at: Utc::now(),
        }
    }
}

/// A contact that expenses and debts can refer to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Person {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            notes: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    #[default]
    Expense,
    Income,
}

impl CategoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryKind::Expense => "expense",
            CategoryKind::Income => "income",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "expense" => Some(CategoryKind::Expense),
            "income" => Some(CategoryKind::Income),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub kind: CategoryKind,
    /// Display color, e.g. "#4caf50"
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Category {
    pub fn new(name: impl Into<String>, kind: CategoryKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            color: None,
            created_at: Utc::now(),
        }
    }
}

/// A credential with its secret in plaintext.
///
/// This is the shape callers and backup payloads see. It is never persisted
/// as-is; see [`StoredPassword`].
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordEntry {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    pub password: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl PasswordEntry {
    pub fn new(title: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            username: None,
            url: None,
            password: password.into(),
            notes: None,
            created_at: Utc::now(),
        }
    }

    /// Replace the plaintext secret with its encrypted form
    pub fn into_stored(self, secret: EncryptedField) -> StoredPassword {
        StoredPassword {
            id: self.id,
            title: self.title,
            username: self.username,
            url: self.url,
            secret,
            notes: self.notes,
            created_at: self.created_at,
        }
    }
}

impl fmt::Debug for PasswordEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordEntry")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("username", &self.username)
            .field("url", &self.url)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// A credential as persisted: the secret only exists as an [`EncryptedField`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPassword {
    pub id: Uuid,
    pub title: String,
    pub username: Option<String>,
    pub url: Option<String>,
    pub secret: EncryptedField,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StoredPassword {
    /// Rebuild the plaintext view once the secret has been decrypted
    pub fn with_plaintext(&self, password: String) -> PasswordEntry {
        PasswordEntry {
            id: self.id,
            title: self.title.clone(),
            username: self.username.clone(),
            url: self.url.clone(),
            password,
            notes: self.notes.clone(),
            created_at: self.created_at,
        }
    }
}

/// One persisted record of any collection
#[derive(Debug, Clone, PartialEq)]
pub enum EntityRecord {
    Category(Category),
    Person(Person),
    Expense(Expense),
    Income(Income),
    Debt(Debt),
    Password(StoredPassword),
}

impl EntityRecord {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRecord::Category(_) => EntityKind::Categories,
            EntityRecord::Person(_) => EntityKind::People,
            EntityRecord::Expense(_) => EntityKind::Expenses,
            EntityRecord::Income(_) => EntityKind::Incomes,
            EntityRecord::Debt(_) => EntityKind::Debts,
            EntityRecord::Password(_) => EntityKind::Passwords,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            EntityRecord::Category(r) => r.id,
            EntityRecord::Person(r) => r.id,
            EntityRecord::Expense(r) => r.id,
            EntityRecord::Income(r) => r.id,
            EntityRecord::Debt(r) => r.id,
            EntityRecord::Password(r) => r.id,
        }
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef {
            kind: self.kind(),
            id: self.id(),
        }
    }
}

/// Identifies a record without carrying its contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: Uuid,
}
