//! DuckDB repository implementation

use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use duckdb::types::Type;
use duckdb::{params, Connection, Row};
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{
    Category, CategoryKind, Debt, DebtDirection, EntityKind, EntityRecord, Expense, Income, Person,
    StoredPassword,
};
use crate::migrations::MIGRATIONS;
use crate::ports::Repository;
use crate::services::MigrationService;

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

impl From<duckdb::Error> for Error {
    fn from(e: duckdb::Error) -> Self {
        Error::Database(e.to_string())
    }
}

fn table_name(kind: EntityKind) -> &'static str {
    // Collection names double as table names
    kind.as_str()
}

fn columns(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Categories => "id, name, kind, color, created_at",
        EntityKind::People => "id, name, notes, created_at",
        EntityKind::Expenses => "id, description, amount, entry_date, category, person_id, created_at",
        EntityKind::Incomes => "id, description, amount, entry_date, source, category, created_at",
        EntityKind::Debts => {
            "id, person_id, description, amount, direction, due_date, settled, created_at"
        }
        EntityKind::Passwords => "id, title, username, url, secret, notes, created_at",
    }
}

fn conversion_error(idx: usize, msg: String) -> duckdb::Error {
    duckdb::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}

/// Read a text column and parse it
fn parse_col<T>(row: &Row<'_>, idx: usize) -> duckdb::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| duckdb::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Read a nullable text column and parse it when present
fn parse_opt_col<T>(row: &Row<'_>, idx: usize) -> duckdb::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        s.parse::<T>()
            .map_err(|e| duckdb::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn row_to_record(kind: EntityKind, row: &Row<'_>) -> duckdb::Result<EntityRecord> {
    let record = match kind {
        EntityKind::Categories => {
            let kind_str: String = row.get(2)?;
            EntityRecord::Category(Category {
                id: parse_col(row, 0)?,
                name: row.get(1)?,
                kind: CategoryKind::parse(&kind_str)
                    .ok_or_else(|| conversion_error(2, format!("unknown category kind '{}'", kind_str)))?,
                color: row.get(3)?,
                created_at: parse_col(row, 4)?,
            })
        }
        EntityKind::People => EntityRecord::Person(Person {
            id: parse_col(row, 0)?,
            name: row.get(1)?,
            notes: row.get(2)?,
            created_at: parse_col(row, 3)?,
        }),
        EntityKind::Expenses => EntityRecord::Expense(Expense {
            id: parse_col(row, 0)?,
            description: row.get(1)?,
            amount: parse_col(row, 2)?,
            date: parse_col(row, 3)?,
            category: row.get(4)?,
            person_id: parse_opt_col(row, 5)?,
            created_at: parse_col(row, 6)?,
        }),
        EntityKind::Incomes => EntityRecord::Income(Income {
            id: parse_col(row, 0)?,
            description: row.get(1)?,
            amount: parse_col(row, 2)?,
            date: parse_col(row, 3)?,
            source: row.get(4)?,
            category: row.get(5)?,
            created_at: parse_col(row, 6)?,
        }),
        EntityKind::Debts => {
            let direction: String = row.get(4)?;
            EntityRecord::Debt(Debt {
                id: parse_col(row, 0)?,
                person_id: parse_opt_col(row, 1)?,
                description: row.get(2)?,
                amount: parse_col(row, 3)?,
                direction: DebtDirection::parse(&direction)
                    .ok_or_else(|| conversion_error(4, format!("unknown debt direction '{}'", direction)))?,
                due_date: parse_opt_col(row, 5)?,
                settled: row.get(6)?,
                created_at: parse_col(row, 7)?,
            })
        }
        EntityKind::Passwords => EntityRecord::Password(StoredPassword {
            id: parse_col(row, 0)?,
            title: row.get(1)?,
            username: row.get(2)?,
            url: row.get(3)?,
            secret: parse_col(row, 4)?,
            notes: row.get(5)?,
            created_at: parse_col(row, 6)?,
        }),
    };
    Ok(record)
}

/// DuckDB repository implementation
pub struct DuckDbRepository {
    conn: Mutex<Connection>,
}

impl DuckDbRepository {
    /// Open (or create) the database at `db_path`
    ///
    /// Includes retry logic with exponential backoff for file locking errors,
    /// which can occur when two `pocketvault` processes open the database at
    /// the same time.
    pub fn new(db_path: &Path) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        eprintln!(
                            "[pocketvault] Database busy, retrying in {}ms (attempt {}/{}): {}",
                            delay.as_millis(),
                            attempt + 1,
                            MAX_RETRIES,
                            err_msg
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }

        Err(last_error.map(Error::from).unwrap_or_else(|| {
            Error::database(format!("Failed to open database after {} retries", MAX_RETRIES))
        }))
    }

    /// In-memory database, used by tests and throwaway contexts
    pub fn open_in_memory() -> Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_in_memory_with_flags(config)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn try_open_connection(db_path: &Path) -> duckdb::Result<Connection> {
        // Extension autoloading stays off: cached extensions can fail code
        // signing checks on macOS.
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Connection::open_with_flags(db_path, config)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))
    }

    /// Apply any pending schema migrations
    pub fn ensure_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        MigrationService::new(&conn, MIGRATIONS)
            .run_pending()
            .map_err(|e| Error::database(format!("Migration failed: {:#}", e)))?;
        Ok(())
    }
}

impl Repository for DuckDbRepository {
    fn list_entities(&self, kind: EntityKind) -> Result<Vec<EntityRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} ORDER BY created_at, id",
            columns(kind),
            table_name(kind)
        ))?;

        let rows = stmt.query_map([], |row| row_to_record(kind, row))?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn create_entity(&self, record: &EntityRecord) -> Result<()> {
        let conn = self.conn()?;
        match record {
            EntityRecord::Category(c) => conn.execute(
                "INSERT INTO categories (id, name, kind, color, created_at) VALUES (?, ?, ?, ?, ?)",
                params![
                    c.id.to_string(),
                    c.name,
                    c.kind.as_str(),
                    c.color,
                    c.created_at.to_rfc3339(),
                ],
            )?,
            EntityRecord::Person(p) => conn.execute(
                "INSERT INTO people (id, name, notes, created_at) VALUES (?, ?, ?, ?)",
                params![p.id.to_string(), p.name, p.notes, p.created_at.to_rfc3339()],
            )?,
            EntityRecord::Expense(e) => conn.execute(
                "INSERT INTO expenses (id, description, amount, entry_date, category, person_id, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    e.id.to_string(),
                    e.description,
                    e.amount.to_string(),
                    e.date.to_string(),
                    e.category,
                    e.person_id.map(|id| id.to_string()),
                    e.created_at.to_rfc3339(),
                ],
            )?,
            EntityRecord::Income(i) => conn.execute(
                "INSERT INTO incomes (id, description, amount, entry_date, source, category, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    i.id.to_string(),
                    i.description,
                    i.amount.to_string(),
                    i.date.to_string(),
                    i.source,
                    i.category,
                    i.created_at.to_rfc3339(),
                ],
            )?,
            EntityRecord::Debt(d) => conn.execute(
                "INSERT INTO debts (id, person_id, description, amount, direction, due_date, settled, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    d.id.to_string(),
                    d.person_id.map(|id| id.to_string()),
                    d.description,
                    d.amount.to_string(),
                    d.direction.as_str(),
                    d.due_date.map(|date| date.to_string()),
                    d.settled,
                    d.created_at.to_rfc3339(),
                ],
            )?,
            EntityRecord::Password(p) => conn.execute(
                "INSERT INTO passwords (id, title, username, url, secret, notes, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    p.id.to_string(),
                    p.title,
                    p.username,
                    p.url,
                    p.secret.to_string(),
                    p.notes,
                    p.created_at.to_rfc3339(),
                ],
            )?,
        };
        Ok(())
    }

    fn delete_all(&self, kind: EntityKind) -> Result<u64> {
        let conn = self.conn()?;
        let deleted = conn.execute(&format!("DELETE FROM {}", table_name(kind)), [])?;
        Ok(deleted as u64)
    }

    fn get_entity(&self, kind: EntityKind, id: Uuid) -> Result<Option<EntityRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} WHERE id = ?",
            columns(kind),
            table_name(kind)
        ))?;

        let mut rows = stmt.query_map([id.to_string()], |row| row_to_record(kind, row))?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn delete_entity(&self, kind: EntityKind, id: Uuid) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            &format!("DELETE FROM {} WHERE id = ?", table_name(kind)),
            [id.to_string()],
        )?;
        Ok(deleted > 0)
    }

    fn count(&self, kind: EntityKind) -> Result<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", table_name(kind)),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EncryptedField, IV_SIZE, TAG_SIZE};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn repo() -> DuckDbRepository {
        let repo = DuckDbRepository::open_in_memory().unwrap();
        repo.ensure_schema().unwrap();
        repo
    }

    #[test]
    fn test_every_kind_starts_empty() {
        let repo = repo();
        for kind in EntityKind::ALL {
            assert_eq!(repo.count(kind).unwrap(), 0, "{}", kind);
            assert!(repo.list_entities(kind).unwrap().is_empty());
        }
    }

    #[test]
    fn test_expense_roundtrip_keeps_exact_values() {
        let repo = repo();
        let mut expense = Expense::new(
            "Groceries",
            Decimal::new(12345, 2),
            NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
        );
        expense.category = Some("Food".to_string());
        expense.person_id = Some(Uuid::new_v4());

        let record = EntityRecord::Expense(expense);
        repo.create_entity(&record).unwrap();

        let listed = repo.list_entities(EntityKind::Expenses).unwrap();
        assert_eq!(listed, vec![record]);
    }

    #[test]
    fn test_debt_and_category_enums_roundtrip() {
        let repo = repo();
        let mut debt = Debt::new("Concert tickets", Decimal::new(80, 0), DebtDirection::Owed);
        debt.due_date = NaiveDate::from_ymd_opt(2024, 12, 1);
        debt.settled = true;
        let category = Category::new("Salary", CategoryKind::Income);

        repo.create_entity(&EntityRecord::Debt(debt.clone())).unwrap();
        repo.create_entity(&EntityRecord::Category(category.clone())).unwrap();

        assert_eq!(
            repo.get_entity(EntityKind::Debts, debt.id).unwrap(),
            Some(EntityRecord::Debt(debt))
        );
        assert_eq!(
            repo.get_entity(EntityKind::Categories, category.id).unwrap(),
            Some(EntityRecord::Category(category))
        );
    }

    #[test]
    fn test_password_secret_stored_as_encoding() {
        let repo = repo();
        let stored = StoredPassword {
            id: Uuid::new_v4(),
            title: "Email".to_string(),
            username: Some("ana@example.com".to_string()),
            url: None,
            secret: EncryptedField {
                iv: [1u8; IV_SIZE],
                ciphertext: vec![42; 9],
                tag: [2u8; TAG_SIZE],
            },
            notes: None,
            created_at: chrono::Utc::now(),
        };
        repo.create_entity(&EntityRecord::Password(stored.clone())).unwrap();

        let conn = repo.conn().unwrap();
        let raw: String = conn
            .query_row("SELECT secret FROM passwords", [], |row| row.get(0))
            .unwrap();
        drop(conn);
        assert!(raw.starts_with("v1:"));

        let fetched = repo.get_entity(EntityKind::Passwords, stored.id).unwrap();
        assert_eq!(fetched, Some(EntityRecord::Password(stored)));
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let repo = repo();
        let person = EntityRecord::Person(Person::new("Ana"));
        repo.create_entity(&person).unwrap();
        assert!(matches!(repo.create_entity(&person), Err(Error::Database(_))));
    }

    #[test]
    fn test_delete_all_and_delete_entity() {
        let repo = repo();
        let keep = Person::new("Ana");
        let drop_me = Person::new("Bruno");
        repo.create_entity(&EntityRecord::Person(keep.clone())).unwrap();
        repo.create_entity(&EntityRecord::Person(drop_me.clone())).unwrap();

        assert!(repo.delete_entity(EntityKind::People, drop_me.id).unwrap());
        assert!(!repo.delete_entity(EntityKind::People, drop_me.id).unwrap());
        assert_eq!(repo.count(EntityKind::People).unwrap(), 1);

        assert_eq!(repo.delete_all(EntityKind::People).unwrap(), 1);
        assert_eq!(repo.get_entity(EntityKind::People, keep.id).unwrap(), None);
    }

    #[test]
    fn test_retryable_errors() {
        assert!(is_retryable_error("IO Error: Could not set lock on file: Resource temporarily unavailable"));
        assert!(!is_retryable_error("Catalog Error: Table with name foo does not exist"));
    }
}
