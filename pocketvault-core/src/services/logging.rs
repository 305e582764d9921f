//! Event log for vault operations, stored in logs.duckdb
//!
//! Entries name what happened (a backup, a restore, a failed record) and the
//! collection or record id involved. Record contents, passphrases and
//! credential secrets never reach the log.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Result};
use duckdb::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::EntityKind;
use crate::log_migrations::LOG_MIGRATIONS;
use crate::services::MigrationService;

pub const LOG_DB_FILE: &str = "logs.duckdb";

/// Event names written by the vault front ends
pub mod events {
    pub const BACKUP_CREATED: &str = "backup_created";
    pub const BACKUP_FAILED: &str = "backup_failed";
    pub const BACKUPS_CLEARED: &str = "backups_cleared";
    pub const RESTORE_COMPLETED: &str = "restore_completed";
    pub const RESTORE_FAILED: &str = "restore_failed";
    pub const RESTORE_RECORD_FAILED: &str = "restore_record_failed";
    pub const PASSWORD_ADDED: &str = "password_added";
    pub const PASSWORD_REMOVED: &str = "password_removed";
    pub const KEY_INITIALIZED: &str = "key_initialized";
    pub const KEY_INIT_FAILED: &str = "key_init_failed";
}

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Current unix time in milliseconds
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Timestamp shifted into the high bits, per-process counter in the low 16
fn next_id() -> u64 {
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed) & 0xFFFF;
    ((now_ms() as u64) << 16) | counter
}

#[derive(Debug, Clone)]
pub struct LogEvent {
    event: String,
    command: Option<String>,
    collection: Option<String>,
    record_id: Option<String>,
    error_message: Option<String>,
}

impl LogEvent {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            command: None,
            collection: None,
            record_id: None,
            error_message: None,
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_collection(mut self, kind: EntityKind) -> Self {
        self.collection = Some(kind.as_str().to_string());
        self
    }

    /// Tag the event with one record; implies its collection
    pub fn with_record(self, kind: EntityKind, id: Uuid) -> Self {
        let mut event = self.with_collection(kind);
        event.record_id = Some(id.to_string());
        event
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub id: u64,
    pub timestamp: i64,
    pub app_version: String,
    pub event: String,
    pub command: Option<String>,
    pub collection: Option<String>,
    pub record_id: Option<String>,
    pub error_message: Option<String>,
}

/// Which entries [`LoggingService::entries`] returns, newest first
#[derive(Debug, Clone)]
pub struct LogFilter {
    pub limit: usize,
    pub errors_only: bool,
    pub collection: Option<EntityKind>,
}

impl LogFilter {
    pub fn recent(limit: usize) -> Self {
        Self {
            limit,
            errors_only: false,
            collection: None,
        }
    }

    pub fn errors_only(mut self) -> Self {
        self.errors_only = true;
        self
    }

    pub fn in_collection(mut self, kind: EntityKind) -> Self {
        self.collection = Some(kind);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionFailures {
    pub collection: String,
    pub count: u64,
}

/// Summary for `logs stats`
#[derive(Debug, Clone, Serialize)]
pub struct LogStats {
    pub total: u64,
    pub errors: u64,
    pub last_backup_ms: Option<i64>,
    pub last_restore_ms: Option<i64>,
    /// Failed events per collection, most failures first
    pub failures_by_collection: Vec<CollectionFailures>,
}

const SELECT_ENTRIES: &str = "SELECT id, timestamp, app_version, event, command, collection,
        record_id, error_message
     FROM sys_logs";

fn row_to_entry(row: &duckdb::Row<'_>) -> duckdb::Result<LogEntry> {
    Ok(LogEntry {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        app_version: row.get(2)?,
        event: row.get(3)?,
        command: row.get(4)?,
        collection: row.get(5)?,
        record_id: row.get(6)?,
        error_message: row.get(7)?,
    })
}

pub struct LoggingService {
    conn: Mutex<Connection>,
    app_version: String,
}

impl LoggingService {
    /// Open or create logs.duckdb in the data directory
    pub fn new(data_dir: &Path, app_version: impl Into<String>) -> Result<Self> {
        let conn = Connection::open(data_dir.join(LOG_DB_FILE))?;
        MigrationService::new(&conn, LOG_MIGRATIONS).run_pending()?;

        Ok(Self {
            conn: Mutex::new(conn),
            app_version: app_version.into(),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))
    }

    pub fn log(&self, event: LogEvent) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO sys_logs (id, timestamp, app_version, event, command, collection,
                record_id, error_message)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            duckdb::params![
                next_id(),
                now_ms(),
                &self.app_version,
                &event.event,
                &event.command,
                &event.collection,
                &event.record_id,
                &event.error_message,
            ],
        )?;
        Ok(())
    }

    pub fn entries(&self, filter: &LogFilter) -> Result<Vec<LogEntry>> {
        let mut clauses = Vec::new();
        if filter.errors_only {
            clauses.push("error_message IS NOT NULL");
        }
        if filter.collection.is_some() {
            clauses.push("collection = ?");
        }

        let mut sql = SELECT_ENTRIES.to_string();
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY timestamp DESC, id DESC LIMIT ?");

        let limit = filter.limit as i64;
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let entries = match filter.collection {
            Some(kind) => stmt
                .query_map(duckdb::params![kind.as_str(), limit], row_to_entry)?
                .collect::<duckdb::Result<Vec<_>>>()?,
            None => stmt
                .query_map([limit], row_to_entry)?
                .collect::<duckdb::Result<Vec<_>>>()?,
        };
        Ok(entries)
    }

    pub fn stats(&self) -> Result<LogStats> {
        let conn = self.conn()?;

        let (total, errors): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COUNT(error_message) FROM sys_logs",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let (last_backup_ms, last_restore_ms): (Option<i64>, Option<i64>) = conn.query_row(
            "SELECT MAX(timestamp) FILTER (WHERE event = ?),
                    MAX(timestamp) FILTER (WHERE event = ?)
             FROM sys_logs",
            [events::BACKUP_CREATED, events::RESTORE_COMPLETED],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let mut stmt = conn.prepare(
            "SELECT collection, COUNT(*) FROM sys_logs
             WHERE error_message IS NOT NULL AND collection IS NOT NULL
             GROUP BY collection
             ORDER BY COUNT(*) DESC, collection",
        )?;
        let failures_by_collection = stmt
            .query_map([], |row| {
                Ok(CollectionFailures {
                    collection: row.get(0)?,
                    count: row.get::<_, i64>(1)? as u64,
                })
            })?
            .collect::<duckdb::Result<Vec<_>>>()?;

        Ok(LogStats {
            total: total as u64,
            errors: errors as u64,
            last_backup_ms,
            last_restore_ms,
            failures_by_collection,
        })
    }

    /// Delete entries older than the given unix timestamp in milliseconds
    pub fn delete_before(&self, timestamp_ms: i64) -> Result<u64> {
        let deleted = self
            .conn()?
            .execute("DELETE FROM sys_logs WHERE timestamp < ?", [timestamp_ms])?;
        Ok(deleted as u64)
    }
}
