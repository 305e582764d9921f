//! Embedded schema migrations, tracked per database in `sys_migrations`

use anyhow::{bail, Result};
use duckdb::Connection;

/// `(file name, sql)`. The first entry of every set creates `sys_migrations`.
pub type Migration = (&'static str, &'static str);

#[derive(Debug)]
pub struct MigrationResult {
    pub applied: Vec<String>,
    pub already_applied: usize,
}

/// Brings one connection up to date with a migration set.
///
/// The vault database and the event log each pass their own set.
pub struct MigrationService<'a> {
    conn: &'a Connection,
    migrations: &'static [Migration],
}

impl<'a> MigrationService<'a> {
    pub fn new(conn: &'a Connection, migrations: &'static [Migration]) -> Self {
        Self { conn, migrations }
    }

    pub fn run_pending(&self) -> Result<MigrationResult> {
        let Some((bootstrap, rest)) = self.migrations.split_first() else {
            bail!("migration set is empty");
        };

        let mut applied = Vec::new();
        if !self.is_tracked()? {
            self.apply(bootstrap)?;
            applied.push(bootstrap.0.to_string());
        }

        let recorded = self.get_applied()?;
        let already_applied = recorded.len() - applied.len();

        for migration in rest {
            if recorded.iter().any(|name| name == migration.0) {
                continue;
            }
            self.apply(migration)?;
            applied.push(migration.0.to_string());
        }

        Ok(MigrationResult {
            applied,
            already_applied,
        })
    }

    fn is_tracked(&self) -> Result<bool> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = 'sys_migrations'",
            [],
            |row| row.get(0),
        )?;
        Ok(tables > 0)
    }

    fn apply(&self, (name, sql): &Migration) -> Result<()> {
        self.conn.execute_batch(sql)?;
        self.conn
            .execute("INSERT INTO sys_migrations (migration_name) VALUES (?)", [name])?;
        Ok(())
    }

    /// Recorded migration names, sorted
    pub fn get_applied(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT migration_name FROM sys_migrations ORDER BY migration_name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_migrations::LOG_MIGRATIONS;
    use crate::migrations::MIGRATIONS;

    fn table_exists(conn: &Connection, table: &str) -> bool {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
                [table],
                |row| row.get(0),
            )
            .unwrap();
        count > 0
    }

    #[test]
    fn test_fresh_database_then_noop() {
        let conn = Connection::open_in_memory().unwrap();
        let service = MigrationService::new(&conn, MIGRATIONS);

        let first = service.run_pending().unwrap();
        assert_eq!(first.applied.len(), MIGRATIONS.len());
        assert_eq!(first.already_applied, 0);
        assert!(table_exists(&conn, "passwords"));

        let second = service.run_pending().unwrap();
        assert!(second.applied.is_empty());
        assert_eq!(second.already_applied, MIGRATIONS.len());
        assert_eq!(service.get_applied().unwrap().len(), MIGRATIONS.len());
    }

    #[test]
    fn test_resumes_after_bootstrap_only() {
        let conn = Connection::open_in_memory().unwrap();
        MigrationService::new(&conn, &MIGRATIONS[..1])
            .run_pending()
            .unwrap();
        assert!(!table_exists(&conn, "passwords"));

        let result = MigrationService::new(&conn, MIGRATIONS).run_pending().unwrap();
        assert_eq!(result.already_applied, 1);
        assert_eq!(result.applied.len(), MIGRATIONS.len() - 1);
        assert!(table_exists(&conn, "passwords"));
    }

    #[test]
    fn test_log_migrations_leave_vault_tables_alone() {
        let conn = Connection::open_in_memory().unwrap();
        MigrationService::new(&conn, LOG_MIGRATIONS)
            .run_pending()
            .unwrap();

        assert!(table_exists(&conn, "sys_logs"));
        assert!(!table_exists(&conn, "passwords"));
    }

    #[test]
    fn test_empty_set_is_an_error() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(MigrationService::new(&conn, &[]).run_pending().is_err());
    }
}
