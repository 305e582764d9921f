//! Schema for pocketvault.duckdb, one embedded SQL file per step.

/// `(file name, sql)` pairs in apply order. `000_migrations.sql` creates the
/// tracking table and must stay first.
pub const MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    ("001_initial_schema.sql", include_str!("001_initial_schema.sql")),
];
