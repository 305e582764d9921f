//! Logs command - what the vault has done, and what went wrong

use anyhow::Result;
use chrono::{TimeZone, Utc};
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;

use super::open_log;
use crate::output;
use pocketvault_core::services::logging::now_ms;
use pocketvault_core::{EntityKind, LogFilter};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Subcommand)]
pub enum LogsCommands {
    /// Show recent events, newest first
    List {
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Only events that carry an error
        #[arg(long)]
        errors: bool,
        /// Only events for one collection, e.g. "passwords"
        #[arg(long, value_parser = parse_collection)]
        collection: Option<EntityKind>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete old events
    Clear {
        #[arg(long, default_value = "30")]
        older_than_days: u32,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Last backup and restore, and failures per collection
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn parse_collection(s: &str) -> Result<EntityKind, String> {
    EntityKind::parse(s).ok_or_else(|| {
        let names: Vec<&str> = EntityKind::ALL.iter().map(|k| k.as_str()).collect();
        format!("expected one of: {}", names.join(", "))
    })
}

fn when(timestamp_ms: i64) -> String {
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt| output::format_datetime(&dt))
        .unwrap_or_else(|| timestamp_ms.to_string())
}

pub fn run(command: LogsCommands) -> Result<()> {
    let log = open_log()?;

    match command {
        LogsCommands::List {
            limit,
            errors,
            collection,
            json,
        } => {
            let mut filter = LogFilter::recent(limit);
            if errors {
                filter = filter.errors_only();
            }
            if let Some(kind) = collection {
                filter = filter.in_collection(kind);
            }
            let entries = log.entries(&filter)?;

            if json {
                return output::print_json(&entries);
            }
            if entries.is_empty() {
                println!("No log entries found.");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["Time", "Event", "Collection", "Record", "Error"]);
            for entry in &entries {
                table.add_row(vec![
                    when(entry.timestamp),
                    entry.event.clone(),
                    entry.collection.clone().unwrap_or_default(),
                    entry.record_id.clone().unwrap_or_default(),
                    entry
                        .error_message
                        .as_deref()
                        .map(|e| e.red().to_string())
                        .unwrap_or_default(),
                ]);
            }
            println!("{}", table);
        }
        LogsCommands::Clear {
            older_than_days,
            force,
            json,
        } => {
            if !force
                && !json
                && !Confirm::new()
                    .with_prompt(format!("Delete events older than {} days?", older_than_days))
                    .default(false)
                    .interact()?
            {
                println!("Cancelled.");
                return Ok(());
            }

            let deleted = log.delete_before(now_ms() - i64::from(older_than_days) * DAY_MS)?;
            if json {
                println!("{}", serde_json::json!({ "deleted": deleted }));
            } else {
                println!("Deleted {} log entries", deleted);
            }
        }
        LogsCommands::Stats { json } => {
            let stats = log.stats()?;
            if json {
                return output::print_json(&stats);
            }

            let never = || "never".dimmed().to_string();
            println!("{}", "Event Log".bold());
            println!("  Entries: {} ({} with errors)", stats.total, stats.errors);
            println!(
                "  Last backup: {}",
                stats.last_backup_ms.map(when).unwrap_or_else(never)
            );
            println!(
                "  Last restore: {}",
                stats.last_restore_ms.map(when).unwrap_or_else(never)
            );

            if !stats.failures_by_collection.is_empty() {
                let mut table = output::create_table();
                table.set_header(vec!["Collection", "Failures"]);
                for row in &stats.failures_by_collection {
                    table.add_row(vec![row.collection.clone(), row.count.to_string()]);
                }
                println!("{}", table);
            }
        }
    }

    Ok(())
}
