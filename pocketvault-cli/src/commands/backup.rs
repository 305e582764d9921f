//! Backup command - passphrase-encrypted backups

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;

use super::{get_context, get_logger, log_event, secret_or_prompt, secret_with_confirm};
use crate::output;
use pocketvault_core::{events, EntityKind, LogEvent, RestoreReport};

/// Backup passphrase for non-interactive use
const ENV_BACKUP_PASSPHRASE: &str = "POCKETVAULT_BACKUP_PASSPHRASE";

#[derive(Subcommand)]
pub enum BackupCommands {
    /// Create a new encrypted backup
    Create {
        /// Backup passphrase (prompted if omitted)
        #[arg(long, short = 'p')]
        passphrase: Option<String>,
        /// Maximum number of backups to keep
        #[arg(long, short = 'm')]
        max_backups: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List available backups
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Restore from a backup, replacing all current data
    Restore {
        /// Backup name to restore
        name: String,
        /// Backup passphrase (prompted if omitted)
        #[arg(long, short = 'p')]
        passphrase: Option<String>,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete all backups
    Clear {
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn confirm(prompt: &str) -> Result<bool> {
    Ok(Confirm::new().with_prompt(prompt).default(false).interact()?)
}

pub fn run(command: BackupCommands) -> Result<()> {
    match command {
        BackupCommands::Create {
            passphrase,
            max_backups,
            json,
        } => {
            let ctx = get_context()?;
            let passphrase =
                secret_with_confirm(passphrase, Some(ENV_BACKUP_PASSPHRASE), "Backup passphrase")?;

            let logger = get_logger();
            match ctx
                .backup_service
                .create(&passphrase, max_backups.or(ctx.config.max_backups))
            {
                Ok(meta) => {
                    log_event(
                        &logger,
                        LogEvent::new(events::BACKUP_CREATED).with_command("backup create"),
                    );
                    if json {
                        output::print_json(&meta)?;
                    } else {
                        output::success("Backup created");
                        println!("  Name: {}", meta.name);
                        println!("  Size: {}", meta.size_display());
                    }
                }
                Err(e) => {
                    log_event(
                        &logger,
                        LogEvent::new(events::BACKUP_FAILED)
                            .with_command("backup create")
                            .with_error(e.to_string()),
                    );
                    return Err(e.into());
                }
            }
        }
        BackupCommands::List { json } => {
            let ctx = get_context()?;
            let backups = ctx.backup_service.list()?;

            if json {
                return output::print_json(&backups);
            }

            if backups.is_empty() {
                println!("No backups found.");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["Name", "Created", "Size"]);
            for backup in &backups {
                table.add_row(vec![
                    backup.name.clone(),
                    output::format_datetime(&backup.created_at),
                    backup.size_display(),
                ]);
            }
            println!("{}", table);
        }
        BackupCommands::Restore {
            name,
            passphrase,
            force,
            json,
        } => {
            let ctx = get_context()?;
            if !force
                && !json
                && !confirm(&format!(
                    "Restore from '{}'? All current data will be replaced.",
                    name
                ))?
            {
                println!("Cancelled.");
                return Ok(());
            }

            let passphrase = secret_or_prompt(passphrase, Some(ENV_BACKUP_PASSPHRASE), "Backup passphrase")?;

            let logger = get_logger();
            let report = match ctx.backup_service.restore(&name, &passphrase) {
                Ok(report) => report,
                Err(e) => {
                    log_event(
                        &logger,
                        LogEvent::new(events::RESTORE_FAILED)
                            .with_command("backup restore")
                            .with_error(e.to_string()),
                    );
                    return Err(e.into());
                }
            };

            for failed in &report.failed {
                log_event(
                    &logger,
                    LogEvent::new(events::RESTORE_RECORD_FAILED)
                        .with_command("backup restore")
                        .with_record(failed.kind, failed.id)
                        .with_error(failed.error.clone()),
                );
            }
            log_event(
                &logger,
                LogEvent::new(events::RESTORE_COMPLETED).with_command("backup restore"),
            );

            if json {
                return output::print_json(&report);
            }
            print_report(&name, &report);
        }
        BackupCommands::Clear { force, json } => {
            let ctx = get_context()?;
            if !force && !json && !confirm("Delete all backups?")? {
                println!("Cancelled.");
                return Ok(());
            }

            let result = ctx.backup_service.clear()?;
            log_event(
                &get_logger(),
                LogEvent::new(events::BACKUPS_CLEARED).with_command("backup clear"),
            );
            if json {
                println!("{}", serde_json::json!({"deleted": result.deleted}));
            } else {
                println!("Deleted {} backup(s)", result.deleted);
            }
        }
    }

    Ok(())
}

fn print_report(name: &str, report: &RestoreReport) {
    output::success(&format!("Restored from backup: {}", name));
    println!("  Removed: {} record(s)", report.removed);

    let mut table = output::create_table();
    table.set_header(vec!["Collection", "Restored"]);
    for kind in EntityKind::ALL {
        table.add_row(vec![
            kind.to_string(),
            report.restored_count(kind).to_string(),
        ]);
    }
    println!("{}", table);

    if !report.is_complete() {
        println!();
        println!(
            "{}",
            format!("{} record(s) could not be restored:", report.failed.len())
                .yellow()
                .bold()
        );
        for failed in &report.failed {
            println!("  {} {}: {}", failed.kind, failed.id, failed.error);
        }
    }
}
