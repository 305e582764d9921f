//! PocketVault CLI - encrypted finance and password records in your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{backup, key, logs, password, status};

/// PocketVault - encrypted finance and password records
#[derive(Parser)]
#[command(name = "pocketvault", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show record counts and backup status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage encrypted backups
    Backup {
        #[command(subcommand)]
        command: backup::BackupCommands,
    },

    /// Manage stored passwords
    Password {
        #[command(subcommand)]
        command: password::PasswordCommands,
    },

    /// Manage the field encryption key
    Key {
        #[command(subcommand)]
        command: key::KeyCommands,
    },

    /// View and manage the event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Status { json } => status::run(json),
        Commands::Backup { command } => backup::run(command),
        Commands::Password { command } => password::run(command),
        Commands::Key { command } => key::run(command),
        Commands::Logs { command } => logs::run(command),
    }
}
