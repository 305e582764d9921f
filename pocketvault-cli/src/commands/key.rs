//! Key command - field key setup and status

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use super::{get_data_dir, get_logger, log_event, secret_with_confirm, ENV_MASTER_PASSWORD};
use crate::output;
use pocketvault_core::config::Config;
use pocketvault_core::domain::KeySource;
use pocketvault_core::{events, LogEvent};

#[derive(Subcommand)]
pub enum KeyCommands {
    /// Show where the field key comes from
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Protect the field key with a master password
    Init {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(command: KeyCommands) -> Result<()> {
    let data_dir = get_data_dir()?;
    let config = Config::load(&data_dir)?;
    let keys = pocketvault_core::key_service(&data_dir, &config);

    match command {
        KeyCommands::Status { json } => {
            let status = keys.status()?;
            if json {
                return output::print_json(&status);
            }

            println!("{}", "Field Key".bold());
            match status.source {
                KeySource::Configured => {
                    println!("  Source: configured key (POCKETVAULT_FIELD_KEY or settings.json)")
                }
                KeySource::MasterPassword => {
                    println!("  Source: master password");
                    if let Some(algorithm) = &status.algorithm {
                        println!("  Algorithm: {}", algorithm);
                    }
                }
                KeySource::Uninitialized => {
                    println!("  Source: {}", "not set up".yellow());
                    println!("  Run `pocketvault key init` to create one.");
                }
            }
        }
        KeyCommands::Init { json } => {
            let logger = get_logger();
            let password = secret_with_confirm(None, Some(ENV_MASTER_PASSWORD), "New master password")?;

            if let Err(e) = keys.init(&password) {
                log_event(
                    &logger,
                    LogEvent::new(events::KEY_INIT_FAILED)
                        .with_command("key init")
                        .with_error(e.to_string()),
                );
                return Err(e.into());
            }
            log_event(&logger, LogEvent::new(events::KEY_INITIALIZED).with_command("key init"));

            if json {
                return output::print_json(&keys.status()?);
            }
            output::success("Field key initialized");
            output::info(
                "Keep the master password safe: stored passwords cannot be recovered without it.",
            );
        }
    }

    Ok(())
}
