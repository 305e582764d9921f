//! Password command - stored credentials

use anyhow::{Context, Result};
use clap::Subcommand;
use dialoguer::Confirm;
use uuid::Uuid;

use super::{get_context, get_logger, log_event, secret_or_prompt};
use crate::output;
use pocketvault_core::services::NewPassword;
use pocketvault_core::{events, EntityKind, LogEvent};

#[derive(Subcommand)]
pub enum PasswordCommands {
    /// Store a new credential
    Add {
        /// Title, e.g. "Email"
        title: String,
        #[arg(long, short = 'u')]
        username: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Secret to store (prompted if omitted)
        #[arg(long, short = 'p')]
        password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List credentials without their secrets
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a credential including its secret
    Show {
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a credential
    Remove {
        id: String,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn parse_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).with_context(|| format!("Invalid password id: {}", id))
}

pub fn run(command: PasswordCommands) -> Result<()> {
    match command {
        PasswordCommands::Add {
            title,
            username,
            url,
            notes,
            password,
            json,
        } => {
            let ctx = get_context()?;
            let password = secret_or_prompt(password, None, "Password to store")?;
            let summary = ctx.password_service.add(NewPassword {
                title,
                username,
                url,
                password,
                notes,
            })?;
            log_event(
                &get_logger(),
                LogEvent::new(events::PASSWORD_ADDED)
                    .with_command("password add")
                    .with_record(EntityKind::Passwords, summary.id),
            );

            if json {
                output::print_json(&summary)?;
            } else {
                output::success(&format!("Stored '{}'", summary.title));
                println!("  ID: {}", summary.id);
            }
        }
        PasswordCommands::List { json } => {
            let ctx = get_context()?;
            let passwords = ctx.password_service.list()?;

            if json {
                return output::print_json(&passwords);
            }
            if passwords.is_empty() {
                println!("No passwords stored.");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["ID", "Title", "Username", "URL", "Created"]);
            for p in &passwords {
                table.add_row(vec![
                    p.id.to_string(),
                    p.title.clone(),
                    p.username.clone().unwrap_or_default(),
                    p.url.clone().unwrap_or_default(),
                    output::format_datetime(&p.created_at),
                ]);
            }
            println!("{}", table);
        }
        PasswordCommands::Show { id, json } => {
            let ctx = get_context()?;
            let entry = ctx.password_service.get(parse_id(&id)?)?;

            if json {
                return output::print_json(&entry);
            }
            println!("Title:    {}", entry.title);
            if let Some(username) = &entry.username {
                println!("Username: {}", username);
            }
            if let Some(url) = &entry.url {
                println!("URL:      {}", url);
            }
            println!("Password: {}", entry.password);
            if let Some(notes) = &entry.notes {
                println!("Notes:    {}", notes);
            }
        }
        PasswordCommands::Remove { id, force, json } => {
            let id = parse_id(&id)?;
            let ctx = get_context()?;
            if !force
                && !json
                && !Confirm::new()
                    .with_prompt(format!("Delete password {}?", id))
                    .default(false)
                    .interact()?
            {
                println!("Cancelled.");
                return Ok(());
            }

            ctx.password_service.remove(id)?;
            log_event(
                &get_logger(),
                LogEvent::new(events::PASSWORD_REMOVED)
                    .with_command("password remove")
                    .with_record(EntityKind::Passwords, id),
            );
            if json {
                println!("{}", serde_json::json!({"removed": id}));
            } else {
                output::warning(&format!("Removed password {}", id));
            }
        }
    }

    Ok(())
}
