//! Status command - record counts and key state

use anyhow::Result;
use colored::Colorize;

use super::get_context;
use crate::output;

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let backups = ctx.backup_service.list()?;
    let status = ctx
        .status_service
        .get_status(ctx.key_service().status()?, backups.len())?;

    if json {
        return output::print_json(&status);
    }

    println!("{}", "Vault Status".bold());
    println!();

    let mut table = output::create_table();
    for collection in &status.collections {
        table.add_row(vec![collection.kind.to_string(), collection.count.to_string()]);
    }
    table.add_row(vec!["total".to_string(), status.total_records.to_string()]);
    println!("{}", table);
    println!();

    println!("Backups: {}", status.backup_count);
    if let Some(latest) = backups.first() {
        println!("Latest:  {} ({})", latest.name, output::format_datetime(&latest.created_at));
    }

    Ok(())
}
