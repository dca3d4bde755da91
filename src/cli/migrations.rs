//! `nes migrations` command
//!
//! Lists discovered migration units and whether they have been applied.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use super::utils::{open_publication, print_json};
use crate::config::Config;
use crate::migration::{MigrationRegistry, MigrationRunner, UnitState};

#[derive(Args, Debug)]
pub struct MigrationsArgs {
    /// Migrations directory (default from config)
    #[arg(short, long)]
    pub dir: Option<PathBuf>,
}

#[derive(Tabled)]
struct StatusRow {
    name: String,
    state: String,
    applied: String,
    description: String,
}

pub fn run(args: MigrationsArgs, config: &Config, json: bool) -> Result<()> {
    let dir = args.dir.unwrap_or_else(|| config.migration.dir.clone());
    let publication = Arc::new(open_publication(config)?);
    let units = MigrationRegistry::new()
        .with_default_author(&config.author.default)
        .discover(&dir)?;
    let runner = MigrationRunner::new(publication, units);
    let statuses = runner.status()?;

    if json {
        return print_json(&statuses);
    }
    if statuses.is_empty() {
        println!("No migrations in {}", dir.display());
        return Ok(());
    }

    let pending = statuses
        .iter()
        .filter(|s| s.state == UnitState::Pending)
        .count();
    let rows: Vec<StatusRow> = statuses
        .into_iter()
        .map(|s| StatusRow {
            state: match s.state {
                UnitState::Applied => "applied".green().to_string(),
                UnitState::Pending => "pending".yellow().to_string(),
            },
            applied: s
                .marker
                .map(|m| m.applied_at.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default(),
            name: s.name,
            description: s.description,
        })
        .collect();

    println!("{}", Table::new(rows).with(Style::rounded()));
    println!("{} pending", pending);
    Ok(())
}
