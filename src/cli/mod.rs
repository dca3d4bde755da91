//! CLI module - Command definitions and handlers
//!
//! Handlers are thin: they load config, open the store and call the library.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod history;
pub mod init;
pub mod migrate;
pub mod migrations;
pub mod search;
pub mod show;
pub mod utils;

/// nes - versioned registry of public entities
///
/// Flat-file store of people, organizations, locations and projects, with
/// full version history and replayable migrations.
#[derive(Parser, Debug)]
#[command(name = "nes")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path
    #[arg(short, long, global = true, env = "NES_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a config file and an empty store
    Init(init::InitArgs),

    /// Show an entity or relationship by id
    #[command(disable_version_flag = true)]
    Show(show::ShowArgs),

    /// Search entities or relationships
    Search(search::SearchArgs),

    /// List the versions of a record
    History(history::HistoryArgs),

    /// Apply pending migrations
    Migrate(migrate::MigrateArgs),

    /// List migrations with their status
    Migrations(migrations::MigrationsArgs),
}
