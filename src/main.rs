//! nes CLI - Entry point
//!
//! Usage: nes <command> [options]

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use nes::cli::{Cli, Commands};
use nes::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; --verbose raises the default to debug
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let json = cli.json;
    match cli.command {
        Commands::Init(args) => nes::cli::init::run(args),
        command => {
            let config = Config::load(cli.config.as_deref())?;
            dispatch(command, &config, json).await
        }
    }
}

async fn dispatch(command: Commands, config: &Config, json: bool) -> Result<()> {
    match command {
        Commands::Init(args) => nes::cli::init::run(args),
        Commands::Show(args) => nes::cli::show::run(args, config, json),
        Commands::Search(args) => nes::cli::search::run(args, config, json),
        Commands::History(args) => nes::cli::history::run(args, config, json),
        Commands::Migrate(args) => nes::cli::migrate::run(args, config, json).await,
        Commands::Migrations(args) => nes::cli::migrations::run(args, config, json),
    }
}
