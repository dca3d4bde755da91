//! `nes migrate` command
//!
//! Applies pending migration units from the migrations directory. Ctrl-C
//! requests cancellation; the running unit stops at its next record-level
//! checkpoint and gets no marker.
//!
//! # Usage
//! ```bash
//! nes migrate --dry-run
//! nes migrate
//! nes migrate --commit           # commit each batch with git
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tracing::warn;

use super::utils::{open_publication, print_json, search_service};
use crate::config::Config;
use crate::migration::{
    CancellationFlag, CommitSink, GitCommitSink, MigrationRegistry, MigrationRunner, NoopSink,
};

#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Migrations directory (default from config)
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// List what would run without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Commit each batch with git (overrides config)
    #[arg(long, conflicts_with = "no_commit")]
    pub commit: bool,

    /// Do not commit (overrides config)
    #[arg(long)]
    pub no_commit: bool,

    /// Files per commit (default from config)
    #[arg(long)]
    pub batch_size: Option<usize>,
}

pub async fn run(args: MigrateArgs, config: &Config, json: bool) -> Result<()> {
    let dir = args.dir.clone().unwrap_or_else(|| config.migration.dir.clone());
    let publication = Arc::new(open_publication(config)?);
    let units = MigrationRegistry::new()
        .with_default_author(&config.author.default)
        .discover(&dir)?;
    let cancel = CancellationFlag::new();

    let runner = MigrationRunner::new(publication.clone(), units)
        .with_search(search_service(&publication, config))
        .with_max_batch_size(args.batch_size.unwrap_or(config.migration.max_batch_size))
        .with_cancellation(cancel.clone());

    if args.dry_run {
        let pending: Vec<&str> = runner.plan()?.into_iter().map(|u| u.name.as_str()).collect();
        if json {
            return print_json(&pending);
        }
        if pending.is_empty() {
            println!("Nothing to apply.");
        } else {
            println!("Would apply {} migration(s):", pending.len());
            for name in pending {
                println!("  {}", name);
            }
        }
        return Ok(());
    }

    let commit = (config.migration.commit || args.commit) && !args.no_commit;
    let mut sink: Box<dyn CommitSink + Send> = if commit {
        Box::new(GitCommitSink::new(publication.layout().root()))
    } else {
        Box::new(NoopSink::default())
    };

    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("cancellation requested, stopping at the next checkpoint");
                cancel.cancel();
            }
        })
    };

    let report = tokio::task::spawn_blocking(move || runner.run(sink.as_mut()))
        .await
        .context("Migration task panicked")?;
    watcher.abort();
    let report = report?;

    if json {
        return print_json(&report);
    }
    for unit in &report.applied {
        println!(
            "{} {}  created {} updated {} deleted {} in {:.2}s ({} file(s), {} batch(es))",
            "applied".green(),
            unit.name,
            unit.stats.created,
            unit.stats.updated,
            unit.stats.deleted,
            unit.stats.duration.as_secs_f64(),
            unit.files,
            unit.batches,
        );
    }
    if !report.skipped.is_empty() {
        println!("{} {} already applied", "skipped".dimmed(), report.skipped.len());
    }
    if report.applied.is_empty() {
        println!("Nothing to apply.");
    }
    Ok(())
}
