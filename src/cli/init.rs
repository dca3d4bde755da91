//! `nes init` command
//!
//! Writes `.nes/config.toml` and creates the store and migrations directories.
//!
//! # Usage
//! ```bash
//! nes init                          # Initialize in current directory
//! nes init /path/to/registry        # Initialize in specific path
//! nes init --store /data/nes-db/v2  # Custom store root
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use crate::config::{Config, CONFIG_DIR, CONFIG_FILE, DEFAULT_STORE_ROOT};
use crate::core::layout::StoreLayout;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path to initialize (default: current directory)
    pub path: Option<PathBuf>,

    /// Store root recorded in the config (default: nes-db/v2)
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Overwrite an existing config
    #[arg(short, long)]
    pub force: bool,
}

pub fn run(args: InitArgs) -> Result<()> {
    let base = args.path.unwrap_or_else(|| PathBuf::from("."));
    let config_path = base.join(CONFIG_DIR).join(CONFIG_FILE);

    if config_path.exists() && !args.force {
        bail!(
            "{} already exists. Use --force to reinitialize.",
            config_path.display()
        );
    }

    let mut config = Config::default();
    config.store.root = Some(args.store.unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_ROOT)));
    config.save_to(&config_path)?;

    let store_root = resolve(&base, config.store.root.as_deref());
    let layout = StoreLayout::new(&store_root);
    for dir in [
        layout.entities_dir(),
        layout.relationships_dir(),
        layout.markers_dir(),
        base.join(&config.migration.dir),
    ] {
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    println!("{} {}", "Initialized registry in".green(), base.display());
    println!("   Config: {}", config_path.display());
    println!("   Store:  {}", store_root.display());
    println!("\nNext steps:");
    println!("  add a unit under {}/001-<name>/", config.migration.dir.display());
    println!("  nes migrate --dry-run");
    Ok(())
}

fn resolve(base: &Path, root: Option<&Path>) -> PathBuf {
    match root {
        Some(root) if root.is_absolute() => root.to_path_buf(),
        Some(root) => base.join(root),
        None => base.join(DEFAULT_STORE_ROOT),
    }
}
