//! CLI utility functions
//!
//! Helpers shared across commands: opening the store from config and
//! printing JSON.

use std::path::PathBuf;

use anyhow::{bail, Result};
use serde::Serialize;

use crate::config::Config;
use crate::core::publication::PublicationService;
use crate::core::search::SearchService;

/// Resolve the store root and make sure it exists
///
/// # Errors
/// Fails when the directory is missing; `nes init` creates it.
pub fn store_root(config: &Config) -> Result<PathBuf> {
    let root = config.store_root();
    if !root.is_dir() {
        bail!(
            "No store at {}. Run 'nes init' or set NES_DB_PATH.",
            root.display()
        );
    }
    Ok(root)
}

pub fn open_publication(config: &Config) -> Result<PublicationService> {
    Ok(PublicationService::open(store_root(config)?))
}

/// Query handle with the configured limits
pub fn search_service(publication: &PublicationService, config: &Config) -> SearchService {
    SearchService::new(publication.records().clone(), publication.versions().clone())
        .with_max_limit(config.search.max_limit)
        .with_fan_out(config.search.fan_out)
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Shorten `text` to `max` characters
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
