//! `nes history` command
//!
//! # Usage
//! ```bash
//! nes history entity:person/ram-example
//! nes history entity:person/ram-example --limit 5 --json
//! ```

use anyhow::Result;
use clap::Args;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use super::utils::{open_publication, print_json, search_service, truncate};
use crate::config::Config;
use crate::core::version::Version;

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Entity or relationship id
    pub id: String,

    /// Maximum versions (default from config)
    #[arg(short, long)]
    pub limit: Option<usize>,

    #[arg(long, default_value = "0")]
    pub offset: usize,
}

#[derive(Tabled)]
struct VersionRow {
    #[tabled(rename = "#")]
    number: u64,
    created: String,
    author: String,
    change: String,
}

impl From<&Version> for VersionRow {
    fn from(v: &Version) -> Self {
        let change = match (&v.snapshot, &v.change_description) {
            (None, Some(desc)) => format!("(deleted) {}", desc),
            (None, None) => "(deleted)".to_string(),
            (Some(_), desc) => desc.clone().unwrap_or_default(),
        };
        Self {
            number: v.version_number,
            created: v.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            author: v.author.clone(),
            change: truncate(&change, 60),
        }
    }
}

pub fn run(args: HistoryArgs, config: &Config, json: bool) -> Result<()> {
    let publication = open_publication(config)?;
    let search = search_service(&publication, config);
    let limit = args.limit.unwrap_or(config.search.default_limit);

    let page = search.get_versions(&args.id, limit, args.offset)?;
    if json {
        return print_json(&page);
    }
    if page.total == 0 {
        println!("No history for {}", args.id);
        return Ok(());
    }

    let rows: Vec<VersionRow> = page.items.iter().map(VersionRow::from).collect();
    println!("{} ({} version(s))", args.id, page.total);
    println!("{}", Table::new(rows).with(Style::rounded()));
    Ok(())
}
