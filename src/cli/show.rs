//! `nes show` command
//!
//! Shows the current state of an entity or relationship, or one of its
//! versions.
//!
//! # Usage
//! ```bash
//! nes show entity:person/ram-example
//! nes show entity:person/ram-example --version 1
//! nes show relationship:0f3a... --json
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::utils::{open_publication, print_json};
use crate::config::Config;
use crate::core::entity::Entity;
use crate::core::record_store::Record;
use crate::core::relationship::Relationship;
use crate::core::version::Version;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Entity or relationship id
    pub id: String,

    /// Show a specific version instead of the current state
    #[arg(long)]
    pub version: Option<u64>,
}

pub fn run(args: ShowArgs, config: &Config, json: bool) -> Result<()> {
    let publication = open_publication(config)?;

    if let Some(number) = args.version {
        let version = publication.versions().get_version(&args.id, number)?;
        return if json {
            print_json(&version)
        } else {
            print_version(&version)
        };
    }

    let record = publication.records().get(&args.id)?;
    if json {
        return print_json(&record.to_snapshot()?);
    }
    match &record {
        Record::Entity(entity) => print_entity(entity),
        Record::Relationship(rel) => print_relationship(rel),
    }
    Ok(())
}

fn rule() {
    println!("{}", "─".repeat(48).dimmed());
}

fn print_entity(entity: &Entity) {
    rule();
    println!("{}", entity.display_name().bold());
    rule();
    println!("ID:       {}", entity.id);
    match entity.sub_type() {
        Some(sub) => println!("Type:     {} / {}", entity.entity_type(), sub),
        None => println!("Type:     {}", entity.entity_type()),
    }
    for name in &entity.data.names {
        let parts: Vec<&str> = name.languages().map(|p| p.full.as_str()).collect();
        println!("Name:     {:?} {}", name.kind, parts.join(" | "));
    }
    if !entity.data.tags.is_empty() {
        let tags: Vec<&str> = entity.data.tags.iter().map(String::as_str).collect();
        println!("Tags:     {}", tags.join(", "));
    }
    for (key, value) in &entity.data.attributes {
        println!("  {} = {}", key.cyan(), value);
    }
    for identifier in &entity.data.identifiers {
        println!("  {:?}: {}", identifier.scheme, identifier.value);
    }
    if let Some(short) = &entity.data.short_description {
        println!("\n{}", short);
    }
    println!(
        "\nVersion {} by {} at {}",
        entity.version(),
        entity.version_summary.author,
        entity.version_summary.created_at
    );
    rule();
}

fn print_relationship(rel: &Relationship) {
    rule();
    println!(
        "{} {} {}",
        rel.data.source_entity_id,
        format!("-[{}]->", rel.data.relationship_type).bold(),
        rel.data.target_entity_id
    );
    rule();
    println!("ID:       {}", rel.id);
    if let Some(start) = rel.data.start_date {
        println!("Start:    {}", start);
    }
    if let Some(end) = rel.data.end_date {
        println!("End:      {}", end);
    }
    for (key, value) in &rel.data.attributes {
        println!("  {} = {}", key.cyan(), value);
    }
    println!(
        "\nVersion {} by {} at {}",
        rel.version(),
        rel.version_summary.author,
        rel.version_summary.created_at
    );
    rule();
}

fn print_version(version: &Version) -> Result<()> {
    println!("{}", version.version_id.bold());
    println!("Author:  {}", version.author);
    println!("Created: {}", version.created_at);
    if let Some(desc) = &version.change_description {
        println!("Change:  {}", desc);
    }
    match &version.snapshot {
        Some(snapshot) => println!("\n{}", serde_json::to_string_pretty(snapshot)?),
        None => println!("\n{}", "(deleted)".red()),
    }
    Ok(())
}
