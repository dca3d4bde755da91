//! `nes search` command
//!
//! Filters entities (default) or relationships (`--relationships`).
//!
//! # Usage
//! ```bash
//! nes search "ram"
//! nes search --type organization --sub-type political_party
//! nes search --attr party=nepali-congress --tags mp,federal
//! nes search --relationships --source entity:person/ram-example --current
//! ```

use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;

use super::utils::{open_publication, print_json, search_service, truncate};
use crate::config::Config;
use crate::core::search::{EntityQuery, RelationshipQuery};
use crate::core::value::AttributeValue;
use crate::core::vocabulary::{EntitySubType, EntityType, RelationshipType};

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Text matched against names and slug
    pub query: Option<String>,

    /// Entity type (person, organization, location, project)
    #[arg(short = 't', long = "type")]
    pub entity_type: Option<EntityType>,

    /// Entity sub-type
    #[arg(long)]
    pub sub_type: Option<EntitySubType>,

    /// Attribute filter `key=value` (repeatable; value parsed as JSON when possible)
    #[arg(short, long = "attr", value_parser = parse_attr)]
    pub attributes: Vec<(String, AttributeValue)>,

    /// Required tags (comma-separated, AND logic)
    #[arg(long)]
    pub tags: Option<String>,

    /// Search relationships instead of entities
    #[arg(short, long)]
    pub relationships: bool,

    /// Relationship type (e.g. MEMBER_OF)
    #[arg(long)]
    pub relationship_type: Option<RelationshipType>,

    /// Relationship source entity id
    #[arg(long)]
    pub source: Option<String>,

    /// Relationship target entity id
    #[arg(long)]
    pub target: Option<String>,

    /// Active on this date (YYYY-MM-DD)
    #[arg(long)]
    pub active_on: Option<NaiveDate>,

    /// Only relationships without an end date
    #[arg(long)]
    pub current: bool,

    /// Maximum results (default from config)
    #[arg(short, long)]
    pub limit: Option<usize>,

    #[arg(long, default_value = "0")]
    pub offset: usize,
}

pub fn run(args: SearchArgs, config: &Config, json: bool) -> Result<()> {
    let publication = open_publication(config)?;
    let search = search_service(&publication, config);
    let limit = args.limit.unwrap_or(config.search.default_limit);

    if args.relationships {
        let mut query = RelationshipQuery::new().page(limit, args.offset);
        if let Some(t) = args.relationship_type {
            query = query.with_type(t);
        }
        if let Some(source) = args.source {
            query = query.with_source(source);
        }
        if let Some(target) = args.target {
            query = query.with_target(target);
        }
        if let Some(date) = args.active_on {
            query = query.active_on(date);
        }
        if args.current {
            query = query.currently_active();
        }

        let page = search.search_relationships(&query)?;
        if json {
            return print_json(&page);
        }
        if page.items.is_empty() {
            println!("No results found.");
            return Ok(());
        }
        println!("\nFound {} relationship(s):\n", page.total);
        for rel in &page.items {
            println!(
                "{}  {} -[{}]-> {}",
                rel.id, rel.data.source_entity_id, rel.data.relationship_type, rel.data.target_entity_id
            );
        }
        print_footer(page.offset, page.items.len(), page.total);
        return Ok(());
    }

    let mut query = EntityQuery::new().page(limit, args.offset);
    if let Some(text) = args.query {
        query = query.with_text(text);
    }
    if let Some(t) = args.entity_type {
        query = query.with_type(t);
    }
    if let Some(sub) = args.sub_type {
        query = query.with_sub_type(sub);
    }
    for (key, value) in args.attributes {
        query = query.with_attribute(key, value);
    }
    if let Some(tags) = &args.tags {
        query = query.with_tags(tags);
    }

    let page = search.search_entities(&query)?;
    if json {
        return print_json(&page);
    }
    if page.items.is_empty() {
        println!("No results found.");
        return Ok(());
    }
    println!("\nFound {} entit(ies):\n", page.total);
    for (i, entity) in page.items.iter().enumerate() {
        println!("{}. {}", page.offset + i + 1, entity.id);
        println!("   {}", entity.display_name());
        if let Some(short) = &entity.data.short_description {
            println!("   {}", truncate(short, 100));
        }
    }
    print_footer(page.offset, page.items.len(), page.total);
    Ok(())
}

fn print_footer(offset: usize, shown: usize, total: usize) {
    if offset + shown < total {
        println!("\n… {} more (use --offset {})", total - offset - shown, offset + shown);
    }
}

fn parse_attr(raw: &str) -> std::result::Result<(String, AttributeValue), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{}`", raw))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| AttributeValue::String(value.to_string()));
    Ok((key.trim().to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_attr() {
        let (key, value) = parse_attr("party=nepali-congress").unwrap();
        assert_eq!(key, "party");
        assert_eq!(value, AttributeValue::String("nepali-congress".into()));

        let (_, value) = parse_attr("seats=89").unwrap();
        assert_eq!(value, AttributeValue::Int(89));

        assert!(parse_attr("no-separator").is_err());
    }
}
