//! Search - read-only query surface over the record store
//!
//! Linear scan with filter predicates; no index.
//!
//! # Key Points
//! - Entity search: case-insensitive text over names, misspelled names and slug,
//!   plus type, sub-type, attribute equality and tag (AND) filters
//! - Relationship search: type, source, target and date activity filters
//! - Results are sorted by id, then paginated by offset/limit
//! - `get_many` reads with bounded concurrency; each id gets its own outcome

use std::sync::Arc;

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::warn;

use super::entity::Entity;
use super::record_store::{Record, RecordStore};
use super::relationship::Relationship;
use super::value::{AttributeValue, Attributes};
use super::version::Version;
use super::version_store::VersionStore;
use super::vocabulary::{EntitySubType, EntityType, RelationshipType};
use crate::error::{ErrorKind, Result};

pub const DEFAULT_LIMIT: usize = 20;
pub const MAX_LIMIT: usize = 100;
pub const DEFAULT_FAN_OUT: usize = 16;

/// Entity search query builder
#[derive(Debug, Clone)]
pub struct EntityQuery {
    /// Case-insensitive substring
    pub text: Option<String>,
    pub entity_type: Option<EntityType>,
    pub sub_type: Option<EntitySubType>,
    /// Every key must be present with an equal value
    pub attributes: Attributes,
    /// Required tags (AND logic)
    pub tags: Vec<String>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for EntityQuery {
    fn default() -> Self {
        Self {
            text: None,
            entity_type: None,
            sub_type: None,
            attributes: Attributes::new(),
            tags: Vec::new(),
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl EntityQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_type(mut self, entity_type: EntityType) -> Self {
        self.entity_type = Some(entity_type);
        self
    }

    pub fn with_sub_type(mut self, sub_type: EntitySubType) -> Self {
        self.sub_type = Some(sub_type);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Comma-joined tag list, e.g. `"mp,federal"`
    pub fn with_tags(mut self, tags: &str) -> Self {
        self.tags = tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        self
    }

    pub fn page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    pub fn matches(&self, entity: &Entity) -> bool {
        if let Some(t) = self.entity_type {
            if entity.entity_type() != t {
                return false;
            }
        }

        if let Some(s) = self.sub_type {
            if entity.sub_type() != Some(s) {
                return false;
            }
        }

        let attrs_match = self.attributes.iter().all(|(key, wanted)| {
            entity
                .data
                .attributes
                .get(key)
                .map_or(false, |actual| actual.matches(wanted))
        });
        if !attrs_match {
            return false;
        }

        if !self.tags.iter().all(|t| entity.data.tags.contains(t)) {
            return false;
        }

        match &self.text {
            Some(text) if !text.trim().is_empty() => text_matches(entity, &text.to_lowercase()),
            _ => true,
        }
    }
}

fn text_matches(entity: &Entity, needle: &str) -> bool {
    if entity.slug().contains(needle) {
        return true;
    }
    entity
        .data
        .names
        .iter()
        .chain(entity.data.misspelled_names.iter())
        .flat_map(|name| name.languages())
        .flat_map(|parts| parts.parts())
        .any(|part| part.to_lowercase().contains(needle))
}

/// Relationship search query builder
#[derive(Debug, Clone)]
pub struct RelationshipQuery {
    pub relationship_type: Option<RelationshipType>,
    pub source_entity_id: Option<String>,
    pub target_entity_id: Option<String>,
    /// Active on this date (open ends inclusive)
    pub active_on: Option<NaiveDate>,
    /// Only relationships without an end date
    pub currently_active: bool,
    pub limit: usize,
    pub offset: usize,
}

impl Default for RelationshipQuery {
    fn default() -> Self {
        Self {
            relationship_type: None,
            source_entity_id: None,
            target_entity_id: None,
            active_on: None,
            currently_active: false,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl RelationshipQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, relationship_type: RelationshipType) -> Self {
        self.relationship_type = Some(relationship_type);
        self
    }

    pub fn with_source(mut self, id: impl Into<String>) -> Self {
        self.source_entity_id = Some(id.into());
        self
    }

    pub fn with_target(mut self, id: impl Into<String>) -> Self {
        self.target_entity_id = Some(id.into());
        self
    }

    pub fn active_on(mut self, date: NaiveDate) -> Self {
        self.active_on = Some(date);
        self
    }

    pub fn currently_active(mut self) -> Self {
        self.currently_active = true;
        self
    }

    pub fn page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    pub fn matches(&self, rel: &Relationship) -> bool {
        let data = &rel.data;
        self.relationship_type
            .map_or(true, |t| data.relationship_type == t)
            && self
                .source_entity_id
                .as_ref()
                .map_or(true, |s| &data.source_entity_id == s)
            && self
                .target_entity_id
                .as_ref()
                .map_or(true, |t| &data.target_entity_id == t)
            && self.active_on.map_or(true, |d| data.is_active_on(d))
            && (!self.currently_active || data.is_current())
    }
}

/// One page of results plus the unpaginated total
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

/// Outcome of one id in a batch read
#[derive(Debug, Clone)]
pub enum Lookup {
    Found(Record),
    Missing,
    Failed(String),
}

/// Read-only query handle
#[derive(Clone)]
pub struct SearchService {
    records: Arc<RecordStore>,
    versions: Arc<VersionStore>,
    max_limit: usize,
    fan_out: usize,
}

impl SearchService {
    pub fn new(records: Arc<RecordStore>, versions: Arc<VersionStore>) -> Self {
        Self {
            records,
            versions,
            max_limit: MAX_LIMIT,
            fan_out: DEFAULT_FAN_OUT,
        }
    }

    pub fn with_max_limit(mut self, max_limit: usize) -> Self {
        self.max_limit = max_limit.max(1);
        self
    }

    pub fn with_fan_out(mut self, fan_out: usize) -> Self {
        self.fan_out = fan_out.max(1);
        self
    }

    pub fn search_entities(&self, query: &EntityQuery) -> Result<Page<Entity>> {
        let mut hits = Vec::new();
        for item in self.records.entities()? {
            match item {
                Ok(entity) if query.matches(&entity) => hits.push(entity),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "skipping unreadable entity"),
            }
        }
        hits.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(paginate(hits, query.limit, query.offset, self.max_limit))
    }

    pub fn search_relationships(&self, query: &RelationshipQuery) -> Result<Page<Relationship>> {
        let mut hits = Vec::new();
        for item in self.records.relationships()? {
            match item {
                Ok(rel) if query.matches(&rel) => hits.push(rel),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "skipping unreadable relationship"),
            }
        }
        hits.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(paginate(hits, query.limit, query.offset, self.max_limit))
    }

    /// Fetch a record or fail with `NotFound`
    pub fn get(&self, id: &str) -> Result<Record> {
        self.records.get(id)
    }

    /// Version history of a record, newest first, paginated
    pub fn get_versions(&self, id: &str, limit: usize, offset: usize) -> Result<Page<Version>> {
        let versions = self.versions.list_versions(id)?;
        Ok(paginate(versions, limit, offset, self.max_limit))
    }

    /// Read many records concurrently (at most `fan_out` in flight)
    ///
    /// Results come back in input order. A failed read is reported for its id
    /// and never aborts the batch.
    pub async fn get_many(&self, ids: Vec<String>) -> Vec<(String, Lookup)> {
        let records = self.records.clone();
        stream::iter(ids)
            .map(|id| {
                let records = records.clone();
                async move {
                    let lookup_id = id.clone();
                    let joined = tokio::task::spawn_blocking(move || records.find(&lookup_id)).await;
                    let lookup = match joined {
                        Ok(Ok(Some(record))) => Lookup::Found(record),
                        Ok(Ok(None)) => Lookup::Missing,
                        Ok(Err(e)) if e.kind() == ErrorKind::NotFound => Lookup::Missing,
                        Ok(Err(e)) => Lookup::Failed(e.to_string()),
                        Err(e) => Lookup::Failed(e.to_string()),
                    };
                    (id, lookup)
                }
            })
            .buffered(self.fan_out)
            .collect()
            .await
    }
}

fn paginate<T>(items: Vec<T>, limit: usize, offset: usize, max_limit: usize) -> Page<T> {
    let limit = limit.clamp(1, max_limit.max(1));
    let total = items.len();
    let items = items.into_iter().skip(offset).take(limit).collect();
    Page {
        items,
        total,
        limit,
        offset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::{EntityData, Name, NameKind, NameParts};
    use crate::core::publication::PublicationService;
    use crate::core::relationship::RelationshipData;
    use tempfile::tempdir;

    const AUTHOR: &str = "author:system:test-seed";

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn seed(publication: &PublicationService) -> Result<()> {
        let mut ram = EntityData::new(EntityType::Person, Some(EntitySubType::Politician), "ram-example", "Ram Example")
            .with_attribute("party", "nepali-congress")
            .with_tag("mp")
            .with_tag("federal");
        ram.names[0].ne = Some(NameParts::full("राम उदाहरण"));
        ram.misspelled_names.push(Name {
            kind: NameKind::Alias,
            en: Some(NameParts::full("Raam Eksampal")),
            ne: None,
        });
        publication.create_entity(ram, AUTHOR, None)?;

        publication.create_entity(
            EntityData::new(EntityType::Person, None, "sita-sharma", "Sita Sharma").with_tag("mp"),
            AUTHOR,
            None,
        )?;
        publication.create_entity(
            EntityData::new(
                EntityType::Organization,
                Some(EntitySubType::PoliticalParty),
                "nepali-congress",
                "Nepali Congress",
            ),
            AUTHOR,
            None,
        )?;

        publication.create_relationship(
            RelationshipData::new(
                "entity:person/politician/ram-example",
                "entity:organization/political_party/nepali-congress",
                RelationshipType::MemberOf,
            )
            .between(Some(date("2010-01-01")), Some(date("2015-12-31"))),
            AUTHOR,
            None,
        )?;
        publication.create_relationship(
            RelationshipData::new(
                "entity:person/sita-sharma",
                "entity:organization/political_party/nepali-congress",
                RelationshipType::MemberOf,
            )
            .between(Some(date("2018-01-01")), None),
            AUTHOR,
            None,
        )?;
        Ok(())
    }

    fn service(publication: &PublicationService) -> SearchService {
        SearchService::new(publication.records().clone(), publication.versions().clone())
    }

    #[test]
    fn test_text_search_covers_names_and_slug() -> Result<()> {
        let dir = tempdir().unwrap();
        let publication = PublicationService::open(dir.path());
        seed(&publication)?;
        let search = service(&publication);

        let ids = |q: EntityQuery| -> Vec<String> {
            search
                .search_entities(&q)
                .unwrap()
                .items
                .into_iter()
                .map(|e| e.id)
                .collect()
        };

        assert_eq!(ids(EntityQuery::new().with_text("RAM")), vec!["entity:person/politician/ram-example"]);
        assert_eq!(ids(EntityQuery::new().with_text("राम")).len(), 1);
        assert_eq!(ids(EntityQuery::new().with_text("eksampal")).len(), 1);
        assert_eq!(ids(EntityQuery::new().with_text("sita-sh")).len(), 1);
        assert_eq!(ids(EntityQuery::new().with_text("congress")).len(), 1);
        Ok(())
    }

    #[test]
    fn test_filters() -> Result<()> {
        let dir = tempdir().unwrap();
        let publication = PublicationService::open(dir.path());
        seed(&publication)?;
        let search = service(&publication);

        let people = search.search_entities(&EntityQuery::new().with_type(EntityType::Person))?;
        assert_eq!(people.total, 2);

        let politicians = search.search_entities(
            &EntityQuery::new().with_sub_type(EntitySubType::Politician),
        )?;
        assert_eq!(politicians.total, 1);

        let by_attr = search.search_entities(
            &EntityQuery::new().with_attribute("party", "nepali-congress"),
        )?;
        assert_eq!(by_attr.total, 1);

        let both_tags = search.search_entities(&EntityQuery::new().with_tags("mp, federal"))?;
        assert_eq!(both_tags.total, 1);
        let one_tag = search.search_entities(&EntityQuery::new().with_tags("mp"))?;
        assert_eq!(one_tag.total, 2);
        Ok(())
    }

    #[test]
    fn test_pagination_is_stable() -> Result<()> {
        let dir = tempdir().unwrap();
        let publication = PublicationService::open(dir.path());
        seed(&publication)?;
        let search = service(&publication);

        let first = search.search_entities(&EntityQuery::new().page(2, 0))?;
        let second = search.search_entities(&EntityQuery::new().page(2, 2))?;
        assert_eq!(first.total, 3);
        assert_eq!(first.items.len(), 2);
        assert_eq!(second.items.len(), 1);
        assert!(first.items[1].id < second.items[0].id);

        let clamped = search.search_entities(&EntityQuery::new().page(10_000, 0))?;
        assert_eq!(clamped.limit, MAX_LIMIT);
        Ok(())
    }

    #[test]
    fn test_relationship_search() -> Result<()> {
        let dir = tempdir().unwrap();
        let publication = PublicationService::open(dir.path());
        seed(&publication)?;
        let search = service(&publication);

        let all = search.search_relationships(&RelationshipQuery::new().with_type(RelationshipType::MemberOf))?;
        assert_eq!(all.total, 2);

        let in_2012 = search.search_relationships(&RelationshipQuery::new().active_on(date("2012-06-01")))?;
        assert_eq!(in_2012.total, 1);
        assert_eq!(in_2012.items[0].data.source_entity_id, "entity:person/politician/ram-example");

        let current = search.search_relationships(&RelationshipQuery::new().currently_active())?;
        assert_eq!(current.total, 1);
        assert_eq!(current.items[0].data.source_entity_id, "entity:person/sita-sharma");

        let to_party = search.search_relationships(
            &RelationshipQuery::new().with_target("entity:organization/political_party/nepali-congress"),
        )?;
        assert_eq!(to_party.total, 2);
        Ok(())
    }

    #[test]
    fn test_get_versions_paginated() -> Result<()> {
        let dir = tempdir().unwrap();
        let publication = PublicationService::open(dir.path());
        seed(&publication)?;
        let id = "entity:person/sita-sharma";
        publication.update_entity(id, |d| d.short_description = Some("MP".into()), AUTHOR, None)?;

        let page = service(&publication).get_versions(id, 1, 0)?;
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].version_number, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_get_many_isolates_failures() -> Result<()> {
        let dir = tempdir().unwrap();
        let publication = PublicationService::open(dir.path());
        seed(&publication)?;
        std::fs::write(dir.path().join("entities/person/broken-one.json"), b"{").unwrap();
        let search = service(&publication).with_fan_out(2);

        let results = search
            .get_many(vec![
                "entity:person/sita-sharma".to_string(),
                "entity:person/nobody-here".to_string(),
                "entity:person/broken-one".to_string(),
                "not-an-id".to_string(),
            ])
            .await;

        assert_eq!(results.len(), 4);
        assert!(matches!(results[0].1, Lookup::Found(_)));
        assert!(matches!(results[1].1, Lookup::Missing));
        assert!(matches!(results[2].1, Lookup::Failed(_)));
        assert!(matches!(results[3].1, Lookup::Failed(_)));
        assert_eq!(results[3].0, "not-an-id");
        Ok(())
    }
}
