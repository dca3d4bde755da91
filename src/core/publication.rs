//! Publication - the only writer of records and versions
//!
//! Every mutation validates fully, then writes exactly one new version and
//! mirrors it into the record store.
//!
//! # Write order
//! The version is appended first and the current-state document written
//! second. `reconcile` rolls a record forward to its newest version and runs
//! before every mutation, so a crash between the two writes is repaired the
//! next time the record is touched (or by `reconcile_all` before a migration
//! run).
//!
//! # Deletion
//! Deleting appends a tombstone version (no snapshot) and removes the
//! current-state document. History is never erased, and recreating the same
//! id continues its version numbering.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::authors::AuthorRegistry;
use super::changes::ChangeTracker;
use super::entity::{Entity, EntityData};
use super::identifiers::{AuthorId, EntityId};
use super::layout::StoreLayout;
use super::record_store::{Record, RecordStore};
use super::relationship::{Relationship, RelationshipData};
use super::version::{Version, VersionSummary};
use super::version_store::VersionStore;
use crate::error::{Error, FieldError, Result};

pub struct PublicationService {
    records: Arc<RecordStore>,
    versions: Arc<VersionStore>,
    authors: AuthorRegistry,
    changes: Arc<ChangeTracker>,
}

impl PublicationService {
    /// Open the store rooted at `root` (directories are created lazily)
    pub fn open(root: impl Into<PathBuf>) -> Self {
        let layout = StoreLayout::new(root);
        let changes = Arc::new(ChangeTracker::new());
        Self {
            records: Arc::new(RecordStore::new(layout.clone(), changes.clone())),
            versions: Arc::new(VersionStore::new(layout.clone(), changes.clone())),
            authors: AuthorRegistry::new(layout, changes.clone()),
            changes,
        }
    }

    pub fn records(&self) -> &Arc<RecordStore> {
        &self.records
    }

    pub fn versions(&self) -> &Arc<VersionStore> {
        &self.versions
    }

    pub fn authors(&self) -> &AuthorRegistry {
        &self.authors
    }

    pub fn changes(&self) -> &Arc<ChangeTracker> {
        &self.changes
    }

    pub fn layout(&self) -> &StoreLayout {
        self.records.layout()
    }

    // ------------------------------------------------------------------
    // Entities
    // ------------------------------------------------------------------

    pub fn create_entity(
        &self,
        data: EntityData,
        author: &str,
        description: Option<&str>,
    ) -> Result<Entity> {
        data.validate()?;
        let id = data.entity_id()?.id();
        let author = AuthorId::parse(author)?;

        self.reconcile(&id)?;
        if self.records.exists(&id)? {
            return Err(Error::SlugCollision { id });
        }

        self.authors.ensure(&author, None)?;
        let attribution = data.attribution.clone();
        let mut created = None;
        let version = self.versions.append_with(
            &id,
            &author.to_string(),
            description.map(str::to_string),
            attribution,
            |number, now| {
                let entity = Entity {
                    id: id.clone(),
                    data,
                    created_at: now,
                    version_summary: summary(number, &author, now, description),
                };
                let snapshot = Record::Entity(entity.clone()).to_snapshot()?;
                created = Some(entity);
                Ok(Some(snapshot))
            },
        )?;
        let entity = created.ok_or_else(|| Error::not_found(&id))?;

        self.records.put(&Record::Entity(entity.clone()))?;
        debug!(id = %entity.id, version = version.version_number, "entity created");
        Ok(entity)
    }

    /// Apply `mutate` to the current state and store the result as a new version
    ///
    /// `slug`, `type` and `sub_type` determine the id and cannot change.
    pub fn update_entity<F>(
        &self,
        id: &str,
        mutate: F,
        author: &str,
        description: Option<&str>,
    ) -> Result<Entity>
    where
        F: FnOnce(&mut EntityData),
    {
        let author = AuthorId::parse(author)?;
        self.reconcile(id)?;
        let current = self.get_entity(id)?;

        let mut data = current.data.clone();
        mutate(&mut data);
        check_entity_identity(&current.data, &data)?;
        data.validate()?;

        self.authors.ensure(&author, None)?;
        let attribution = data.attribution.clone();
        let mut updated = None;
        let version = self.versions.append_with(
            id,
            &author.to_string(),
            description.map(str::to_string),
            attribution,
            |number, now| {
                let entity = Entity {
                    id: id.to_string(),
                    data,
                    created_at: current.created_at,
                    version_summary: summary(number, &author, now, description),
                };
                let snapshot = Record::Entity(entity.clone()).to_snapshot()?;
                updated = Some(entity);
                Ok(Some(snapshot))
            },
        )?;
        let entity = updated.ok_or_else(|| Error::not_found(id))?;

        self.records.put(&Record::Entity(entity.clone()))?;
        debug!(id, version = version.version_number, "entity updated");
        Ok(entity)
    }

    /// Replace the whole content of an entity
    pub fn replace_entity(
        &self,
        id: &str,
        data: EntityData,
        author: &str,
        description: Option<&str>,
    ) -> Result<Entity> {
        self.update_entity(id, move |current| *current = data, author, description)
    }

    /// Delete an entity that no live relationship references
    pub fn delete_entity(&self, id: &str, author: &str, description: Option<&str>) -> Result<()> {
        let author = AuthorId::parse(author)?;
        self.reconcile(id)?;
        self.get_entity(id)?;

        for rel in self.records.relationships()? {
            let rel = rel?;
            if rel.touches(id) {
                return Err(Error::DanglingReference {
                    field: "relationships".to_string(),
                    id: rel.id,
                });
            }
        }

        self.tombstone(id, &author, description)?;
        debug!(id, "entity deleted");
        Ok(())
    }

    pub fn get_entity(&self, id: &str) -> Result<Entity> {
        match self.records.get(id)? {
            Record::Entity(entity) => Ok(entity),
            Record::Relationship(_) => Err(Error::malformed(id, "not an entity id")),
        }
    }

    /// Full history of an entity, newest first
    pub fn get_entity_versions(&self, id: &str) -> Result<Vec<Version>> {
        EntityId::parse(id)?;
        self.versions.list_versions(id)
    }

    // ------------------------------------------------------------------
    // Relationships
    // ------------------------------------------------------------------

    pub fn create_relationship(
        &self,
        data: RelationshipData,
        author: &str,
        description: Option<&str>,
    ) -> Result<Relationship> {
        data.validate()?;
        let id = data.relationship_id()?;
        let author = AuthorId::parse(author)?;

        self.check_endpoints(&data)?;
        self.reconcile(&id)?;
        if self.records.exists(&id)? {
            return Err(Error::SlugCollision { id });
        }

        self.authors.ensure(&author, None)?;
        let attribution = data.attribution.clone();
        let mut created = None;
        let version = self.versions.append_with(
            &id,
            &author.to_string(),
            description.map(str::to_string),
            attribution,
            |number, now| {
                let rel = Relationship {
                    id: id.clone(),
                    data,
                    created_at: now,
                    version_summary: summary(number, &author, now, description),
                };
                let snapshot = Record::Relationship(rel.clone()).to_snapshot()?;
                created = Some(rel);
                Ok(Some(snapshot))
            },
        )?;
        let rel = created.ok_or_else(|| Error::not_found(&id))?;

        self.records.put(&Record::Relationship(rel.clone()))?;
        debug!(id = %rel.id, version = version.version_number, "relationship created");
        Ok(rel)
    }

    /// Apply `mutate` to a relationship; endpoints and type cannot change
    pub fn update_relationship<F>(
        &self,
        id: &str,
        mutate: F,
        author: &str,
        description: Option<&str>,
    ) -> Result<Relationship>
    where
        F: FnOnce(&mut RelationshipData),
    {
        let author = AuthorId::parse(author)?;
        self.reconcile(id)?;
        let current = self.get_relationship(id)?;

        let mut data = current.data.clone();
        mutate(&mut data);
        check_relationship_identity(&current.data, &data)?;
        data.validate()?;
        self.check_endpoints(&data)?;

        self.authors.ensure(&author, None)?;
        let attribution = data.attribution.clone();
        let mut updated = None;
        let version = self.versions.append_with(
            id,
            &author.to_string(),
            description.map(str::to_string),
            attribution,
            |number, now| {
                let rel = Relationship {
                    id: id.to_string(),
                    data,
                    created_at: current.created_at,
                    version_summary: summary(number, &author, now, description),
                };
                let snapshot = Record::Relationship(rel.clone()).to_snapshot()?;
                updated = Some(rel);
                Ok(Some(snapshot))
            },
        )?;
        let rel = updated.ok_or_else(|| Error::not_found(id))?;

        self.records.put(&Record::Relationship(rel.clone()))?;
        debug!(id, version = version.version_number, "relationship updated");
        Ok(rel)
    }

    pub fn delete_relationship(
        &self,
        id: &str,
        author: &str,
        description: Option<&str>,
    ) -> Result<()> {
        let author = AuthorId::parse(author)?;
        self.reconcile(id)?;
        self.get_relationship(id)?;
        self.tombstone(id, &author, description)?;
        debug!(id, "relationship deleted");
        Ok(())
    }

    pub fn get_relationship(&self, id: &str) -> Result<Relationship> {
        match self.records.get(id)? {
            Record::Relationship(rel) => Ok(rel),
            Record::Entity(_) => Err(Error::malformed(id, "not a relationship id")),
        }
    }

    /// History of any record, newest first
    pub fn get_versions(&self, id: &str) -> Result<Vec<Version>> {
        self.versions.list_versions(id)
    }

    // ------------------------------------------------------------------
    // Recovery
    // ------------------------------------------------------------------

    /// Roll the current state of `id` forward to its newest version
    ///
    /// Returns `true` when the record store had to be repaired.
    pub fn reconcile(&self, id: &str) -> Result<bool> {
        let Some(latest) = self.versions.latest(id)? else {
            return Ok(false);
        };

        match latest.snapshot {
            None => {
                let removed = self.records.remove(id)?;
                if removed {
                    warn!(id, version = latest.version_number, "removed record left behind by an interrupted delete");
                }
                Ok(removed)
            }
            Some(snapshot) => {
                if self.records.read_snapshot(id)?.as_ref() == Some(&snapshot) {
                    return Ok(false);
                }
                self.records.put_snapshot(id, &snapshot)?;
                warn!(id, version = latest.version_number, "restored record from its newest version");
                Ok(true)
            }
        }
    }

    /// Reconcile every record that has history; returns the number repaired
    pub fn reconcile_all(&self) -> Result<usize> {
        let mut repaired = 0;
        for id in self.versions.record_ids()? {
            if self.reconcile(&id)? {
                repaired += 1;
            }
        }
        Ok(repaired)
    }

    fn tombstone(&self, id: &str, author: &AuthorId, description: Option<&str>) -> Result<()> {
        self.authors.ensure(author, None)?;
        self.versions.append_with(
            id,
            &author.to_string(),
            description.map(str::to_string),
            None,
            |_, _| Ok(None),
        )?;
        self.records.delete(id)
    }

    fn check_endpoints(&self, data: &RelationshipData) -> Result<()> {
        for (field, endpoint) in [
            ("source_entity_id", &data.source_entity_id),
            ("target_entity_id", &data.target_entity_id),
        ] {
            if !self.records.exists(endpoint)? {
                return Err(Error::DanglingReference {
                    field: field.to_string(),
                    id: endpoint.clone(),
                });
            }
        }
        Ok(())
    }
}

fn summary(
    number: u64,
    author: &AuthorId,
    now: DateTime<Utc>,
    description: Option<&str>,
) -> VersionSummary {
    VersionSummary {
        version_number: number,
        author: author.to_string(),
        created_at: now,
        change_description: description.map(str::to_string),
    }
}

fn check_entity_identity(before: &EntityData, after: &EntityData) -> Result<()> {
    let mut errors = Vec::new();
    if before.slug != after.slug {
        errors.push(FieldError::new("slug", "cannot change after creation"));
    }
    if before.entity_type != after.entity_type {
        errors.push(FieldError::new("type", "cannot change after creation"));
    }
    if before.sub_type != after.sub_type {
        errors.push(FieldError::new("sub_type", "cannot change after creation"));
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(errors))
    }
}

fn check_relationship_identity(before: &RelationshipData, after: &RelationshipData) -> Result<()> {
    let mut errors = Vec::new();
    if before.source_entity_id != after.source_entity_id {
        errors.push(FieldError::new("source_entity_id", "cannot change after creation"));
    }
    if before.target_entity_id != after.target_entity_id {
        errors.push(FieldError::new("target_entity_id", "cannot change after creation"));
    }
    if before.relationship_type != after.relationship_type {
        errors.push(FieldError::new("type", "cannot change after creation"));
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(errors))
    }
}
