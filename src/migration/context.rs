//! Migration context - the capability bundle handed to a unit
//!
//! Writes go through the publication core under the unit's author and change
//! description, and are counted for the replay marker and commit message.
//! File helpers only read inside the unit's own folder.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context as _, Result};
use serde::de::DeserializeOwned;
use tracing::info;

use super::batch::MigrationStats;
use super::{CancellationFlag, MigrationMetadata};
use crate::core::entity::{Entity, EntityData};
use crate::core::publication::PublicationService;
use crate::core::relationship::{Relationship, RelationshipData};
use crate::core::search::SearchService;
use crate::error::{Error, Result as CoreResult};

pub struct MigrationContext<'a> {
    metadata: &'a MigrationMetadata,
    dir: PathBuf,
    publication: &'a PublicationService,
    search: SearchService,
    cancel: CancellationFlag,
    stats: MigrationStats,
}

impl<'a> MigrationContext<'a> {
    pub fn new(
        metadata: &'a MigrationMetadata,
        dir: impl Into<PathBuf>,
        publication: &'a PublicationService,
        search: SearchService,
        cancel: CancellationFlag,
    ) -> Self {
        Self {
            metadata,
            dir: dir.into(),
            publication,
            search,
            cancel,
            stats: MigrationStats::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn metadata(&self) -> &MigrationMetadata {
        self.metadata
    }

    /// Author id used for every write of this unit
    pub fn author(&self) -> &str {
        &self.metadata.author
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn stats(&self) -> &MigrationStats {
        &self.stats
    }

    pub(crate) fn into_stats(self) -> MigrationStats {
        self.stats
    }

    /// Read-only queries
    pub fn search(&self) -> &SearchService {
        &self.search
    }

    /// Direct publication handle, for reads (`get_entity`, `get_versions`)
    ///
    /// Writes made through it are versioned but not counted in the unit's stats.
    pub fn publication(&self) -> &PublicationService {
        self.publication
    }

    pub fn log(&self, message: impl Display) {
        info!(migration = %self.metadata.name, "{}", message);
    }

    /// Fail with `Cancelled` once cancellation has been requested
    pub fn checkpoint(&self) -> CoreResult<()> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    fn description(&self) -> Option<&str> {
        self.metadata
            .change_description
            .as_deref()
            .or(Some(self.metadata.description.as_str()))
    }

    // ------------------------------------------------------------------
    // Counted writes
    // ------------------------------------------------------------------

    pub fn create_entity(&mut self, data: EntityData) -> CoreResult<Entity> {
        self.checkpoint()?;
        let entity = self
            .publication
            .create_entity(data, self.author(), self.description())?;
        self.stats.created += 1;
        Ok(entity)
    }

    pub fn update_entity<F>(&mut self, id: &str, mutate: F) -> CoreResult<Entity>
    where
        F: FnOnce(&mut EntityData),
    {
        self.checkpoint()?;
        let entity = self
            .publication
            .update_entity(id, mutate, self.author(), self.description())?;
        self.stats.updated += 1;
        Ok(entity)
    }

    pub fn delete_entity(&mut self, id: &str) -> CoreResult<()> {
        self.checkpoint()?;
        self.publication
            .delete_entity(id, self.author(), self.description())?;
        self.stats.deleted += 1;
        Ok(())
    }

    pub fn create_relationship(&mut self, data: RelationshipData) -> CoreResult<Relationship> {
        self.checkpoint()?;
        let rel = self
            .publication
            .create_relationship(data, self.author(), self.description())?;
        self.stats.created += 1;
        Ok(rel)
    }

    pub fn update_relationship<F>(&mut self, id: &str, mutate: F) -> CoreResult<Relationship>
    where
        F: FnOnce(&mut RelationshipData),
    {
        self.checkpoint()?;
        let rel = self
            .publication
            .update_relationship(id, mutate, self.author(), self.description())?;
        self.stats.updated += 1;
        Ok(rel)
    }

    pub fn delete_relationship(&mut self, id: &str) -> CoreResult<()> {
        self.checkpoint()?;
        self.publication
            .delete_relationship(id, self.author(), self.description())?;
        self.stats.deleted += 1;
        Ok(())
    }

    /// Create the entity, or replace it when its stored content differs
    ///
    /// Returns `None` when the stored entity already matches `data`, so
    /// re-running the same import writes nothing.
    pub fn upsert_entity(&mut self, data: EntityData) -> CoreResult<Option<Entity>> {
        let id = data.entity_id()?.id();
        match self.publication.records().exists(&id)? {
            false => self.create_entity(data).map(Some),
            true => {
                let current = self.publication.get_entity(&id)?;
                if current.data == data {
                    return Ok(None);
                }
                self.update_entity(&id, move |d| *d = data).map(Some)
            }
        }
    }

    /// Relationship counterpart of [`upsert_entity`](Self::upsert_entity)
    pub fn upsert_relationship(&mut self, data: RelationshipData) -> CoreResult<Option<Relationship>> {
        let id = data.relationship_id()?;
        match self.publication.records().exists(&id)? {
            false => self.create_relationship(data).map(Some),
            true => {
                let current = self.publication.get_relationship(&id)?;
                if current.data == data {
                    return Ok(None);
                }
                self.update_relationship(&id, move |d| *d = data).map(Some)
            }
        }
    }

    // ------------------------------------------------------------------
    // Unit folder helpers
    // ------------------------------------------------------------------

    /// Deserialize a JSON file from the unit's folder
    pub fn read_json<T: DeserializeOwned>(&self, relative: &str) -> Result<T> {
        let path = self.resolve(relative)?;
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))
    }

    /// Read a CSV file with a header row into string maps
    pub fn read_csv(&self, relative: &str) -> Result<Vec<BTreeMap<String, String>>> {
        self.read_csv_as(relative)
    }

    /// Read a CSV file with a header row into typed rows
    pub fn read_csv_as<T: DeserializeOwned>(&self, relative: &str) -> Result<Vec<T>> {
        let path = self.resolve(relative)?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        let mut rows = Vec::new();
        for (i, row) in reader.deserialize().enumerate() {
            let row: T = row.with_context(|| format!("{}: bad row {}", path.display(), i + 1))?;
            rows.push(row);
        }
        Ok(rows)
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let rel = Path::new(relative);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            bail!("{} must be a path inside the migration folder", relative);
        }
        Ok(self.dir.join(rel))
    }
}
