//! Record store - current state of every entity and relationship
//!
//! One pretty-printed JSON document per record, replaced atomically on every
//! write. Mutating methods are crate-private: only the publication core may
//! change current state, so that it always mirrors the newest version.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::changes::ChangeTracker;
use super::entity::Entity;
use super::fsio::{read_json, remove_file, walk_documents, write_json_atomic};
use super::identifiers::RecordKind;
use super::layout::StoreLayout;
use super::relationship::Relationship;
use super::version::VersionSummary;
use crate::error::{Error, Result};

/// A stored record of either kind
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Entity(Entity),
    Relationship(Relationship),
}

impl Record {
    pub fn id(&self) -> &str {
        match self {
            Record::Entity(e) => &e.id,
            Record::Relationship(r) => &r.id,
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Entity(_) => RecordKind::Entity,
            Record::Relationship(_) => RecordKind::Relationship,
        }
    }

    pub fn version_summary(&self) -> &VersionSummary {
        match self {
            Record::Entity(e) => &e.version_summary,
            Record::Relationship(r) => &r.version_summary,
        }
    }

    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Record::Entity(e) => Some(e),
            Record::Relationship(_) => None,
        }
    }

    pub fn as_relationship(&self) -> Option<&Relationship> {
        match self {
            Record::Relationship(r) => Some(r),
            Record::Entity(_) => None,
        }
    }

    /// Full JSON state, as stored in versions
    pub fn to_snapshot(&self) -> Result<Value> {
        let result = match self {
            Record::Entity(e) => serde_json::to_value(e),
            Record::Relationship(r) => serde_json::to_value(r),
        };
        result.map_err(|e| Error::serialization(self.id(), e))
    }

    /// Rebuild a record from a version snapshot
    pub fn from_snapshot(id: &str, snapshot: Value) -> Result<Self> {
        let record = match RecordKind::of(id)? {
            RecordKind::Entity => Record::Entity(
                serde_json::from_value(snapshot).map_err(|e| Error::serialization(id, e))?,
            ),
            RecordKind::Relationship => Record::Relationship(
                serde_json::from_value(snapshot).map_err(|e| Error::serialization(id, e))?,
            ),
        };
        Ok(record)
    }
}

/// File-backed current-state store
pub struct RecordStore {
    layout: StoreLayout,
    changes: Arc<ChangeTracker>,
}

impl RecordStore {
    pub fn new(layout: StoreLayout, changes: Arc<ChangeTracker>) -> Self {
        Self { layout, changes }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Fetch a record or fail with `NotFound`
    pub fn get(&self, id: &str) -> Result<Record> {
        self.find(id)?.ok_or_else(|| Error::not_found(id))
    }

    pub fn find(&self, id: &str) -> Result<Option<Record>> {
        let kind = RecordKind::of(id)?;
        let path = self.layout.absolute(&self.layout.record_path(id)?);
        read_record(&path, kind)
    }

    pub fn exists(&self, id: &str) -> Result<bool> {
        let path = self.layout.absolute(&self.layout.record_path(id)?);
        Ok(path.is_file())
    }

    /// Raw JSON document of a record, if present
    pub(crate) fn read_snapshot(&self, id: &str) -> Result<Option<Value>> {
        let path = self.layout.absolute(&self.layout.record_path(id)?);
        read_json(&path)
    }

    /// Create or replace a record atomically
    pub(crate) fn put(&self, record: &Record) -> Result<()> {
        self.put_snapshot(record.id(), &record.to_snapshot()?)
    }

    pub(crate) fn put_snapshot(&self, id: &str, snapshot: &Value) -> Result<()> {
        let relative = self.layout.record_path(id)?;
        write_json_atomic(&self.layout.absolute(&relative), snapshot)?;
        self.changes.mark(&relative);
        debug!(id, path = %relative.display(), "record written");
        Ok(())
    }

    /// Remove a record or fail with `NotFound`
    pub(crate) fn delete(&self, id: &str) -> Result<()> {
        if self.remove(id)? {
            Ok(())
        } else {
            Err(Error::not_found(id))
        }
    }

    /// Remove a record if present
    pub(crate) fn remove(&self, id: &str) -> Result<bool> {
        let relative = self.layout.record_path(id)?;
        let removed = remove_file(&self.layout.absolute(&relative))?;
        if removed {
            self.changes.mark(&relative);
            debug!(id, "record removed");
        }
        Ok(removed)
    }

    /// Lazily iterate records of one kind that satisfy `filter`
    ///
    /// The set of documents is fixed when the call is made; each document is
    /// read on demand, and an unreadable one yields an `Err` item without
    /// ending the iteration. Order is by storage path.
    pub fn list<F>(&self, kind: RecordKind, filter: F) -> Result<impl Iterator<Item = Result<Record>>>
    where
        F: Fn(&Record) -> bool,
    {
        let dir = match kind {
            RecordKind::Entity => self.layout.entities_dir(),
            RecordKind::Relationship => self.layout.relationships_dir(),
        };
        let paths = walk_documents(&dir)?;
        Ok(RecordIter {
            paths: paths.into_iter(),
            kind,
        }
        .filter(move |item| match item {
            Ok(record) => filter(record),
            Err(_) => true,
        }))
    }

    pub fn entities(&self) -> Result<impl Iterator<Item = Result<Entity>>> {
        Ok(self.list(RecordKind::Entity, |_| true)?.filter_map(|item| match item {
            Ok(Record::Entity(e)) => Some(Ok(e)),
            Ok(Record::Relationship(_)) => None,
            Err(e) => Some(Err(e)),
        }))
    }

    pub fn relationships(&self) -> Result<impl Iterator<Item = Result<Relationship>>> {
        Ok(self
            .list(RecordKind::Relationship, |_| true)?
            .filter_map(|item| match item {
                Ok(Record::Relationship(r)) => Some(Ok(r)),
                Ok(Record::Entity(_)) => None,
                Err(e) => Some(Err(e)),
            }))
    }
}

struct RecordIter {
    paths: std::vec::IntoIter<PathBuf>,
    kind: RecordKind,
}

impl Iterator for RecordIter {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let path = self.paths.next()?;
            match read_record(&path, self.kind) {
                Ok(Some(record)) => return Some(Ok(record)),
                // removed since the listing was taken
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

fn read_record(path: &Path, kind: RecordKind) -> Result<Option<Record>> {
    Ok(match kind {
        RecordKind::Entity => read_json::<Entity>(path)?.map(Record::Entity),
        RecordKind::Relationship => read_json::<Relationship>(path)?.map(Record::Relationship),
    })
}
