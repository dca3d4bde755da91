//! Replay markers - persisted evidence that a unit was applied
//!
//! `migration-markers/<name>.json`, written atomically after the unit body
//! succeeds. A failed or cancelled unit never gets a marker.
//!
//! Writes a failed unit already made are still on disk but were never
//! committed. Their paths are kept in `migration-pending/<name>.json` and
//! folded into the unit's commit once it succeeds. The pending file itself is
//! never marked for commit.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::batch::MigrationStats;
use crate::core::changes::ChangeTracker;
use crate::core::fsio::{read_json, remove_file, walk_documents, write_json_atomic};
use crate::core::layout::StoreLayout;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerStatus {
    Applied,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayMarker {
    pub name: String,
    pub status: MarkerStatus,
    pub applied_at: DateTime<Utc>,
    pub author: String,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub duration_ms: u64,
}

impl ReplayMarker {
    pub fn applied(name: &str, author: &str, stats: &MigrationStats) -> Self {
        Self {
            name: name.to_string(),
            status: MarkerStatus::Applied,
            applied_at: Utc::now(),
            author: author.to_string(),
            created: stats.created,
            updated: stats.updated,
            deleted: stats.deleted,
            duration_ms: stats.duration.as_millis() as u64,
        }
    }
}

/// Paths written by failed attempts of a unit, not yet committed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingChanges {
    pub name: String,
    pub attempts: u32,
    pub last_failure: Option<DateTime<Utc>>,
    pub paths: BTreeSet<PathBuf>,
}

pub struct MarkerStore {
    layout: StoreLayout,
    changes: Arc<ChangeTracker>,
}

impl MarkerStore {
    pub fn new(layout: StoreLayout, changes: Arc<ChangeTracker>) -> Self {
        Self { layout, changes }
    }

    pub fn get(&self, name: &str) -> Result<Option<ReplayMarker>> {
        read_json(&self.layout.absolute(&self.layout.marker_path(name)))
    }

    pub fn is_applied(&self, name: &str) -> Result<bool> {
        Ok(matches!(
            self.get(name)?,
            Some(ReplayMarker {
                status: MarkerStatus::Applied,
                ..
            })
        ))
    }

    pub fn write(&self, marker: &ReplayMarker) -> Result<()> {
        let relative = self.layout.marker_path(&marker.name);
        write_json_atomic(&self.layout.absolute(&relative), marker)?;
        self.changes.mark(&relative);
        Ok(())
    }

    pub fn pending(&self, name: &str) -> Result<Option<PendingChanges>> {
        read_json(&self.layout.absolute(&self.layout.pending_path(name)))
    }

    /// Merge `paths` into the unit's pending set; returns the new set size
    pub fn record_pending(&self, name: &str, paths: Vec<PathBuf>) -> Result<usize> {
        let mut pending = self.pending(name)?.unwrap_or_else(|| PendingChanges {
            name: name.to_string(),
            ..PendingChanges::default()
        });
        pending.attempts += 1;
        pending.last_failure = Some(Utc::now());
        pending.paths.extend(paths);
        if pending.paths.is_empty() {
            return Ok(0);
        }
        write_json_atomic(
            &self.layout.absolute(&self.layout.pending_path(name)),
            &pending,
        )?;
        Ok(pending.paths.len())
    }

    /// Mark the unit's pending paths dirty again and drop the pending file
    pub fn restore_pending(&self, name: &str) -> Result<usize> {
        let Some(pending) = self.pending(name)? else {
            return Ok(0);
        };
        for path in &pending.paths {
            self.changes.mark(path);
        }
        remove_file(&self.layout.absolute(&self.layout.pending_path(name)))?;
        Ok(pending.paths.len())
    }

    /// Every marker on disk, ordered by name
    pub fn list(&self) -> Result<Vec<ReplayMarker>> {
        let mut markers = Vec::new();
        for path in walk_documents(&self.layout.markers_dir())? {
            if let Some(marker) = read_json::<ReplayMarker>(&path)? {
                markers.push(marker);
            }
        }
        markers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(markers)
    }
}
