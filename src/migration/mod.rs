//! Migrations - ordered, replayable batches of publication calls
//!
//! # Layout
//! ```text
//! migrations/
//!   001-seed-parties/
//!     migration.toml      # [metadata] + optional [data] file lists
//!     parties.json
//!   002-import-projects/
//!     migration.toml
//!     projects.csv        # read by a code unit registered as "002-import-projects"
//! ```
//!
//! # Key Points
//! - Units run in ascending numeric-prefix order
//! - A replay marker is written only after a unit succeeds; marked units are skipped
//! - Skipping is per unit. Code units that may be re-run after a partial failure
//!   must guard their own writes (e.g. skip entities that already exist)
//! - Touched files are handed to a `CommitSink` in bounded batches

pub mod batch;
pub mod context;
pub mod dedup;
pub mod marker;
pub mod registry;
pub mod runner;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use batch::{plan_commits, CommitBatch, CommitSink, GitCommitSink, MigrationStats, NoopSink};
pub use context::MigrationContext;
pub use marker::{MarkerStatus, MarkerStore, PendingChanges, ReplayMarker};
pub use registry::{DiscoveredMigration, MigrationRegistry, MigrationUnit, UnitBody};
pub use runner::{AppliedUnit, MigrationRunner, RunReport, UnitState, UnitStatus};

/// Default number of files per commit batch
pub const MAX_BATCH_SIZE: usize = 1000;

/// Descriptive metadata of a migration unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationMetadata {
    /// Folder name, e.g. `001-seed-parties` (filled in at discovery)
    #[serde(default)]
    pub name: String,

    /// Author id used for every write of the unit; the registry's default
    /// author fills it in when the manifest leaves it out
    #[serde(default)]
    pub author: String,

    /// Authoring date (free-form, usually YYYY-MM-DD)
    pub date: String,

    pub description: String,

    /// Recorded on every version the unit writes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_description: Option<String>,
}

/// Shared cancellation flag checked between record-level operations
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
