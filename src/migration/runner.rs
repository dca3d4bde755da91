//! Migration runner - applies pending units in order
//!
//! # Key Points
//! - `reconcile_all` runs once before any unit, repairing interrupted writes
//! - A unit is `pending` until its replay marker exists, then `applied`
//! - The first error aborts the run: no marker, no commit. Writes already made
//!   stay in the store and their paths are kept as pending for the unit
//! - A unit that later succeeds commits its pending paths with its own
//! - Touched paths of an applied unit go to the `CommitSink` in bounded batches

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context as _;
use serde::Serialize;
use tracing::{error, info, warn};

use super::batch::{plan_commits, CommitSink, MigrationStats};
use super::context::MigrationContext;
use super::marker::{MarkerStore, ReplayMarker};
use super::registry::{DataFiles, DiscoveredMigration, UnitBody};
use super::{CancellationFlag, MAX_BATCH_SIZE};
use crate::core::entity::EntityData;
use crate::core::publication::PublicationService;
use crate::core::relationship::RelationshipData;
use crate::core::search::SearchService;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitState {
    Pending,
    Applied,
}

/// Status line for one discovered unit
#[derive(Debug, Clone, Serialize)]
pub struct UnitStatus {
    pub name: String,
    pub description: String,
    pub state: UnitState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<ReplayMarker>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppliedUnit {
    pub name: String,
    pub stats: MigrationStats,
    pub batches: usize,
    pub files: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// Records repaired by reconciliation before the first unit
    pub repaired: usize,
    pub applied: Vec<AppliedUnit>,
    pub skipped: Vec<String>,
}

pub struct MigrationRunner {
    publication: Arc<PublicationService>,
    search: SearchService,
    markers: MarkerStore,
    units: Vec<DiscoveredMigration>,
    max_batch_size: usize,
    cancel: CancellationFlag,
}

impl MigrationRunner {
    /// `units` must already be ordered (as returned by `MigrationRegistry::discover`)
    pub fn new(publication: Arc<PublicationService>, units: Vec<DiscoveredMigration>) -> Self {
        let search = SearchService::new(publication.records().clone(), publication.versions().clone());
        let markers = MarkerStore::new(publication.layout().clone(), publication.changes().clone());
        Self {
            publication,
            search,
            markers,
            units,
            max_batch_size: MAX_BATCH_SIZE,
            cancel: CancellationFlag::new(),
        }
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size.max(1);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Query handle handed to units (limits and fan-out from config)
    pub fn with_search(mut self, search: SearchService) -> Self {
        self.search = search;
        self
    }

    pub fn units(&self) -> &[DiscoveredMigration] {
        &self.units
    }

    pub fn markers(&self) -> &MarkerStore {
        &self.markers
    }

    pub fn status(&self) -> Result<Vec<UnitStatus>> {
        let mut statuses = Vec::with_capacity(self.units.len());
        for unit in &self.units {
            let marker = self.markers.get(&unit.name)?;
            statuses.push(UnitStatus {
                name: unit.name.clone(),
                description: unit.metadata.description.clone(),
                state: if marker.is_some() {
                    UnitState::Applied
                } else {
                    UnitState::Pending
                },
                marker,
            });
        }
        Ok(statuses)
    }

    /// Units a run would apply, in order (dry run)
    pub fn plan(&self) -> Result<Vec<&DiscoveredMigration>> {
        let mut pending = Vec::new();
        for unit in &self.units {
            if !self.markers.is_applied(&unit.name)? {
                pending.push(unit);
            }
        }
        Ok(pending)
    }

    /// Apply every pending unit, handing commit batches to `sink`
    pub fn run(&self, sink: &mut dyn CommitSink) -> Result<RunReport> {
        let mut report = RunReport {
            repaired: self.publication.reconcile_all()?,
            ..RunReport::default()
        };
        if report.repaired > 0 {
            warn!(repaired = report.repaired, "repaired records before migrating");
        }

        for unit in &self.units {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if self.markers.is_applied(&unit.name)? {
                info!(migration = %unit.name, "already applied, skipping");
                report.skipped.push(unit.name.clone());
                continue;
            }
            report.applied.push(self.apply(unit, sink)?);
        }

        Ok(report)
    }

    fn apply(&self, unit: &DiscoveredMigration, sink: &mut dyn CommitSink) -> Result<AppliedUnit> {
        info!(migration = %unit.name, "applying");
        let started = Instant::now();

        let mut ctx = MigrationContext::new(
            &unit.metadata,
            &unit.dir,
            &self.publication,
            self.search.clone(),
            self.cancel.clone(),
        );
        let outcome = match &unit.body {
            UnitBody::Code(code) => code.run(&mut ctx),
            UnitBody::Declarative(files) => apply_data(files, &mut ctx),
        };
        let mut stats = ctx.into_stats();
        stats.duration = started.elapsed();

        if let Err(err) = outcome {
            let written = self.publication.changes().drain();
            let pending = self.markers.record_pending(&unit.name, written)?;
            if is_cancelled(&err) {
                warn!(migration = %unit.name, pending, "cancelled; no marker written");
                return Err(Error::Cancelled);
            }
            let cause = format!("{:#}", err);
            error!(migration = %unit.name, pending, error = %cause, "failed");
            return Err(Error::MigrationFailed {
                name: unit.name.clone(),
                cause,
            });
        }

        self.markers
            .write(&ReplayMarker::applied(&unit.name, &unit.metadata.author, &stats))?;
        let restored = self.markers.restore_pending(&unit.name)?;
        if restored > 0 {
            info!(migration = %unit.name, restored, "including writes from earlier failed attempts");
        }

        let paths = self.publication.changes().drain();
        let files = paths.len();
        let batches = plan_commits(paths, &unit.metadata, &stats, self.max_batch_size);
        for batch in &batches {
            sink.commit(batch).map_err(|e| Error::MigrationFailed {
                name: unit.name.clone(),
                cause: format!("commit batch {}/{} failed: {:#}", batch.index, batch.total, e),
            })?;
        }

        info!(
            migration = %unit.name,
            created = stats.created,
            updated = stats.updated,
            deleted = stats.deleted,
            files,
            batches = batches.len(),
            "applied"
        );
        Ok(AppliedUnit {
            name: unit.name.clone(),
            stats,
            batches: batches.len(),
            files,
        })
    }
}

/// Upsert every document listed by a declarative unit
fn apply_data(files: &DataFiles, ctx: &mut MigrationContext<'_>) -> anyhow::Result<()> {
    for file in &files.entities {
        let docs: Vec<EntityData> = ctx.read_json(file)?;
        ctx.log(format!("{}: {} entities", file, docs.len()));
        for data in docs {
            let slug = data.slug.clone();
            ctx.upsert_entity(data)
                .with_context(|| format!("{}: entity {}", file, slug))?;
        }
    }

    for file in &files.relationships {
        let docs: Vec<RelationshipData> = ctx.read_json(file)?;
        ctx.log(format!("{}: {} relationships", file, docs.len()));
        for (i, data) in docs.into_iter().enumerate() {
            ctx.upsert_relationship(data)
                .with_context(|| format!("{}: relationship #{}", file, i + 1))?;
        }
    }
    Ok(())
}

fn is_cancelled(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| matches!(cause.downcast_ref::<Error>(), Some(Error::Cancelled)))
}
