//! Commit batching - groups touched files into bounded commits
//!
//! The runner never talks to version control itself; it plans batches and
//! hands each one to a `CommitSink`.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::MigrationMetadata;

/// Counters collected while a unit runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationStats {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// One commit worth of changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitBatch {
    /// 1-based position of this batch
    pub index: usize,
    pub total: usize,
    /// Paths relative to the store root
    pub paths: Vec<PathBuf>,
    pub message: String,
}

/// Sort, deduplicate and chunk `paths` into batches of at most `max_batch_size`
///
/// Order is deterministic: the same input set always yields the same batches.
pub fn plan_commits(
    paths: impl IntoIterator<Item = PathBuf>,
    metadata: &MigrationMetadata,
    stats: &MigrationStats,
    max_batch_size: usize,
) -> Vec<CommitBatch> {
    let mut paths: Vec<PathBuf> = paths.into_iter().collect();
    paths.sort();
    paths.dedup();
    if paths.is_empty() {
        return Vec::new();
    }

    let max = max_batch_size.max(1);
    let chunks: Vec<&[PathBuf]> = paths.chunks(max).collect();
    let total = chunks.len();
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| CommitBatch {
            index: i + 1,
            total,
            paths: chunk.to_vec(),
            message: commit_message(metadata, stats, i + 1, total),
        })
        .collect()
}

/// Render the commit message for one batch
pub fn commit_message(
    metadata: &MigrationMetadata,
    stats: &MigrationStats,
    index: usize,
    total: usize,
) -> String {
    format!(
        "{}: {}\n\nAuthor: {}\nDate: {}\nCreated: {}\nUpdated: {}\nDeleted: {}\nDuration: {:.2}s\nBatch {}/{}",
        metadata.name,
        metadata.description,
        metadata.author,
        metadata.date,
        stats.created,
        stats.updated,
        stats.deleted,
        stats.duration.as_secs_f64(),
        index,
        total,
    )
}

/// Consumer of planned commit batches
pub trait CommitSink {
    fn commit(&mut self, batch: &CommitBatch) -> Result<()>;
}

/// Only logs the batches (dry runs, stores outside version control)
#[derive(Debug, Default)]
pub struct NoopSink {
    pub seen: Vec<CommitBatch>,
}

impl CommitSink for NoopSink {
    fn commit(&mut self, batch: &CommitBatch) -> Result<()> {
        info!(
            batch = batch.index,
            total = batch.total,
            files = batch.paths.len(),
            "commit skipped (no sink configured)"
        );
        self.seen.push(batch.clone());
        Ok(())
    }
}

/// Stages and commits each batch with the system `git`
pub struct GitCommitSink {
    work_dir: PathBuf,
}

impl GitCommitSink {
    /// `work_dir` is the store root; it must lie inside a git work tree
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }

    fn git_cmd(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(&self.work_dir);
        cmd.arg("-c").arg("core.quotePath=false");
        cmd
    }

    fn run(&self, mut cmd: Command, what: &str) -> Result<()> {
        let output = cmd
            .output()
            .with_context(|| format!("Failed to execute git {}", what))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("git {} failed in {}: {}", what, self.work_dir.display(), stderr.trim());
        }
        Ok(())
    }
}

impl CommitSink for GitCommitSink {
    fn commit(&mut self, batch: &CommitBatch) -> Result<()> {
        // --all stages deletions of listed paths too
        let mut add = self.git_cmd();
        add.args(["add", "--all", "--"]);
        add.args(batch.paths.iter().map(|p| p.as_path()));
        self.run(add, "add")?;

        // pathspec keeps anything else already staged out of the commit
        let mut commit = self.git_cmd();
        commit.args(["commit", "--quiet", "-m", &batch.message, "--"]);
        commit.args(batch.paths.iter().map(|p| p.as_path()));
        self.run(commit, "commit")?;

        info!(
            batch = batch.index,
            total = batch.total,
            files = batch.paths.len(),
            "committed batch"
        );
        Ok(())
    }
}
