//! Version store - append-only snapshot log per record
//!
//! # Key Points
//! - Version numbers are `previous_max + 1`, computed and written under a
//!   per-record lock so two writers never produce the same number
//! - Appends to different records proceed in parallel
//! - An existing version document is never overwritten

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use super::changes::ChangeTracker;
use super::fsio::{read_json, walk_documents, write_json_atomic, DOC_EXT};
use super::identifiers::RecordKind;
use super::layout::{StoreLayout, VERSIONS_DIR};
use super::version::{Attribution, Version};
use crate::error::{Error, Result};

pub struct VersionStore {
    layout: StoreLayout,
    changes: Arc<ChangeTracker>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl VersionStore {
    pub fn new(layout: StoreLayout, changes: Arc<ChangeTracker>) -> Self {
        Self {
            layout,
            changes,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Append a snapshot and return its version number
    pub(crate) fn append(
        &self,
        record_id: &str,
        snapshot: Option<Value>,
        author: &str,
        change_description: Option<String>,
    ) -> Result<u64> {
        let version = self.append_with(record_id, author, change_description, None, |_, _| {
            Ok(snapshot)
        })?;
        Ok(version.version_number)
    }

    /// Append a version whose snapshot depends on its own number
    ///
    /// `build` runs while the record's lock is held and receives the new
    /// version number and timestamp, so a record can embed its own version
    /// summary. If `build` fails nothing is written.
    pub(crate) fn append_with<F>(
        &self,
        record_id: &str,
        author: &str,
        change_description: Option<String>,
        attribution: Option<Attribution>,
        build: F,
    ) -> Result<Version>
    where
        F: FnOnce(u64, DateTime<Utc>) -> Result<Option<Value>>,
    {
        RecordKind::of(record_id)?;
        let lock = self.lock_for(record_id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let number = self.latest_number(record_id)? + 1;
        let relative = self.layout.version_path(record_id, number)?;
        let path = self.layout.absolute(&relative);
        if path.exists() {
            return Err(Error::io(
                &path,
                std::io::Error::new(IoErrorKind::AlreadyExists, "version already written"),
            ));
        }

        let created_at = Utc::now();
        let snapshot = build(number, created_at)?;
        let version = Version::new(
            record_id,
            number,
            author,
            created_at,
            change_description,
            snapshot,
        )
        .with_attribution(attribution);

        write_json_atomic(&path, &version)?;
        self.changes.mark(&relative);
        debug!(record_id, version = number, "version appended");
        Ok(version)
    }

    /// Highest version number of a record (0 when it has none)
    pub fn latest_number(&self, record_id: &str) -> Result<u64> {
        Ok(self.version_numbers(record_id)?.last().copied().unwrap_or(0))
    }

    pub fn latest(&self, record_id: &str) -> Result<Option<Version>> {
        match self.latest_number(record_id)? {
            0 => Ok(None),
            n => self.get_version(record_id, n).map(Some),
        }
    }

    /// Fetch one version or fail with `NotFound`
    pub fn get_version(&self, record_id: &str, version_number: u64) -> Result<Version> {
        let path = self
            .layout
            .absolute(&self.layout.version_path(record_id, version_number)?);
        read_json(&path)?.ok_or_else(|| {
            Error::not_found(super::identifiers::build_version_id(record_id, version_number))
        })
    }

    /// All versions of a record, newest first
    pub fn list_versions(&self, record_id: &str) -> Result<Vec<Version>> {
        self.version_numbers(record_id)?
            .into_iter()
            .rev()
            .map(|n| self.get_version(record_id, n))
            .collect()
    }

    /// Version numbers present on disk, ascending
    pub fn version_numbers(&self, record_id: &str) -> Result<Vec<u64>> {
        let dir = self.layout.absolute(&self.layout.versions_dir(record_id)?);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(&dir, e)),
        };

        let mut numbers = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| Error::io(&dir, e))?.path();
            if path.extension().map_or(true, |ext| ext != DOC_EXT) {
                continue;
            }
            if let Some(n) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u64>().ok())
            {
                numbers.push(n);
            }
        }
        numbers.sort_unstable();
        Ok(numbers)
    }

    /// Ids of every record with at least one version, sorted
    pub fn record_ids(&self) -> Result<Vec<String>> {
        let docs = walk_documents(&self.layout.root().join(VERSIONS_DIR))?;
        let mut ids = Vec::new();
        let mut last_dir: Option<PathBuf> = None;
        for path in &docs {
            let dir = path.parent().map(|d| d.to_path_buf());
            if dir == last_dir {
                continue;
            }
            if let Some(version) = read_json::<Version>(path)? {
                ids.push(version.record_id);
            }
            last_dir = dir;
        }
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    fn lock_for(&self, record_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(record_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;
    use std::thread;
    use tempfile::tempdir;

    const RAM: &str = "entity:person/ram-example";

    fn store(root: &std::path::Path) -> VersionStore {
        VersionStore::new(StoreLayout::new(root), Arc::new(ChangeTracker::new()))
    }

    #[test]
    fn test_append_is_monotonic() -> Result<()> {
        let dir = tempdir().unwrap();
        let store = store(dir.path());

        assert_eq!(store.append(RAM, Some(json!({"v": 1})), "author:system:test", None)?, 1);
        assert_eq!(store.append(RAM, Some(json!({"v": 2})), "author:system:test", None)?, 2);
        assert_eq!(store.append(RAM, None, "author:system:test", Some("deleted".into()))?, 3);

        let history = store.list_versions(RAM)?;
        let numbers: Vec<u64> = history.iter().map(|v| v.version_number).collect();
        assert_eq!(numbers, vec![3, 2, 1]);
        assert!(history[0].is_tombstone());
        assert_eq!(history[2].snapshot, Some(json!({"v": 1})));
        Ok(())
    }

    #[test]
    fn test_get_missing_version() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let err = store.get_version(RAM, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(store.latest(RAM).unwrap().is_none());
    }

    #[test]
    fn test_failed_build_writes_nothing() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let err = store
            .append_with(RAM, "author:system:test", None, None, |_, _| Err(Error::Cancelled))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(store.latest_number(RAM).unwrap(), 0);
        assert!(store.changes.is_empty());
    }

    #[test]
    fn test_build_sees_its_number() -> Result<()> {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        store.append(RAM, Some(json!({})), "author:system:test", None)?;
        let v = store.append_with(RAM, "author:system:test", None, None, |n, _| {
            Ok(Some(json!({ "version": n })))
        })?;
        assert_eq!(v.snapshot, Some(json!({"version": 2})));
        Ok(())
    }

    #[test]
    fn test_concurrent_appends_never_collide() {
        let dir = tempdir().unwrap();
        let store = Arc::new(store(dir.path()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                thread::spawn(move || {
                    store
                        .append(RAM, Some(json!({ "writer": i })), "author:system:test", None)
                        .unwrap()
                })
            })
            .collect();
        let mut got: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        got.sort_unstable();
        assert_eq!(got, (1..=8).collect::<Vec<u64>>());
        assert_eq!(store.version_numbers(RAM).unwrap(), (1..=8).collect::<Vec<u64>>());
    }

    #[test]
    fn test_record_ids() -> Result<()> {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        store.append(RAM, Some(json!({})), "author:system:test", None)?;
        store.append(RAM, Some(json!({})), "author:system:test", None)?;
        store.append("entity:organization/political_party/nepali-congress", Some(json!({})), "author:system:test", None)?;
        assert_eq!(
            store.record_ids()?,
            vec![
                "entity:organization/political_party/nepali-congress".to_string(),
                RAM.to_string()
            ]
        );
        Ok(())
    }
}
