//! Change tracker - relative paths of documents touched since the last drain
//!
//! Stores mark every path they write or delete. The migration runner drains
//! the set after a unit and hands it to the commit batching collaborator.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct ChangeTracker {
    dirty: Mutex<BTreeSet<PathBuf>>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self, relative: &Path) {
        let mut dirty = self.dirty.lock().unwrap_or_else(|e| e.into_inner());
        dirty.insert(relative.to_path_buf());
    }

    pub fn len(&self) -> usize {
        self.dirty.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted copy of the dirty set
    pub fn snapshot(&self) -> Vec<PathBuf> {
        let dirty = self.dirty.lock().unwrap_or_else(|e| e.into_inner());
        dirty.iter().cloned().collect()
    }

    /// Take and clear the dirty set (sorted)
    pub fn drain(&self) -> Vec<PathBuf> {
        let mut dirty = self.dirty.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *dirty).into_iter().collect()
    }
}
