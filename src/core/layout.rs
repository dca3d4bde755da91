//! Store layout - where every document lives under the store root
//!
//! ```text
//! <root>/
//!   entities/<type>/[<sub_type>/]<slug>.json
//!   relationships/<hash>.json
//!   versions/entities/<type>/[<sub_type>/]<slug>/<n>.json
//!   versions/relationships/<hash>/<n>.json
//!   authors/<system|human>/<slug>.json
//!   migration-markers/<name>.json
//!   migration-pending/<name>.json
//! ```
//!
//! All paths handed to the change tracker are relative to the root so they can
//! be staged directly in a version-control checkout.

use std::path::{Path, PathBuf};

use super::fsio::DOC_EXT;
use super::identifiers::{AuthorId, EntityId, RecordKind, RELATIONSHIP_PREFIX};
use crate::error::{Error, Result};

pub const ENTITIES_DIR: &str = "entities";
pub const RELATIONSHIPS_DIR: &str = "relationships";
pub const VERSIONS_DIR: &str = "versions";
pub const AUTHORS_DIR: &str = "authors";
pub const MARKERS_DIR: &str = "migration-markers";
pub const PENDING_DIR: &str = "migration-pending";

/// Path mapping for one store root
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn absolute(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }

    pub fn entities_dir(&self) -> PathBuf {
        self.root.join(ENTITIES_DIR)
    }

    pub fn relationships_dir(&self) -> PathBuf {
        self.root.join(RELATIONSHIPS_DIR)
    }

    pub fn markers_dir(&self) -> PathBuf {
        self.root.join(MARKERS_DIR)
    }

    /// Relative path of a record's current-state document
    pub fn record_path(&self, id: &str) -> Result<PathBuf> {
        Ok(record_stem(id)?.with_extension(DOC_EXT))
    }

    /// Relative directory holding a record's versions
    pub fn versions_dir(&self, id: &str) -> Result<PathBuf> {
        Ok(Path::new(VERSIONS_DIR).join(record_stem(id)?))
    }

    pub fn version_path(&self, id: &str, version_number: u64) -> Result<PathBuf> {
        Ok(self
            .versions_dir(id)?
            .join(format!("{}.{}", version_number, DOC_EXT)))
    }

    pub fn author_path(&self, author: &AuthorId) -> PathBuf {
        Path::new(AUTHORS_DIR)
            .join(author.kind.as_str())
            .join(format!("{}.{}", author.slug, DOC_EXT))
    }

    pub fn marker_path(&self, name: &str) -> PathBuf {
        Path::new(MARKERS_DIR).join(format!("{}.{}", name, DOC_EXT))
    }

    /// Uncommitted paths left behind by a failed unit
    pub fn pending_path(&self, name: &str) -> PathBuf {
        Path::new(PENDING_DIR).join(format!("{}.{}", name, DOC_EXT))
    }
}

/// Record path without extension, e.g. `entities/person/ram-example`
fn record_stem(id: &str) -> Result<PathBuf> {
    match RecordKind::of(id)? {
        RecordKind::Entity => {
            let parsed = EntityId::parse(id)?;
            let mut path = Path::new(ENTITIES_DIR).join(parsed.entity_type.as_str());
            if let Some(sub) = parsed.sub_type {
                path.push(sub.as_str());
            }
            path.push(&parsed.slug);
            Ok(path)
        }
        RecordKind::Relationship => {
            let hash = id
                .strip_prefix(RELATIONSHIP_PREFIX)
                .ok_or_else(|| Error::malformed(id, "missing relationship prefix"))?;
            Ok(Path::new(RELATIONSHIPS_DIR).join(hash))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_paths() {
        let layout = StoreLayout::new("/db");
        assert_eq!(
            layout.record_path("entity:person/ram-example").unwrap(),
            PathBuf::from("entities/person/ram-example.json")
        );
        assert_eq!(
            layout
                .record_path("entity:organization/political_party/nepali-congress")
                .unwrap(),
            PathBuf::from("entities/organization/political_party/nepali-congress.json")
        );
        assert_eq!(
            layout.version_path("entity:person/ram-example", 3).unwrap(),
            PathBuf::from("versions/entities/person/ram-example/3.json")
        );
    }

    #[test]
    fn test_relationship_paths() {
        let layout = StoreLayout::new("/db");
        let id = "relationship:0123456789abcdef0123456789abcdef";
        assert_eq!(
            layout.record_path(id).unwrap(),
            PathBuf::from("relationships/0123456789abcdef0123456789abcdef.json")
        );
        assert_eq!(
            layout.versions_dir(id).unwrap(),
            PathBuf::from("versions/relationships/0123456789abcdef0123456789abcdef")
        );
    }

    #[test]
    fn test_author_and_marker_paths() {
        let layout = StoreLayout::new("/db");
        let author = AuthorId::parse("author:system:csv-importer").unwrap();
        assert_eq!(
            layout.author_path(&author),
            PathBuf::from("authors/system/csv-importer.json")
        );
        assert_eq!(
            layout.marker_path("001-seed-parties"),
            PathBuf::from("migration-markers/001-seed-parties.json")
        );
        assert_eq!(
            layout.pending_path("001-seed-parties"),
            PathBuf::from("migration-pending/001-seed-parties.json")
        );
    }

    #[test]
    fn test_rejects_bad_ids() {
        let layout = StoreLayout::new("/db");
        assert!(layout.record_path("version:entity:person/x:1").is_err());
        assert!(layout.record_path("relationship:../../etc").is_err());
    }
}
