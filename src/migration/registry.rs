//! Migration registry - explicit registration plus directory discovery
//!
//! Code units are registered by folder name before discovery; there is no
//! global registration. Discovery scans the migrations directory, reads each
//! unit's `migration.toml` and orders units by numeric prefix. A manifest
//! without `author` takes the registry's default author (`[author].default`
//! from config in the CLI).

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, warn};

use super::context::MigrationContext;
use super::MigrationMetadata;

pub const MANIFEST_FILE: &str = "migration.toml";

/// Custom migration logic
pub trait MigrationUnit: Send + Sync {
    /// Drive the publication core through `ctx`; any error aborts the unit
    fn run(&self, ctx: &mut MigrationContext<'_>) -> Result<()>;
}

/// Data files of a declarative unit, relative to its folder
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DataFiles {
    /// JSON arrays of entity documents
    #[serde(default)]
    pub entities: Vec<String>,

    /// JSON arrays of relationship documents
    #[serde(default)]
    pub relationships: Vec<String>,
}

impl DataFiles {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relationships.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct Manifest {
    metadata: MigrationMetadata,
    #[serde(default)]
    data: DataFiles,
}

/// What a unit executes
#[derive(Clone)]
pub enum UnitBody {
    Code(Arc<dyn MigrationUnit>),
    Declarative(DataFiles),
}

impl fmt::Debug for UnitBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitBody::Code(_) => write!(f, "Code(..)"),
            UnitBody::Declarative(files) => f.debug_tuple("Declarative").field(files).finish(),
        }
    }
}

/// A unit found on disk, ready to run
#[derive(Debug, Clone)]
pub struct DiscoveredMigration {
    pub number: u32,
    pub name: String,
    pub dir: PathBuf,
    pub metadata: MigrationMetadata,
    pub body: UnitBody,
}

#[derive(Default)]
pub struct MigrationRegistry {
    units: BTreeMap<String, Arc<dyn MigrationUnit>>,
    default_author: Option<String>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Author for manifests that do not name one
    pub fn with_default_author(mut self, author: impl Into<String>) -> Self {
        self.default_author = Some(author.into());
        self
    }

    /// Register code for the unit folder `name` (e.g. `002-import-projects`)
    pub fn register(&mut self, name: impl Into<String>, unit: impl MigrationUnit + 'static) -> &mut Self {
        self.units.insert(name.into(), Arc::new(unit));
        self
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Scan `dir` for `NNN-name/` folders and order them by prefix
    ///
    /// A missing directory yields no units.
    pub fn discover(&self, dir: &Path) -> Result<Vec<DiscoveredMigration>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(dir = %dir.display(), "no migrations directory");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", dir.display()))
            }
        };

        let mut found = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| format!("Failed to read {}", dir.display()))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                continue;
            };
            let Some(number) = parse_prefix(&name) else {
                debug!(folder = %name, "ignoring folder without numeric prefix");
                continue;
            };
            found.push(self.load_unit(number, name, path)?);
        }

        found.sort_by(|a, b| a.number.cmp(&b.number).then_with(|| a.name.cmp(&b.name)));

        let mut seen = HashSet::new();
        for unit in &found {
            if !seen.insert(unit.number) {
                bail!("Duplicate migration prefix {:03} ({})", unit.number, unit.name);
            }
        }

        let names: HashSet<&str> = found.iter().map(|u| u.name.as_str()).collect();
        for registered in self.units.keys() {
            if !names.contains(registered.as_str()) {
                warn!(unit = %registered, "registered migration has no folder");
            }
        }

        Ok(found)
    }

    fn load_unit(&self, number: u32, name: String, dir: PathBuf) -> Result<DiscoveredMigration> {
        let manifest_path = dir.join(MANIFEST_FILE);
        let text = fs::read_to_string(&manifest_path)
            .with_context(|| format!("Failed to read {}", manifest_path.display()))?;
        let manifest: Manifest = toml::from_str(&text)
            .with_context(|| format!("Invalid {}", manifest_path.display()))?;

        let mut metadata = manifest.metadata;
        metadata.name = name.clone();
        if metadata.author.trim().is_empty() {
            match &self.default_author {
                Some(author) => metadata.author = author.clone(),
                None => bail!("Migration {} has no author and no default author is set", name),
            }
        }

        let body = match self.units.get(&name) {
            Some(unit) => {
                if !manifest.data.is_empty() {
                    bail!("Migration {} has both registered code and [data] files", name);
                }
                UnitBody::Code(unit.clone())
            }
            None if manifest.data.is_empty() => {
                bail!("Migration {} has no [data] files and no registered code", name)
            }
            None => UnitBody::Declarative(manifest.data),
        };

        Ok(DiscoveredMigration {
            number,
            name,
            dir,
            metadata,
            body,
        })
    }
}

/// Numeric prefix of `NNN-name`
pub fn parse_prefix(name: &str) -> Option<u32> {
    let (digits, rest) = name.split_once('-')?;
    if digits.is_empty() || rest.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
