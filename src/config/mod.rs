//! Configuration module
//!
//! # Lookup order
//! 1. Explicit `--config` path
//! 2. `.nes/config.toml`, walking up from the working directory
//! 3. `~/.nes/config.toml`
//! 4. Built-in defaults
//!
//! The store root can additionally be overridden with `NES_DB_PATH`.
//!
//! Relative `[store].root` and `[migration].dir` in a config file resolve
//! against the project directory: the parent of `.nes/`, or the file's own
//! directory for a config stored elsewhere.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::search::{DEFAULT_FAN_OUT, DEFAULT_LIMIT, MAX_LIMIT};
use crate::migration::MAX_BATCH_SIZE;

pub const CONFIG_DIR: &str = ".nes";
pub const CONFIG_FILE: &str = "config.toml";
pub const DB_PATH_ENV: &str = "NES_DB_PATH";
pub const DEFAULT_STORE_ROOT: &str = "nes-db/v2";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub author: AuthorConfig,

    #[serde(default)]
    pub migration: MigrationConfig,

    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    /// Store root; relative paths resolve against the project directory
    #[serde(default)]
    pub root: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorConfig {
    /// Author id used for writes made from the command line
    #[serde(default = "default_author")]
    pub default: String,
}

impl Default for AuthorConfig {
    fn default() -> Self {
        Self {
            default: default_author(),
        }
    }
}

fn default_author() -> String {
    "author:human:cli-user".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationConfig {
    #[serde(default = "default_migrations_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Commit each batch with the system `git`
    #[serde(default)]
    pub commit: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            dir: default_migrations_dir(),
            max_batch_size: default_max_batch_size(),
            commit: false,
        }
    }
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_max_batch_size() -> usize {
    MAX_BATCH_SIZE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    #[serde(default = "default_max_limit")]
    pub max_limit: usize,

    /// Concurrent reads in a batch lookup
    #[serde(default = "default_fan_out")]
    pub fan_out: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            fan_out: default_fan_out(),
        }
    }
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

fn default_max_limit() -> usize {
    MAX_LIMIT
}

fn default_fan_out() -> usize {
    DEFAULT_FAN_OUT
}

impl Config {
    /// Load config from an explicit path or the default locations
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        let cwd = std::env::current_dir().context("Failed to read working directory")?;
        if let Some(local) = Self::find_local_config(&cwd) {
            return Self::load_from(&local);
        }

        if let Some(global) = Self::global_config_path() {
            if global.exists() {
                return Self::load_from(&global);
            }
        }

        Ok(Self::default())
    }

    /// Load config from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        if let Some(base) = project_dir(path) {
            config.resolve_relative_to(&base);
        }
        Ok(config)
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        if let Some(root) = self.store.root.as_mut() {
            if root.is_relative() {
                *root = base.join(&*root);
            }
        }
        if self.migration.dir.is_relative() {
            self.migration.dir = base.join(&self.migration.dir);
        }
    }

    /// Save config to a file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config {}", path.display()))?;
        Ok(())
    }

    /// Find `.nes/config.toml` walking up from `start`
    pub fn find_local_config(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
            .find(|path| path.exists())
    }

    /// `~/.nes/config.toml`
    pub fn global_config_path() -> Option<PathBuf> {
        directories::BaseDirs::new().map(|d| d.home_dir().join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Store root: `NES_DB_PATH`, then `[store].root`, then `nes-db/v2`
    pub fn store_root(&self) -> PathBuf {
        self.store_root_with(std::env::var_os(DB_PATH_ENV).map(PathBuf::from))
    }

    fn store_root_with(&self, env: Option<PathBuf>) -> PathBuf {
        env.filter(|p| !p.as_os_str().is_empty())
            .or_else(|| self.store.root.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_ROOT))
    }
}

/// Directory that relative paths in the config file at `path` refer to
fn project_dir(path: &Path) -> Option<PathBuf> {
    let dir = path.parent()?;
    let dir = if dir.file_name().map_or(false, |name| name == CONFIG_DIR) {
        dir.parent()?
    } else {
        dir
    };
    if dir.as_os_str().is_empty() {
        None
    } else {
        Some(dir.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.migration.max_batch_size, 1000);
        assert_eq!(config.search.default_limit, 20);
        assert_eq!(config.search.max_limit, 100);
        assert!(!config.migration.commit);
        assert_eq!(config.store_root_with(None), PathBuf::from("nes-db/v2"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[store]\nroot = \"/data/nes\"\n\n[migration]\ncommit = true\n")?;

        let config = Config::load(Some(&path))?;
        assert_eq!(config.store.root, Some(PathBuf::from("/data/nes")));
        assert!(config.migration.commit);
        assert_eq!(config.migration.dir, dir.path().join("migrations"));
        assert_eq!(config.author.default, "author:human:cli-user");
        Ok(())
    }

    #[test]
    fn test_relative_paths_follow_the_project_dir() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_DIR).join(CONFIG_FILE);
        std::fs::create_dir_all(path.parent().unwrap())?;
        std::fs::write(&path, "[store]\nroot = \"nes-db/v2\"\n")?;

        let config = Config::load_from(&path)?;
        assert_eq!(config.store.root, Some(dir.path().join("nes-db/v2")));
        assert_eq!(config.migration.dir, dir.path().join("migrations"));

        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested)?;
        assert_eq!(Config::find_local_config(&nested), Some(path.clone()));
        assert_eq!(Config::load_from(&path)?.store_root_with(None), dir.path().join("nes-db/v2"));
        Ok(())
    }

    #[test]
    fn test_store_root_precedence() {
        let mut config = Config::default();
        config.store.root = Some(PathBuf::from("from-config"));
        assert_eq!(config.store_root_with(None), PathBuf::from("from-config"));
        assert_eq!(
            config.store_root_with(Some(PathBuf::from("from-env"))),
            PathBuf::from("from-env")
        );
        assert_eq!(
            config.store_root_with(Some(PathBuf::new())),
            PathBuf::from("from-config")
        );
    }

    #[test]
    fn test_find_local_config_walks_up() -> Result<()> {
        let dir = tempdir()?;
        let config_path = dir.path().join(CONFIG_DIR).join(CONFIG_FILE);
        Config::default().save_to(&config_path)?;
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested)?;

        assert_eq!(Config::find_local_config(&nested), Some(config_path.clone()));
        assert_eq!(Config::load_from(&config_path)?, Config::default());
        Ok(())
    }
}
