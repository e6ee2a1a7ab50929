//! Engine configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use modlink_fs::ConfigStore;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::filter::EntryFilter;
use crate::paths::default_managed_root;
use crate::store::ImportMode;

/// Default debounce between a change notification and the pass it triggers
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Roots and behaviour of the engine
///
/// Every field has a default and unknown keys are ignored, so config files
/// written by other versions still load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Library tree; nothing is indexed until one is set
    pub library_root: Option<PathBuf>,
    /// The directory the game scans for mods
    pub managed_root: PathBuf,
    /// Mode used when an import does not ask for one
    pub default_mode: ImportMode,
    /// File extensions taking part in indexing and classification; empty
    /// means all files
    pub extensions: Vec<String>,
    pub debounce_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            library_root: None,
            managed_root: default_managed_root(),
            default_mode: ImportMode::default(),
            extensions: Vec::new(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

impl EngineConfig {
    /// Config with explicit roots and defaults for everything else
    pub fn with_roots(library_root: Option<PathBuf>, managed_root: impl Into<PathBuf>) -> Self {
        Self {
            library_root,
            managed_root: managed_root.into(),
            ..Self::default()
        }
    }

    /// Load from `path` (TOML or JSON by extension); defaults when absent.
    pub fn load(path: &Path) -> Result<Self> {
        Ok(ConfigStore::new().load_or_default(path)?)
    }

    /// Save atomically to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        ConfigStore::new().save(path, self)?;
        Ok(())
    }

    pub fn filter(&self) -> EntryFilter {
        EntryFilter::new(&self.extensions)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
