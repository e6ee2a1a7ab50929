//! Published classification snapshots
//!
//! A snapshot is built once per reconciliation pass and never mutated.
//! Readers hold an `Arc<ClassificationSnapshot>` and always see one
//! consistent view of the managed directory.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::classify::{ClassifiedEntry, Classification};

/// Recoverable condition observed while producing a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineWarning {
    /// The library could not be indexed; the previous index stays in use
    IndexUnavailable { path: PathBuf, reason: String },
    /// The provenance store was unreadable and has been reset
    StoreReset { path: PathBuf, reason: String },
    /// Healed or pruned provenance could not be written back
    StorePersistFailed { reason: String },
    /// Change notifications were lost and a full rescan was forced
    WatchOverflow,
    /// Change notifications could not be set up for a root
    WatchUnavailable { path: PathBuf, reason: String },
    /// The managed directory could not be listed
    ManagedRootUnavailable { path: PathBuf, reason: String },
}

impl std::fmt::Display for EngineWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IndexUnavailable { path, reason } => {
                write!(f, "library {} could not be indexed: {reason}", path.display())
            }
            Self::StoreReset { path, reason } => {
                write!(f, "provenance store {} was reset: {reason}", path.display())
            }
            Self::StorePersistFailed { reason } => {
                write!(f, "provenance could not be saved: {reason}")
            }
            Self::WatchOverflow => f.write_str("change notifications overflowed, full rescan forced"),
            Self::WatchUnavailable { path, reason } => {
                write!(f, "cannot watch {}: {reason}", path.display())
            }
            Self::ManagedRootUnavailable { path, reason } => {
                write!(f, "managed directory {} is not available: {reason}", path.display())
            }
        }
    }
}

/// Immutable result of one reconciliation pass
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationSnapshot {
    /// Increases by one with every published snapshot
    pub generation: u64,
    pub managed_root: PathBuf,
    pub library_root: Option<PathBuf>,
    pub entries: Vec<ClassifiedEntry>,
    pub warnings: Vec<EngineWarning>,
    /// Number of library files in the index used for this pass
    pub index_size: usize,
    pub taken_at: DateTime<Utc>,
}

impl ClassificationSnapshot {
    /// Snapshot with no entries, published before the first pass completes
    pub fn empty(managed_root: PathBuf, library_root: Option<PathBuf>) -> Self {
        Self {
            generation: 0,
            managed_root,
            library_root,
            entries: Vec::new(),
            warnings: Vec::new(),
            index_size: 0,
            taken_at: Utc::now(),
        }
    }

    /// Look up an entry by exact name
    pub fn get(&self, name: &str) -> Option<&ClassifiedEntry> {
        self.entries.iter().find(|e| e.entry.name == name)
    }

    /// Classification of `name`, if present
    pub fn classification_of(&self, name: &str) -> Option<&Classification> {
        self.get(name).map(|e| &e.classification)
    }

    /// Entry names in presentation order
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.entry.name.as_str()).collect()
    }

    /// Counts of (linked, copied, foreign) entries
    pub fn counts(&self) -> (usize, usize, usize) {
        self.entries
            .iter()
            .fold((0, 0, 0), |(l, c, f), e| match e.classification {
                Classification::Linked { .. } => (l + 1, c, f),
                Classification::Copied { .. } => (l, c + 1, f),
                Classification::Foreign => (l, c, f + 1),
            })
    }

    /// Links whose target is gone
    pub fn broken_links(&self) -> impl Iterator<Item = &ClassifiedEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.classification, Classification::Linked { broken: true, .. }))
    }
}
