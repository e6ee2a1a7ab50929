//! Provenance records for managed entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How a library file was mirrored into the managed directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// A filesystem link pointing back into the library
    #[default]
    #[serde(alias = "symlink")]
    Linked,
    /// An independent byte-for-byte copy
    #[serde(alias = "copy")]
    Copied,
}

impl ImportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linked => "linked",
            Self::Copied => "copied",
        }
    }
}

impl std::fmt::Display for ImportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ImportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linked" | "link" | "symlink" => Ok(Self::Linked),
            "copied" | "copy" => Ok(Self::Copied),
            other => Err(format!("unknown import mode '{other}' (expected linked or copied)")),
        }
    }
}

/// Where a managed entry came from
///
/// Missing fields default so that records written by a newer schema (or an
/// older one) still load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    /// Entry name in the managed directory
    #[serde(default)]
    pub name: String,
    /// Library path the entry was imported from
    #[serde(default)]
    pub source: PathBuf,
    /// Content fingerprint at import time
    #[serde(default)]
    pub fingerprint: String,
    /// Import mode
    #[serde(default)]
    pub mode: ImportMode,
    /// When the import (or last refresh) happened
    #[serde(default = "Utc::now")]
    pub imported_at: DateTime<Utc>,
}

impl ProvenanceRecord {
    /// Create a record stamped with the current time
    pub fn new(
        name: impl Into<String>,
        source: impl Into<PathBuf>,
        fingerprint: impl Into<String>,
        mode: ImportMode,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            fingerprint: fingerprint.into(),
            mode,
            imported_at: Utc::now(),
        }
    }

    /// Same provenance with a fresh timestamp
    pub fn refreshed(&self) -> Self {
        Self {
            imported_at: Utc::now(),
            ..self.clone()
        }
    }

    /// Whether two records describe the same provenance, ignoring timestamps
    pub fn same_origin(&self, other: &ProvenanceRecord) -> bool {
        self.name == other.name
            && self.source == other.source
            && self.fingerprint == other.fingerprint
            && self.mode == other.mode
    }
}
