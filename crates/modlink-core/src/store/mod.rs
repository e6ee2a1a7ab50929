//! Durable provenance store
//!
//! Maps managed entry names to [`ProvenanceRecord`]s. The store is a single
//! JSON file; every mutation rewrites it through
//! [`modlink_fs::io::write_atomic`], so it is never observed half-written.
//! A missing or unparseable file loads as an empty store: losing provenance
//! only degrades classification, it never loses user files.

mod legacy;
mod record;

pub use record::{ImportMode, ProvenanceRecord};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Error, Result};

/// Current store schema version
pub const STORE_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    records: BTreeMap<String, ProvenanceRecord>,
}

/// Provenance records keyed by managed entry name
///
/// At most one record exists per name.
#[derive(Debug)]
pub struct MetadataStore {
    path: PathBuf,
    records: BTreeMap<String, ProvenanceRecord>,
    recovery: Option<String>,
}

impl MetadataStore {
    /// Load the store at `path`.
    ///
    /// Never fails: a missing file yields an empty store, a corrupt one
    /// yields an empty store and a recovery note (see [`Self::recovery`]).
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut store = Self {
            path,
            records: BTreeMap::new(),
            recovery: None,
        };

        if !store.path.exists() {
            debug!(path = %store.path.display(), "no provenance store yet");
            return store;
        }

        match Self::read(&store.path) {
            Ok(records) => {
                debug!(path = %store.path.display(), count = records.len(), "loaded provenance");
                store.records = records;
            }
            Err(e) => {
                warn!(path = %store.path.display(), error = %e, "provenance store unreadable, starting empty");
                store.recovery = Some(e.to_string());
            }
        }
        store
    }

    fn read(path: &Path) -> Result<BTreeMap<String, ProvenanceRecord>> {
        let corrupt = |message: String| Error::StoreCorrupt {
            path: path.to_path_buf(),
            message,
        };

        let bytes = modlink_fs::io::read_locked(path)?;
        let value: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|e| corrupt(e.to_string()))?;

        let is_document = value
            .as_object()
            .is_some_and(|obj| obj.get("records").is_some_and(|r| r.is_object()));

        let mut records = if is_document {
            let doc: StoreDocument =
                serde_json::from_value(value).map_err(|e| corrupt(e.to_string()))?;
            if doc.version > STORE_VERSION {
                debug!(version = doc.version, "store written by a newer schema");
            }
            doc.records
        } else if value.is_object() {
            legacy::parse_flat(value).map_err(|e| corrupt(e.to_string()))?
        } else {
            return Err(corrupt("expected a JSON object".to_string()));
        };

        // The map key is authoritative for the entry name
        for (name, record) in records.iter_mut() {
            if record.name != *name {
                record.name = name.clone();
            }
        }
        Ok(records)
    }

    fn save(&self) -> Result<()> {
        let doc = StoreDocument {
            version: STORE_VERSION,
            records: self.records.clone(),
        };
        let content = serde_json::to_vec_pretty(&doc)?;
        modlink_fs::io::write_atomic(&self.path, &content)?;
        Ok(())
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Why the last load fell back to an empty store, if it did
    pub fn recovery(&self) -> Option<&str> {
        self.recovery.as_deref()
    }

    /// Take the recovery note, so it is reported only once
    pub fn take_recovery(&mut self) -> Option<String> {
        self.recovery.take()
    }

    pub fn get(&self, name: &str) -> Option<&ProvenanceRecord> {
        self.records.get(name)
    }

    /// All records
    pub fn list(&self) -> &BTreeMap<String, ProvenanceRecord> {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Insert or overwrite the record for `record.name` and persist.
    pub fn put(&mut self, record: ProvenanceRecord) -> Result<()> {
        self.records.insert(record.name.clone(), record);
        self.save()
    }

    /// Remove the record for `name` and persist if it existed.
    pub fn remove(&mut self, name: &str) -> Result<Option<ProvenanceRecord>> {
        let removed = self.records.remove(name);
        if removed.is_some() {
            self.save()?;
        }
        Ok(removed)
    }

    /// Apply several puts and removals with a single write.
    ///
    /// Returns whether anything changed.
    pub fn apply(&mut self, puts: Vec<ProvenanceRecord>, removals: &[String]) -> Result<bool> {
        let mut changed = false;
        for name in removals {
            changed |= self.records.remove(name).is_some();
        }
        for record in puts {
            let unchanged = self
                .records
                .get(&record.name)
                .is_some_and(|existing| existing == &record);
            if !unchanged {
                self.records.insert(record.name.clone(), record);
                changed = true;
            }
        }
        if changed {
            self.save()?;
        }
        Ok(changed)
    }
}
