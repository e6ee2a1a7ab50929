//! Removing entries from the managed directory
//!
//! Only the managed entry itself is deleted. Links are unlinked, never
//! followed, so the library original is untouched.

use std::fs;
use std::io;
use std::path::{Component, Path};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::FingerprintCache;
use crate::error::RemovalFailure;
use crate::snapshot::EngineWarning;
use crate::store::MetadataStore;
use crate::{Error, Result};

/// What a removal did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalAction {
    Removed,
    /// No such entry; any leftover record was still dropped
    NotFound,
}

/// Result for one name of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalOutcome {
    pub name: String,
    pub result: std::result::Result<RemovalAction, RemovalFailure>,
}

/// Outcomes of a batch, in input order
#[derive(Debug, Clone, Default)]
pub struct RemovalReport {
    pub outcomes: Vec<RemovalOutcome>,
    pub warnings: Vec<EngineWarning>,
}

impl RemovalReport {
    pub fn removed(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| o.result == Ok(RemovalAction::Removed))
            .map(|o| o.name.as_str())
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &RemovalFailure)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.name.as_str(), e)))
    }
}

/// Deletes managed entries and their provenance
#[derive(Debug, Clone)]
pub struct RemovalEngine {
    cache: Arc<FingerprintCache>,
}

impl RemovalEngine {
    pub fn new(cache: Arc<FingerprintCache>) -> Self {
        Self { cache }
    }

    /// Remove each named entry from `managed_root`.
    ///
    /// The provenance record is dropped whatever happened on disk, except
    /// when the delete was refused for lack of permission: then the entry is
    /// still there and so is its record.
    ///
    /// # Errors
    ///
    /// [`Error::ManagedRootUnavailable`] if `managed_root` is not a directory.
    pub fn remove(
        &self,
        names: &[String],
        managed_root: &Path,
        store: &mut MetadataStore,
    ) -> Result<RemovalReport> {
        if !managed_root.is_dir() {
            return Err(Error::ManagedRootUnavailable {
                path: managed_root.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }

        let mut report = RemovalReport::default();
        for name in names {
            let result = remove_entry(name, managed_root);
            match &result {
                Ok(RemovalAction::Removed) => {
                    self.cache.invalidate(&managed_root.join(name));
                    info!(name = %name, "removed");
                }
                Ok(RemovalAction::NotFound) => debug!(name = %name, "nothing to remove"),
                Err(failure) => warn!(name = %name, error = %failure, "removal failed"),
            }

            let keep_record = matches!(result, Err(RemovalFailure::PermissionDenied { .. }));
            if !keep_record && let Err(e) = store.remove(name) {
                warn!(name = %name, error = %e, "failed to drop provenance");
                report.warnings.push(EngineWarning::StorePersistFailed {
                    reason: e.to_string(),
                });
            }

            report.outcomes.push(RemovalOutcome {
                name: name.clone(),
                result,
            });
        }
        Ok(report)
    }
}

/// Whether `name` is a single plain path component.
pub fn is_plain_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}

fn remove_entry(name: &str, managed_root: &Path) -> std::result::Result<RemovalAction, RemovalFailure> {
    if !is_plain_name(name) {
        return Err(RemovalFailure::InvalidName {
            name: name.to_string(),
        });
    }

    let path = managed_root.join(name);
    let meta = match fs::symlink_metadata(&path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(RemovalAction::NotFound),
        Err(e) => return Err(failure(name, e)),
    };
    if meta.is_dir() {
        return Err(RemovalFailure::NotAnEntry {
            name: name.to_string(),
        });
    }

    // remove_file unlinks a link without touching its target
    match fs::remove_file(&path) {
        Ok(()) => Ok(RemovalAction::Removed),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(RemovalAction::NotFound),
        Err(e) => Err(failure(name, e)),
    }
}

fn failure(name: &str, e: io::Error) -> RemovalFailure {
    if e.kind() == io::ErrorKind::PermissionDenied {
        RemovalFailure::PermissionDenied {
            name: name.to_string(),
        }
    } else {
        RemovalFailure::Io {
            name: name.to_string(),
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ImportMode, ProvenanceRecord};
    use rstest::rstest;

    fn remover() -> RemovalEngine {
        RemovalEngine::new(Arc::new(FingerprintCache::new()))
    }

    #[rstest]
    #[case("MAP01.wad", true)]
    #[case(".hidden", true)]
    #[case("", false)]
    #[case(".", false)]
    #[case("..", false)]
    #[case("../escape.wad", false)]
    #[case("sub/file.wad", false)]
    #[case("sub\\file.wad", false)]
    #[case("/etc/passwd", false)]
    fn plain_names(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_plain_name(name), expected);
    }

    #[test]
    fn missing_entry_is_not_found_and_drops_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MetadataStore::load(dir.path().join("provenance.json"));
        store
            .put(ProvenanceRecord::new("GONE.wad", "/lib/GONE.wad", "sha256:00", ImportMode::Copied))
            .unwrap();

        let report = remover()
            .remove(&["GONE.wad".to_string()], dir.path(), &mut store)
            .unwrap();

        assert_eq!(report.outcomes[0].result, Ok(RemovalAction::NotFound));
        assert!(store.get("GONE.wad").is_none());
    }

    #[test]
    fn directories_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("subdir")).unwrap();
        let mut store = MetadataStore::load(dir.path().join("provenance.json"));

        let report = remover()
            .remove(&["subdir".to_string()], dir.path(), &mut store)
            .unwrap();

        assert!(matches!(report.outcomes[0].result, Err(RemovalFailure::NotAnEntry { .. })));
        assert!(dir.path().join("subdir").is_dir());
    }

    #[test]
    fn escaping_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let managed = dir.path().join("managed");
        fs::create_dir(&managed).unwrap();
        fs::write(dir.path().join("outside.wad"), b"keep").unwrap();
        let mut store = MetadataStore::load(dir.path().join("provenance.json"));

        let report = remover()
            .remove(&["../outside.wad".to_string()], &managed, &mut store)
            .unwrap();

        assert!(matches!(report.outcomes[0].result, Err(RemovalFailure::InvalidName { .. })));
        assert!(dir.path().join("outside.wad").exists());
    }

    #[test]
    fn removed_entry_leaves_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let managed = dir.path().join("managed");
        fs::create_dir(&managed).unwrap();
        fs::write(managed.join("MAP01.wad"), b"map").unwrap();
        let mut store = MetadataStore::load(dir.path().join("provenance.json"));
        let cache = Arc::new(FingerprintCache::new());
        let remover = RemovalEngine::new(Arc::clone(&cache));
        cache.fingerprint(&managed.join("MAP01.wad")).unwrap();

        let report = remover
            .remove(&["MAP01.wad".to_string()], &managed, &mut store)
            .unwrap();

        assert_eq!(report.outcomes[0].result, Ok(RemovalAction::Removed));
        assert!(cache.is_empty());
    }
}
