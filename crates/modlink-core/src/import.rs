//! Importing library files into the managed directory
//!
//! Each source is handled independently; a failure is recorded in that
//! file's [`ImportOutcome`] and the batch moves on. Destination selection
//! inspects the managed directory live, so callers must hold the exclusion
//! region (the `&mut MetadataStore` borrow) for the whole batch.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use modlink_fs::link;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::FingerprintCache;
use crate::error::ImportFailure;
use crate::snapshot::EngineWarning;
use crate::store::{ImportMode, MetadataStore, ProvenanceRecord};
use crate::{Error, Result};

/// Upper bound on collision suffixes tried before giving up
const MAX_SUFFIX: u32 = 10_000;

/// What an import did on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportAction {
    /// A new entry was created under the source's own name
    Created,
    /// The entry already matched; only the record was refreshed
    Refreshed,
    /// An entry with the same content was replaced (mode switch or relink)
    Replaced,
    /// The name was taken by other content; a suffixed name was used
    Renamed,
}

/// A successful import
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSuccess {
    /// Entry name in the managed directory
    pub name: String,
    pub path: PathBuf,
    pub mode: ImportMode,
    pub action: ImportAction,
    pub fingerprint: String,
}

/// Result for one source of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    pub source: PathBuf,
    pub result: std::result::Result<ImportSuccess, ImportFailure>,
}

impl ImportOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcomes of a batch, in input order
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub outcomes: Vec<ImportOutcome>,
    pub warnings: Vec<EngineWarning>,
}

impl ImportReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &ImportSuccess> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = (&Path, &ImportFailure)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.source.as_path(), e)))
    }
}

/// State of a candidate destination name
#[derive(Debug)]
enum Occupant {
    Absent,
    /// Holds the source's content; `link_target` is set for links
    SameContent { link_target: Option<PathBuf> },
    /// A link whose target no longer exists
    Dangling,
    /// Anything else: other content, a directory, an unreadable file
    Other,
}

/// Creates links or copies in the managed directory
#[derive(Debug, Clone)]
pub struct ImportEngine {
    cache: Arc<FingerprintCache>,
}

impl ImportEngine {
    pub fn new(cache: Arc<FingerprintCache>) -> Self {
        Self { cache }
    }

    /// Import every source into `managed_root` using `mode`.
    ///
    /// # Errors
    ///
    /// Only [`Error::ManagedRootUnavailable`], when the managed directory
    /// does not exist or is not a directory. Everything else is reported per
    /// file in the returned [`ImportReport`].
    pub fn import_entries(
        &self,
        sources: &[PathBuf],
        mode: ImportMode,
        managed_root: &Path,
        store: &mut MetadataStore,
    ) -> Result<ImportReport> {
        ensure_managed_root(managed_root)?;

        let mut report = ImportReport::default();
        for source in sources {
            let result = match self.import_one(source, mode, managed_root) {
                Ok((success, record)) => {
                    info!(
                        source = %source.display(),
                        name = %success.name,
                        mode = %success.mode,
                        action = ?success.action,
                        "imported"
                    );
                    if let Err(e) = store.put(record) {
                        warn!(name = %success.name, error = %e, "failed to record provenance");
                        report.warnings.push(EngineWarning::StorePersistFailed {
                            reason: e.to_string(),
                        });
                    }
                    Ok(success)
                }
                Err(failure) => {
                    warn!(source = %source.display(), error = %failure, "import failed");
                    Err(failure)
                }
            };
            report.outcomes.push(ImportOutcome {
                source: source.clone(),
                result,
            });
        }
        Ok(report)
    }

    fn import_one(
        &self,
        source: &Path,
        mode: ImportMode,
        managed_root: &Path,
    ) -> std::result::Result<(ImportSuccess, ProvenanceRecord), ImportFailure> {
        let source = self.validate_source(source, managed_root)?;
        let fingerprint = self
            .cache
            .fingerprint(&source)
            .map_err(|e| source_failure(&source, e))?;
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ImportFailure::SourceNotAFile {
                path: source.clone(),
            })?;

        let (name, occupant) = self.choose_destination(managed_root, &file_name, &fingerprint)?;
        let dest = managed_root.join(&name);

        let action = match occupant {
            Occupant::Absent if name == file_name => ImportAction::Created,
            Occupant::Absent => ImportAction::Renamed,
            Occupant::Dangling => ImportAction::Replaced,
            Occupant::SameContent { link_target } => {
                let unchanged = match mode {
                    ImportMode::Linked => link_target.as_deref() == Some(source.as_path()),
                    ImportMode::Copied => link_target.is_none(),
                };
                if unchanged {
                    ImportAction::Refreshed
                } else {
                    ImportAction::Replaced
                }
            }
            Occupant::Other => {
                return Err(ImportFailure::DestinationUnwritable {
                    reason: format!("{} is occupied", dest.display()),
                });
            }
        };

        if action != ImportAction::Refreshed {
            self.write_entry(&source, &dest, mode, &fingerprint)?;
        } else {
            debug!(name = %name, "entry already up to date");
        }

        let record = ProvenanceRecord::new(name.clone(), source.clone(), fingerprint.clone(), mode);
        let success = ImportSuccess {
            name,
            path: dest,
            mode,
            action,
            fingerprint,
        };
        Ok((success, record))
    }

    /// Canonicalize `source` and check it is a regular file living outside
    /// the managed directory. A source inside it would be linked or copied
    /// over itself.
    fn validate_source(
        &self,
        source: &Path,
        managed_root: &Path,
    ) -> std::result::Result<PathBuf, ImportFailure> {
        let canonical = dunce::canonicalize(source).map_err(|e| source_failure(source, e))?;
        let meta = fs::metadata(&canonical).map_err(|e| source_failure(source, e))?;
        if !meta.is_file() {
            return Err(ImportFailure::SourceNotAFile {
                path: source.to_path_buf(),
            });
        }

        // Checked on both the resolved file and the path as given, so a
        // managed link passed back in is caught too.
        let managed = dunce::canonicalize(managed_root).map_err(|e| dest_failure(managed_root, e))?;
        let given_parent = match source.parent() {
            Some(p) if p.as_os_str().is_empty() => dunce::canonicalize(".").ok(),
            Some(p) => dunce::canonicalize(p).ok(),
            None => None,
        };
        if canonical.parent() == Some(managed.as_path())
            || given_parent.as_deref() == Some(managed.as_path())
        {
            return Err(ImportFailure::SourceInManagedDirectory {
                path: source.to_path_buf(),
            });
        }
        Ok(canonical)
    }

    /// Pick the destination name: the base name if it is free or already
    /// holds this content, otherwise the lowest `stem-N.ext` (N >= 2) that is
    /// free or already holds this content.
    fn choose_destination(
        &self,
        managed_root: &Path,
        file_name: &str,
        fingerprint: &str,
    ) -> std::result::Result<(String, Occupant), ImportFailure> {
        let base = self.inspect(&managed_root.join(file_name), fingerprint)?;
        if !matches!(base, Occupant::Other) {
            return Ok((file_name.to_string(), base));
        }

        for n in 2..=MAX_SUFFIX {
            let candidate = suffixed_name(file_name, n);
            match self.inspect(&managed_root.join(&candidate), fingerprint)? {
                Occupant::Other | Occupant::Dangling => continue,
                occupant => {
                    debug!(name = %file_name, chosen = %candidate, "name collision");
                    return Ok((candidate, occupant));
                }
            }
        }
        Err(ImportFailure::DestinationUnwritable {
            reason: format!("no free name for {file_name} after {MAX_SUFFIX} attempts"),
        })
    }

    fn inspect(&self, path: &Path, fingerprint: &str) -> std::result::Result<Occupant, ImportFailure> {
        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Occupant::Absent),
            Err(e) => return Err(dest_failure(path, e)),
        };

        if meta.file_type().is_symlink() {
            if link::is_dangling(path) {
                return Ok(Occupant::Dangling);
            }
            let target = link::resolve_link(path).map_err(|e| dest_failure(path, e))?;
            let target = dunce::canonicalize(&target).unwrap_or(target);
            return Ok(match self.cache.fingerprint(&target) {
                Ok(fp) if fp == fingerprint => Occupant::SameContent {
                    link_target: Some(target),
                },
                _ => Occupant::Other,
            });
        }
        if !meta.is_file() {
            return Ok(Occupant::Other);
        }
        Ok(match self.cache.fingerprint(path) {
            Ok(fp) if fp == fingerprint => Occupant::SameContent { link_target: None },
            _ => Occupant::Other,
        })
    }

    fn write_entry(
        &self,
        source: &Path,
        dest: &Path,
        mode: ImportMode,
        fingerprint: &str,
    ) -> std::result::Result<(), ImportFailure> {
        let written = match mode {
            ImportMode::Linked => modlink_fs::io::link_atomic(source, dest),
            ImportMode::Copied => modlink_fs::io::copy_atomic(source, dest, fingerprint).map(|_| ()),
        };
        self.cache.invalidate(dest);
        written.map_err(|e| fs_failure(&e, dest))
    }
}

fn ensure_managed_root(managed_root: &Path) -> Result<()> {
    match fs::metadata(managed_root) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(Error::ManagedRootUnavailable {
            path: managed_root.to_path_buf(),
            reason: "not a directory".to_string(),
        }),
        Err(e) => Err(Error::ManagedRootUnavailable {
            path: managed_root.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

/// `BOSS.wad` -> `BOSS-2.wad`; names without an extension get the bare suffix.
pub fn suffixed_name(file_name: &str, n: u32) -> String {
    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    match path.extension() {
        Some(ext) => format!("{stem}-{n}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{n}"),
    }
}

fn source_failure(source: &Path, e: io::Error) -> ImportFailure {
    match e.kind() {
        io::ErrorKind::NotFound => ImportFailure::SourceMissing {
            path: source.to_path_buf(),
        },
        io::ErrorKind::PermissionDenied => ImportFailure::PermissionDenied {
            path: source.to_path_buf(),
        },
        _ => ImportFailure::Io {
            path: source.to_path_buf(),
            message: e.to_string(),
        },
    }
}

fn dest_failure(dest: &Path, e: io::Error) -> ImportFailure {
    match e.kind() {
        io::ErrorKind::PermissionDenied => ImportFailure::PermissionDenied {
            path: dest.to_path_buf(),
        },
        io::ErrorKind::ReadOnlyFilesystem | io::ErrorKind::StorageFull => {
            ImportFailure::DestinationUnwritable {
                reason: e.to_string(),
            }
        }
        _ => ImportFailure::Io {
            path: dest.to_path_buf(),
            message: e.to_string(),
        },
    }
}

fn fs_failure(e: &modlink_fs::Error, dest: &Path) -> ImportFailure {
    if let modlink_fs::Error::ChecksumMismatch { path, .. } = e {
        return ImportFailure::ContentMismatch { path: path.clone() };
    }
    if e.io_error().is_some_and(link::is_link_privilege_error) {
        return ImportFailure::LinkPrivilege {
            path: dest.to_path_buf(),
        };
    }
    match e.io_kind() {
        Some(io::ErrorKind::PermissionDenied) => ImportFailure::PermissionDenied {
            path: dest.to_path_buf(),
        },
        Some(io::ErrorKind::ReadOnlyFilesystem | io::ErrorKind::StorageFull) => {
            ImportFailure::DestinationUnwritable {
                reason: e.to_string(),
            }
        }
        _ => ImportFailure::Io {
            path: e.path().unwrap_or(dest).to_path_buf(),
            message: e.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("BOSS.wad", 2, "BOSS-2.wad")]
    #[case("BOSS.wad", 13, "BOSS-13.wad")]
    #[case("README", 2, "README-2")]
    #[case("pack.tar.gz", 3, "pack.tar-3.gz")]
    #[case(".hidden", 2, ".hidden-2")]
    fn suffix_goes_before_extension(#[case] name: &str, #[case] n: u32, #[case] expected: &str) {
        assert_eq!(suffixed_name(name, n), expected);
    }

    #[test]
    fn fs_errors_map_to_import_failures() {
        let dest = Path::new("/managed/MAP01.wad");

        let denied = modlink_fs::Error::io(dest, io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(
            fs_failure(&denied, dest),
            ImportFailure::PermissionDenied {
                path: dest.to_path_buf()
            }
        );

        let privilege = modlink_fs::Error::io(
            dest,
            io::Error::from_raw_os_error(link::ERROR_PRIVILEGE_NOT_HELD),
        );
        assert_eq!(
            matches!(fs_failure(&privilege, dest), ImportFailure::LinkPrivilege { .. }),
            cfg!(windows)
        );

        let mismatch = modlink_fs::Error::ChecksumMismatch {
            path: PathBuf::from("/library/MAP01.wad"),
            expected: "sha256:aa".into(),
            actual: "sha256:bb".into(),
        };
        assert_eq!(
            fs_failure(&mismatch, dest),
            ImportFailure::ContentMismatch {
                path: PathBuf::from("/library/MAP01.wad")
            }
        );
    }

    #[test]
    fn missing_managed_root_fails_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MetadataStore::load(dir.path().join("provenance.json"));
        let engine = ImportEngine::new(Arc::new(FingerprintCache::new()));

        let err = engine
            .import_entries(&[], ImportMode::Copied, &dir.path().join("missing"), &mut store)
            .unwrap_err();
        assert!(matches!(err, Error::ManagedRootUnavailable { .. }));
    }

    #[test]
    fn checksum_mismatch_maps_to_content_mismatch() {
        let err = modlink_fs::Error::ChecksumMismatch {
            path: PathBuf::from("/lib/A.wad"),
            expected: "sha256:a".into(),
            actual: "sha256:b".into(),
        };
        assert_eq!(
            fs_failure(&err, Path::new("/managed/A.wad")),
            ImportFailure::ContentMismatch {
                path: PathBuf::from("/lib/A.wad")
            }
        );
    }

    #[test]
    fn permission_error_maps_to_permission_denied() {
        let err = modlink_fs::Error::io(
            "/managed/A.wad",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(
            fs_failure(&err, Path::new("/managed/A.wad")),
            ImportFailure::PermissionDenied { .. }
        ));
    }
}
