//! Reading the managed directory

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use modlink_fs::{io::is_temp_artifact, link};
use tracing::{debug, warn};

use super::{EntryKind, ManagedEntry};
use crate::cache::FingerprintCache;
use crate::filter::EntryFilter;
use crate::{Error, Result};

/// List the managed directory as [`ManagedEntry`] values, sorted for display.
///
/// Links are always listed; regular files only when `filter` accepts them.
/// Subdirectories and temp artifacts of in-flight atomic writes are skipped.
/// A regular file that cannot be read is listed without a fingerprint.
/// Cached fingerprints of managed files that are gone are dropped.
///
/// # Errors
///
/// [`Error::ManagedRootUnavailable`] if the directory cannot be listed.
pub fn list_managed(
    root: &Path,
    filter: &EntryFilter,
    cache: &FingerprintCache,
) -> Result<Vec<ManagedEntry>> {
    let dir = fs::read_dir(root).map_err(|e| Error::ManagedRootUnavailable {
        path: root.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut entries = Vec::new();
    let mut files: HashSet<PathBuf> = HashSet::new();
    for item in dir {
        let item = match item {
            Ok(item) => item,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "failed to read managed entry");
                continue;
            }
        };
        let name = item.file_name().to_string_lossy().into_owned();
        if is_temp_artifact(&name) {
            continue;
        }

        let path = item.path();
        let meta = match fs::symlink_metadata(&path) {
            Ok(meta) => meta,
            // Vanished between listing and stat
            Err(_) => continue,
        };

        if meta.file_type().is_symlink() {
            let target = link::resolve_link(&path).ok();
            entries.push(ManagedEntry {
                name,
                kind: EntryKind::Link,
                dangling: link::is_dangling(&path),
                link_target: target,
                fingerprint: None,
                path,
            });
        } else if meta.is_file() {
            if !filter.allows(&name) {
                continue;
            }
            files.insert(path.clone());
            let fingerprint = match cache.fingerprint(&path) {
                Ok(fp) => Some(fp),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "cannot fingerprint managed file");
                    None
                }
            };
            entries.push(ManagedEntry {
                name,
                kind: EntryKind::File,
                dangling: false,
                link_target: None,
                fingerprint,
                path,
            });
        } else {
            debug!(path = %path.display(), "ignoring non-file entry");
        }
    }

    cache.retain(|p| p.parent() != Some(root) || files.contains(p));

    super::sort_for_display(&mut entries, |e| e.name.as_str());
    Ok(entries)
}
