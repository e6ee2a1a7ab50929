//! Library tree walker
//!
//! Walks the library recursively without following links found inside the
//! tree, fingerprints every accepted file and produces a fresh
//! [`LibraryIndex`]. A rebuild holds a [`RebuildTicket`]; once a newer rebuild
//! is requested the ticket goes stale and the walk stops at the next file or
//! hash chunk, discarding everything it collected.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::{LibraryEntry, LibraryIndex};
use crate::cache::FingerprintCache;
use crate::filter::EntryFilter;
use crate::{Error, Result};

/// Generation counter used to supersede in-flight rebuilds
#[derive(Debug, Clone, Default)]
pub struct SupersedeCounter(Arc<AtomicU64>);

impl SupersedeCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidate every outstanding ticket.
    pub fn supersede(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    /// Ticket for a rebuild starting now.
    pub fn ticket(&self) -> RebuildTicket {
        RebuildTicket {
            issued: self.0.load(Ordering::SeqCst),
            counter: Some(Arc::clone(&self.0)),
        }
    }
}

/// Permission to keep rebuilding, valid until superseded
#[derive(Debug, Clone)]
pub struct RebuildTicket {
    issued: u64,
    counter: Option<Arc<AtomicU64>>,
}

impl RebuildTicket {
    /// A ticket that never goes stale
    pub fn detached() -> Self {
        Self {
            issued: 0,
            counter: None,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.counter
            .as_ref()
            .is_some_and(|counter| counter.load(Ordering::SeqCst) != self.issued)
    }
}

/// Builds [`LibraryIndex`] snapshots
#[derive(Debug, Clone)]
pub struct ContentIndexer {
    filter: EntryFilter,
    cache: Arc<FingerprintCache>,
}

fn unreadable(root: &Path, reason: impl ToString) -> Error {
    Error::LibraryUnreadable {
        path: root.to_path_buf(),
        reason: reason.to_string(),
    }
}

impl ContentIndexer {
    pub fn new(filter: EntryFilter, cache: Arc<FingerprintCache>) -> Self {
        Self { filter, cache }
    }

    pub fn filter(&self) -> &EntryFilter {
        &self.filter
    }

    /// Walk `root` and build a new index. The `skip` directory, typically
    /// a managed directory nested in the library, is left out of the walk.
    ///
    /// # Errors
    ///
    /// - [`Error::LibraryUnreadable`] if `root` is missing, not a directory or
    ///   cannot be listed.
    /// - [`Error::RebuildSuperseded`] if `ticket` went stale mid-walk.
    ///
    /// Unreadable subdirectories and files that vanish mid-walk are skipped
    /// with a warning.
    pub fn rebuild(
        &self,
        root: &Path,
        skip: Option<&Path>,
        ticket: &RebuildTicket,
    ) -> Result<LibraryIndex> {
        let meta = fs::metadata(root).map_err(|e| unreadable(root, e))?;
        if !meta.is_dir() {
            return Err(unreadable(root, "not a directory"));
        }
        fs::read_dir(root).map_err(|e| unreadable(root, e))?;
        let root = dunce::canonicalize(root).map_err(|e| unreadable(root, e))?;
        let skip = skip
            .and_then(|p| dunce::canonicalize(p).ok())
            .filter(|p| p.starts_with(&root));

        let mut entries = Vec::new();
        let mut seen: HashSet<PathBuf> = HashSet::new();

        let walk = WalkDir::new(&root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| skip.as_deref() != Some(e.path()));
        for item in walk {
            if ticket.is_stale() {
                debug!(root = %root.display(), "rebuild superseded");
                return Err(Error::RebuildSuperseded);
            }

            let item = match item {
                Ok(item) => item,
                Err(e) if e.depth() == 0 => return Err(unreadable(&root, e)),
                Err(e) => {
                    warn!(error = %e, "skipping unreadable library path");
                    continue;
                }
            };

            let file_type = item.file_type();
            if file_type.is_symlink() {
                debug!(path = %item.path().display(), "skipping link inside library");
                continue;
            }
            if !file_type.is_file() {
                continue;
            }

            let file_name = item.file_name().to_string_lossy().into_owned();
            if !self.filter.allows(&file_name) {
                continue;
            }

            let path = item.path().to_path_buf();
            let size = match item.metadata() {
                Ok(m) => m.len(),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping library file");
                    continue;
                }
            };

            let fingerprint = match self
                .cache
                .fingerprint_interruptible(&path, || ticket.is_stale())
            {
                Ok(Some(fp)) => fp,
                Ok(None) => return Err(Error::RebuildSuperseded),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping library file");
                    continue;
                }
            };

            seen.insert(path.clone());
            entries.push(LibraryEntry {
                path,
                file_name,
                fingerprint,
                size,
            });
        }

        // Forget cached library files that no longer exist
        self.cache.retain(|p| {
            !p.starts_with(&root)
                || seen.contains(p)
                || skip.as_deref().is_some_and(|s| p.starts_with(s))
        });

        let index = LibraryIndex::from_entries(Some(root.clone()), entries);
        info!(
            root = %root.display(),
            files = index.len(),
            distinct = index.distinct_contents(),
            "library indexed"
        );
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indexer() -> ContentIndexer {
        ContentIndexer::new(EntryFilter::all(), Arc::new(FingerprintCache::new()))
    }

    #[test]
    fn missing_root_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let err = indexer()
            .rebuild(&dir.path().join("missing"), None, &RebuildTicket::detached())
            .unwrap_err();
        assert!(matches!(err, Error::LibraryUnreadable { .. }));
    }

    #[test]
    fn file_root_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file.wad");
        fs::write(&file, b"x").unwrap();
        let err = indexer().rebuild(&file, None, &RebuildTicket::detached()).unwrap_err();
        assert!(matches!(err, Error::LibraryUnreadable { .. }));
    }

    #[test]
    fn stale_ticket_aborts_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.wad"), b"a").unwrap();
        let counter = SupersedeCounter::new();
        let ticket = counter.ticket();
        counter.supersede();

        let err = indexer().rebuild(dir.path(), None, &ticket).unwrap_err();
        assert!(matches!(err, Error::RebuildSuperseded));
    }

    #[test]
    fn fresh_ticket_is_not_stale() {
        let counter = SupersedeCounter::new();
        counter.supersede();
        let ticket = counter.ticket();
        assert!(!ticket.is_stale());
        assert!(!RebuildTicket::detached().is_stale());
    }

    #[test]
    fn walks_nested_directories_with_filter() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("megawads/2024")).unwrap();
        fs::write(dir.path().join("megawads/2024/MAP01.wad"), b"map").unwrap();
        fs::write(dir.path().join("readme.txt"), b"text").unwrap();
        let indexer = ContentIndexer::new(EntryFilter::new(["wad"]), Arc::new(FingerprintCache::new()));

        let index = indexer.rebuild(dir.path(), None, &RebuildTicket::detached()).unwrap();

        assert_eq!(index.len(), 1);
        assert_eq!(index.by_name("map01.wad")[0].size, 3);
    }

    #[test]
    fn skipped_directory_is_left_out() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("managed")).unwrap();
        fs::write(dir.path().join("A.wad"), b"a").unwrap();
        fs::write(dir.path().join("managed/B.wad"), b"b").unwrap();

        let index = indexer()
            .rebuild(
                dir.path(),
                Some(&dir.path().join("managed")),
                &RebuildTicket::detached(),
            )
            .unwrap();

        assert_eq!(index.len(), 1);
        assert!(index.by_name("B.wad").is_empty());
    }

    #[test]
    fn skip_outside_root_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let library = dir.path().join("library");
        fs::create_dir_all(&library).unwrap();
        fs::write(library.join("A.wad"), b"a").unwrap();

        let index = indexer()
            .rebuild(&library, Some(dir.path()), &RebuildTicket::detached())
            .unwrap();

        assert_eq!(index.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn links_inside_library_are_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("real")).unwrap();
        fs::write(dir.path().join("real/A.wad"), b"a").unwrap();
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("loop")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("real/A.wad"), dir.path().join("B.wad")).unwrap();

        let index = indexer().rebuild(dir.path(), None, &RebuildTicket::detached()).unwrap();

        assert_eq!(index.len(), 1);
        assert!(index.by_name("B.wad").is_empty());
    }
}
