//! Synchronous reconciliation
//!
//! [`Reconciler`] ties the components together. It is safe to share between
//! threads: the library index is swapped whole behind a read-write lock,
//! and every operation that reads or mutates the managed directory or the
//! provenance store runs inside the store mutex.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::cache::FingerprintCache;
use crate::classify::{Classifier, list_managed};
use crate::config::EngineConfig;
use crate::filter::EntryFilter;
use crate::import::{ImportEngine, ImportReport};
use crate::index::{ContentIndexer, LibraryIndex, RebuildTicket, SupersedeCounter};
use crate::removal::{RemovalEngine, RemovalReport};
use crate::snapshot::{ClassificationSnapshot, EngineWarning};
use crate::store::{ImportMode, MetadataStore, ProvenanceRecord};
use crate::{Error, Result};

#[derive(Debug, Clone)]
struct Roots {
    library: Option<PathBuf>,
    managed: PathBuf,
}

/// Library index, provenance store and managed directory, kept consistent
#[derive(Debug)]
pub struct Reconciler {
    roots: RwLock<Roots>,
    filter: EntryFilter,
    default_mode: ImportMode,
    cache: Arc<FingerprintCache>,
    indexer: ContentIndexer,
    index: RwLock<Arc<LibraryIndex>>,
    store: Mutex<MetadataStore>,
    counter: SupersedeCounter,
    importer: ImportEngine,
    remover: RemovalEngine,
    classifier: Classifier,
    generation: AtomicU64,
    warnings: Mutex<Vec<EngineWarning>>,
}

impl Reconciler {
    /// Create a reconciler for `config`, with provenance kept at `store_path`.
    ///
    /// Nothing is indexed yet; the first [`Self::reconcile`] with
    /// `rebuild_index` does that.
    pub fn new(config: &EngineConfig, store_path: impl Into<PathBuf>) -> Self {
        let cache = Arc::new(FingerprintCache::new());
        let filter = config.filter();
        Self {
            roots: RwLock::new(Roots {
                library: config.library_root.clone(),
                managed: config.managed_root.clone(),
            }),
            indexer: ContentIndexer::new(filter.clone(), Arc::clone(&cache)),
            importer: ImportEngine::new(Arc::clone(&cache)),
            remover: RemovalEngine::new(Arc::clone(&cache)),
            filter,
            default_mode: config.default_mode,
            cache,
            index: RwLock::new(Arc::new(LibraryIndex::empty())),
            store: Mutex::new(MetadataStore::load(store_path)),
            counter: SupersedeCounter::new(),
            classifier: Classifier::new(),
            generation: AtomicU64::new(0),
            warnings: Mutex::new(Vec::new()),
        }
    }

    pub fn library_root(&self) -> Option<PathBuf> {
        self.roots.read().library.clone()
    }

    pub fn managed_root(&self) -> PathBuf {
        self.roots.read().managed.clone()
    }

    pub fn default_mode(&self) -> ImportMode {
        self.default_mode
    }

    /// Counter whose tickets guard index rebuilds
    pub fn supersede_counter(&self) -> &SupersedeCounter {
        &self.counter
    }

    /// Re-point both roots. Any in-flight rebuild is superseded and the
    /// current index is dropped, so the next pass starts from scratch.
    pub fn set_roots(&self, library: Option<PathBuf>, managed: PathBuf) {
        self.counter.supersede();
        {
            let mut roots = self.roots.write();
            info!(
                library = ?library,
                managed = %managed.display(),
                "roots changed"
            );
            *roots = Roots { library, managed };
        }
        *self.index.write() = Arc::new(LibraryIndex::empty());
        self.cache.clear();
    }

    /// The index currently in use
    pub fn current_index(&self) -> Arc<LibraryIndex> {
        Arc::clone(&self.index.read())
    }

    /// Queue a warning for the next snapshot.
    pub fn push_warning(&self, warning: EngineWarning) {
        self.warnings.lock().push(warning);
    }

    /// Rebuild the library index and swap it in.
    ///
    /// Starting a rebuild supersedes any rebuild still running. With `full`
    /// the fingerprint cache is cleared first, so every file is rehashed.
    ///
    /// # Errors
    ///
    /// - [`Error::LibraryNotConfigured`] when no library root is set.
    /// - [`Error::LibraryUnreadable`]; the previous index stays in use.
    /// - [`Error::RebuildSuperseded`] when a newer rebuild or a root change
    ///   happened meanwhile; the result is discarded.
    pub fn rebuild_index(&self, full: bool) -> Result<Arc<LibraryIndex>> {
        let Roots { library, managed } = self.roots.read().clone();
        let root = library.ok_or(Error::LibraryNotConfigured)?;
        self.counter.supersede();
        let ticket = self.counter.ticket();
        if full {
            debug!("clearing fingerprint cache for full rebuild");
            self.cache.clear();
        }

        let index = self.indexer.rebuild(&root, Some(&managed), &ticket)?;
        self.publish_index(&ticket, index)
    }

    /// Swap in a finished index unless `ticket` went stale meanwhile.
    fn publish_index(&self, ticket: &RebuildTicket, index: LibraryIndex) -> Result<Arc<LibraryIndex>> {
        let mut current = self.index.write();
        if ticket.is_stale() {
            debug!(files = index.len(), "discarding superseded index");
            return Err(Error::RebuildSuperseded);
        }
        let index = Arc::new(index);
        *current = Arc::clone(&index);
        Ok(index)
    }

    /// Run one pass: optionally rebuild the index, then list and classify
    /// the managed directory, write back healed and stale provenance and
    /// produce a snapshot.
    ///
    /// Recoverable problems become warnings on the snapshot. An unavailable
    /// managed directory yields a snapshot with no entries and a warning.
    ///
    /// # Errors
    ///
    /// Only [`Error::RebuildSuperseded`]; the caller should retry later.
    pub fn reconcile(&self, rebuild_index: bool, full: bool) -> Result<ClassificationSnapshot> {
        let mut warnings = std::mem::take(&mut *self.warnings.lock());

        if rebuild_index {
            match self.rebuild_index(full) {
                Ok(_) => {}
                Err(Error::RebuildSuperseded) => {
                    self.warnings.lock().extend(warnings);
                    return Err(Error::RebuildSuperseded);
                }
                Err(Error::LibraryNotConfigured) => debug!("no library configured, skipping index"),
                Err(Error::LibraryUnreadable { path, reason }) => {
                    warn!(path = %path.display(), reason = %reason, "keeping previous index");
                    warnings.push(EngineWarning::IndexUnavailable { path, reason });
                }
                Err(e) => {
                    warn!(error = %e, "index rebuild failed");
                    warnings.push(EngineWarning::IndexUnavailable {
                        path: self.library_root().unwrap_or_default(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let index = self.current_index();
        let managed = self.managed_root();

        let mut store = self.store.lock();
        if let Some(reason) = store.take_recovery() {
            warnings.push(EngineWarning::StoreReset {
                path: store.path().to_path_buf(),
                reason,
            });
        }

        let entries = match list_managed(&managed, &self.filter, &self.cache) {
            Ok(listing) => {
                let outcome = self.classifier.classify(&listing, &index, store.list());
                if !outcome.heal.is_empty() || !outcome.stale.is_empty() {
                    debug!(
                        healed = outcome.heal.len(),
                        pruned = outcome.stale.len(),
                        "updating provenance"
                    );
                }
                if let Err(e) = store.apply(outcome.heal, &outcome.stale) {
                    warn!(error = %e, "failed to persist provenance");
                    warnings.push(EngineWarning::StorePersistFailed {
                        reason: e.to_string(),
                    });
                }
                outcome.entries
            }
            Err(Error::ManagedRootUnavailable { path, reason }) => {
                warn!(path = %path.display(), reason = %reason, "managed directory unavailable");
                warnings.push(EngineWarning::ManagedRootUnavailable { path, reason });
                Vec::new()
            }
            Err(e) => {
                warnings.push(EngineWarning::ManagedRootUnavailable {
                    path: managed.clone(),
                    reason: e.to_string(),
                });
                Vec::new()
            }
        };
        drop(store);

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(generation, entries = entries.len(), "classification ready");
        Ok(ClassificationSnapshot {
            generation,
            managed_root: managed,
            library_root: index.root().map(Path::to_path_buf).or_else(|| self.library_root()),
            entries,
            warnings,
            index_size: index.len(),
            taken_at: Utc::now(),
        })
    }

    /// Import `sources` into the managed directory.
    ///
    /// # Errors
    ///
    /// [`Error::ManagedRootUnavailable`]; per-file failures are in the report.
    pub fn import(&self, sources: &[PathBuf], mode: ImportMode) -> Result<ImportReport> {
        let managed = self.managed_root();
        let mut store = self.store.lock();
        self.importer.import_entries(sources, mode, &managed, &mut store)
    }

    /// Remove managed entries by name.
    ///
    /// # Errors
    ///
    /// [`Error::ManagedRootUnavailable`]; per-name failures are in the report.
    pub fn remove(&self, names: &[String]) -> Result<RemovalReport> {
        let managed = self.managed_root();
        let mut store = self.store.lock();
        self.remover.remove(names, &managed, &mut store)
    }

    /// Copy of all provenance records
    pub fn records(&self) -> BTreeMap<String, ProvenanceRecord> {
        self.store.lock().list().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconciler(dir: &Path) -> Reconciler {
        let library = dir.join("library");
        let managed = dir.join("managed");
        std::fs::create_dir_all(&library).unwrap();
        std::fs::create_dir_all(&managed).unwrap();
        Reconciler::new(
            &EngineConfig::with_roots(Some(library), managed),
            dir.join("provenance.json"),
        )
    }

    #[test]
    fn generations_increase() {
        let dir = tempfile::tempdir().unwrap();
        let r = reconciler(dir.path());

        let first = r.reconcile(true, false).unwrap();
        let second = r.reconcile(false, false).unwrap();

        assert_eq!(first.generation + 1, second.generation);
    }

    #[test]
    fn unreadable_library_keeps_previous_index() {
        let dir = tempfile::tempdir().unwrap();
        let r = reconciler(dir.path());
        std::fs::write(dir.path().join("library/A.wad"), b"a").unwrap();
        r.reconcile(true, false).unwrap();

        std::fs::remove_dir_all(dir.path().join("library")).unwrap();
        let snapshot = r.reconcile(true, true).unwrap();

        assert_eq!(snapshot.index_size, 1);
        assert!(matches!(snapshot.warnings[0], EngineWarning::IndexUnavailable { .. }));
    }

    #[test]
    fn missing_managed_root_is_a_warning() {
        let dir = tempfile::tempdir().unwrap();
        let r = Reconciler::new(
            &EngineConfig::with_roots(None, dir.path().join("missing")),
            dir.path().join("provenance.json"),
        );

        let snapshot = r.reconcile(true, false).unwrap();

        assert!(snapshot.entries.is_empty());
        assert!(matches!(
            snapshot.warnings.as_slice(),
            [EngineWarning::ManagedRootUnavailable { .. }]
        ));
    }

    #[test]
    fn set_roots_drops_the_index() {
        let dir = tempfile::tempdir().unwrap();
        let r = reconciler(dir.path());
        std::fs::write(dir.path().join("library/A.wad"), b"a").unwrap();
        r.rebuild_index(false).unwrap();

        r.set_roots(None, dir.path().join("managed"));

        assert!(r.current_index().is_empty());
        assert!(matches!(r.rebuild_index(false), Err(Error::LibraryNotConfigured)));
    }

    #[test]
    fn rebuild_superseded_after_walk_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let r = reconciler(dir.path());
        let library = dir.path().join("library");
        std::fs::write(library.join("A.wad"), b"a").unwrap();
        let previous = r.rebuild_index(false).unwrap();
        std::fs::remove_file(library.join("A.wad")).unwrap();
        std::fs::write(library.join("B.wad"), b"b").unwrap();
        r.cache.clear();

        // Held so the finished walk cannot swap its index in yet
        let guard = r.index.read();
        std::thread::scope(|s| {
            let rebuild = s.spawn(|| r.rebuild_index(false));
            // B is the only file; once hashed the walk has no more checks
            while r.cache.is_empty() {
                std::thread::yield_now();
            }
            r.supersede_counter().supersede();
            drop(guard);
            assert!(matches!(rebuild.join().unwrap(), Err(Error::RebuildSuperseded)));
        });

        assert!(Arc::ptr_eq(&r.current_index(), &previous));
        assert_eq!(r.current_index().by_name("A.wad").len(), 1);
        assert!(r.current_index().by_name("B.wad").is_empty());
    }

    #[test]
    fn stale_ticket_cannot_publish() {
        let dir = tempfile::tempdir().unwrap();
        let r = reconciler(dir.path());
        let ticket = r.supersede_counter().ticket();
        r.set_roots(None, dir.path().join("managed"));

        let err = r.publish_index(&ticket, LibraryIndex::empty()).unwrap_err();

        assert!(matches!(err, Error::RebuildSuperseded));
    }

    #[test]
    fn corrupt_store_is_reported_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("provenance.json"), b"[[[").unwrap();
        let r = reconciler(dir.path());

        let first = r.reconcile(false, false).unwrap();
        let second = r.reconcile(false, false).unwrap();

        assert!(matches!(first.warnings[0], EngineWarning::StoreReset { .. }));
        assert!(second.warnings.is_empty());
    }
}
