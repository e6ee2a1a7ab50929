//! notify adapter
//!
//! Turns raw `notify` events into [`WatchSignal`]s on a bounded channel.
//! Anything that means events were lost (a full channel, a backend error, a
//! rescan flag) is reported as [`WatchSignal::Overflow`]; when the channel
//! is too full to carry even that, a sticky flag is set instead and picked up
//! by [`FsWatcher::take_overflow`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Sender, TrySendError};
use notify::event::{AccessKind, AccessMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, trace, warn};

use super::WatchRoot;
use crate::index::SupersedeCounter;
use crate::{Error, Result};

/// Capacity of the signal channel between notify and the worker
pub const SIGNAL_CAPACITY: usize = 1024;

/// What the worker hears from the filesystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchSignal {
    Changed(WatchRoot),
    Overflow,
}

/// Whether an event can change what the engine sees
fn is_relevant(kind: &EventKind) -> bool {
    match kind {
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => true,
        EventKind::Access(_) => false,
        _ => true,
    }
}

fn is_temp_path(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| modlink_fs::io::is_temp_artifact(&name.to_string_lossy()))
}

struct Roots {
    library: Option<PathBuf>,
    managed: PathBuf,
}

impl Roots {
    /// The deepest root containing `path`; either root may be nested in
    /// the other. Managed wins a tie.
    fn classify(&self, path: &Path) -> Option<WatchRoot> {
        let managed = Some((WatchRoot::Managed, self.managed.as_path()));
        let library = self.library.as_deref().map(|l| (WatchRoot::Library, l));
        [library, managed]
            .into_iter()
            .flatten()
            .filter(|(_, root)| path.starts_with(root))
            .max_by_key(|(_, root)| root.components().count())
            .map(|(kind, _)| kind)
    }
}

/// Live filesystem subscription for both roots; dropping it unsubscribes.
pub struct FsWatcher {
    _watcher: RecommendedWatcher,
    overflowed: Arc<AtomicBool>,
}

impl std::fmt::Debug for FsWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsWatcher")
            .field("overflowed", &self.overflowed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl FsWatcher {
    /// Subscribe to `library` (recursively) and `managed` (flat).
    ///
    /// Library changes also supersede any in-flight index rebuild through
    /// `counter`, straight from the notify thread.
    ///
    /// Returns the watcher together with the roots that could not be
    /// watched; a root failing to subscribe does not prevent the other.
    ///
    /// # Errors
    ///
    /// [`Error::Watch`] if the notify backend cannot be created at all.
    pub fn start(
        library: Option<&Path>,
        managed: &Path,
        signals: Sender<WatchSignal>,
        counter: SupersedeCounter,
    ) -> Result<(Self, Vec<(PathBuf, Error)>)> {
        let roots = Roots {
            library: library.map(canonical),
            managed: canonical(managed),
        };
        let overflowed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&overflowed);

        let send = move |signal: WatchSignal| match signals.try_send(signal) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                flag.store(true, Ordering::SeqCst);
            }
            Err(TrySendError::Disconnected(_)) => {}
        };

        let watch_roots = Roots {
            library: roots.library.clone(),
            managed: roots.managed.clone(),
        };
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if event.need_rescan() {
                    debug!("notify requested a rescan");
                    counter.supersede();
                    send(WatchSignal::Overflow);
                    return;
                }
                if !is_relevant(&event.kind) {
                    return;
                }
                for path in &event.paths {
                    if is_temp_path(path) {
                        continue;
                    }
                    let Some(root) = watch_roots.classify(path) else {
                        continue;
                    };
                    trace!(path = %path.display(), kind = ?event.kind, "change");
                    if root == WatchRoot::Library {
                        counter.supersede();
                    }
                    send(WatchSignal::Changed(root));
                }
            }
            Err(e) => {
                warn!(error = %e, "notify error, forcing rescan");
                counter.supersede();
                send(WatchSignal::Overflow);
            }
        })?;

        let mut failed = Vec::new();
        if let Some(library) = &roots.library
            && let Err(e) = watcher.watch(library, RecursiveMode::Recursive)
        {
            warn!(path = %library.display(), error = %e, "cannot watch library");
            failed.push((library.clone(), Error::from(e)));
        }
        if let Err(e) = watcher.watch(&roots.managed, RecursiveMode::NonRecursive) {
            warn!(path = %roots.managed.display(), error = %e, "cannot watch managed directory");
            failed.push((roots.managed.clone(), Error::from(e)));
        }

        Ok((
            Self {
                _watcher: watcher,
                overflowed,
            },
            failed,
        ))
    }

    /// Whether signals were dropped since the last call.
    pub fn take_overflow(&self) -> bool {
        self.overflowed.swap(false, Ordering::SeqCst)
    }
}

/// Canonical form when the path exists, so event paths compare equal.
fn canonical(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
