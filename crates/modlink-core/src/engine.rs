//! Background engine
//!
//! One worker thread owns all indexing, hashing and filesystem mutation. The
//! foreground talks to it through a command channel and reads the latest
//! [`ClassificationSnapshot`] without blocking; subscribers are pushed every
//! new snapshot from the worker thread.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, bounded, select, unbounded};
use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::import::ImportReport;
use crate::reconciler::Reconciler;
use crate::removal::RemovalReport;
use crate::snapshot::{ClassificationSnapshot, EngineWarning};
use crate::store::ImportMode;
use crate::watch::{FsWatcher, ReconcileRequest, SIGNAL_CAPACITY, WatchCoordinator, WatchSignal};
use crate::{Error, Result};

/// Callback invoked with every new snapshot
pub type Subscriber = Arc<dyn Fn(Arc<ClassificationSnapshot>) + Send + Sync>;

/// How the engine runs
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Subscribe to filesystem change notifications
    pub watch: bool,
    pub debounce: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            watch: true,
            debounce: Duration::from_millis(crate::config::DEFAULT_DEBOUNCE_MS),
        }
    }
}

enum Command {
    Import {
        sources: Vec<PathBuf>,
        mode: ImportMode,
        reply: Sender<Result<ImportReport>>,
    },
    Delete {
        names: Vec<String>,
        reply: Sender<Result<RemovalReport>>,
    },
    Rescan {
        full: bool,
    },
    SetRoots {
        library: Option<PathBuf>,
        managed: PathBuf,
    },
    Shutdown,
}

/// Latest snapshot plus a condvar for callers waiting on a generation
struct Published {
    snapshot: RwLock<Arc<ClassificationSnapshot>>,
    generation: Mutex<u64>,
    changed: Condvar,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl Published {
    fn publish(&self, snapshot: ClassificationSnapshot) {
        let snapshot = Arc::new(snapshot);
        let generation = snapshot.generation;
        *self.snapshot.write() = Arc::clone(&snapshot);
        {
            let mut current = self.generation.lock();
            *current = generation;
            self.changed.notify_all();
        }

        let subscribers: Vec<Subscriber> = self.subscribers.lock().clone();
        for subscriber in subscribers {
            subscriber(Arc::clone(&snapshot));
        }
    }
}

/// Threaded facade over a [`Reconciler`]
pub struct Engine {
    commands: Sender<Command>,
    published: Arc<Published>,
    reconciler: Arc<Reconciler>,
    worker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("generation", &self.current_classification().generation)
            .field("running", &self.worker.is_some())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Spawn the worker. A first full pass is scheduled immediately.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] if the worker thread cannot be spawned.
    pub fn start(reconciler: Reconciler, options: EngineOptions) -> Result<Self> {
        let reconciler = Arc::new(reconciler);
        let published = Arc::new(Published {
            snapshot: RwLock::new(Arc::new(ClassificationSnapshot::empty(
                reconciler.managed_root(),
                reconciler.library_root(),
            ))),
            generation: Mutex::new(0),
            changed: Condvar::new(),
            subscribers: Mutex::new(Vec::new()),
        });
        let (commands, command_rx) = unbounded();

        let worker = Worker {
            reconciler: Arc::clone(&reconciler),
            published: Arc::clone(&published),
            coordinator: WatchCoordinator::new(options.debounce),
            watch: options.watch,
        };
        let handle = thread::Builder::new()
            .name("modlink-worker".into())
            .spawn(move || worker.run(command_rx))?;

        Ok(Self {
            commands,
            published,
            reconciler,
            worker: Some(handle),
        })
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| Error::EngineStopped)
    }

    /// Queue an import; the report arrives on the returned channel.
    pub fn request_import(
        &self,
        sources: Vec<PathBuf>,
        mode: ImportMode,
    ) -> Result<Receiver<Result<ImportReport>>> {
        let (reply, rx) = bounded(1);
        self.send(Command::Import {
            sources,
            mode,
            reply,
        })?;
        Ok(rx)
    }

    /// Queue a removal; the report arrives on the returned channel.
    pub fn request_delete(&self, names: Vec<String>) -> Result<Receiver<Result<RemovalReport>>> {
        let (reply, rx) = bounded(1);
        self.send(Command::Delete { names, reply })?;
        Ok(rx)
    }

    /// Schedule a pass with an index rebuild; `full` rehashes everything.
    pub fn request_rescan(&self, full: bool) -> Result<()> {
        self.send(Command::Rescan { full })
    }

    /// Re-point both roots and rebuild from scratch.
    ///
    /// A rebuild already running is superseded right away, before the
    /// worker gets to the command.
    pub fn set_roots(&self, library: Option<PathBuf>, managed: PathBuf) -> Result<()> {
        self.reconciler.supersede_counter().supersede();
        self.send(Command::SetRoots { library, managed })
    }

    /// The latest published snapshot
    pub fn current_classification(&self) -> Arc<ClassificationSnapshot> {
        Arc::clone(&self.published.snapshot.read())
    }

    /// Call `callback` with every snapshot published from now on.
    pub fn subscribe(&self, callback: impl Fn(Arc<ClassificationSnapshot>) + Send + Sync + 'static) {
        self.published.subscribers.lock().push(Arc::new(callback));
    }

    /// Block until a snapshot newer than `generation` is published, or
    /// `timeout` passes.
    pub fn wait_for_newer(
        &self,
        generation: u64,
        timeout: Duration,
    ) -> Option<Arc<ClassificationSnapshot>> {
        let deadline = Instant::now() + timeout;
        let mut current = self.published.generation.lock();
        while *current <= generation {
            if self
                .published
                .changed
                .wait_until(&mut current, deadline)
                .timed_out()
            {
                break;
            }
        }
        let reached = *current > generation;
        drop(current);
        reached.then(|| self.current_classification())
    }

    /// Stop the worker, dropping filesystem subscriptions.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        let Some(handle) = self.worker.take() else {
            return Ok(());
        };
        let _ = self.commands.send(Command::Shutdown);
        handle.join().map_err(|_| Error::EngineStopped)?;
        debug!("engine stopped");
        Ok(())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!(error = %e, "engine worker panicked");
        }
    }
}

struct Worker {
    reconciler: Arc<Reconciler>,
    published: Arc<Published>,
    coordinator: WatchCoordinator,
    watch: bool,
}

impl Worker {
    fn run(mut self, commands: Receiver<Command>) {
        let (signal_tx, signal_rx) = bounded(SIGNAL_CAPACITY);
        let mut watcher = self.subscribe(&signal_tx);

        self.coordinator.request(
            ReconcileRequest {
                rebuild_index: true,
                full: false,
            },
            Instant::now(),
        );

        loop {
            let tick = match self.coordinator.next_deadline() {
                Some(deadline) => crossbeam_channel::at(deadline),
                None => crossbeam_channel::never(),
            };

            select! {
                recv(commands) -> command => match command {
                    Ok(Command::Shutdown) | Err(_) => break,
                    Ok(Command::SetRoots { library, managed }) => {
                        self.reconciler.set_roots(library, managed);
                        // Drop the old subscription before creating the new one
                        drop(watcher.take());
                        watcher = self.subscribe(&signal_tx);
                        self.coordinator.request(
                            ReconcileRequest { rebuild_index: true, full: true },
                            Instant::now(),
                        );
                    }
                    Ok(command) => self.handle(command),
                },
                recv(signal_rx) -> signal => {
                    if let Ok(signal) = signal {
                        self.on_signal(signal, Instant::now());
                    }
                }
                recv(tick) -> _ => {}
            }

            if watcher.as_ref().is_some_and(FsWatcher::take_overflow) {
                self.on_signal(WatchSignal::Overflow, Instant::now());
            }

            if let Some(request) = self.coordinator.poll(Instant::now()) {
                self.reconcile(request, &signal_rx);
            }
        }
        info!("engine worker exiting");
    }

    fn subscribe(&self, signal_tx: &Sender<WatchSignal>) -> Option<FsWatcher> {
        if !self.watch {
            return None;
        }
        let library = self.reconciler.library_root();
        let managed = self.reconciler.managed_root();
        match FsWatcher::start(
            library.as_deref(),
            &managed,
            signal_tx.clone(),
            self.reconciler.supersede_counter().clone(),
        ) {
            Ok((watcher, failed)) => {
                for (path, e) in failed {
                    self.reconciler.push_warning(EngineWarning::WatchUnavailable {
                        path,
                        reason: e.to_string(),
                    });
                }
                Some(watcher)
            }
            Err(e) => {
                warn!(error = %e, "filesystem notifications unavailable");
                self.reconciler.push_warning(EngineWarning::WatchUnavailable {
                    path: managed,
                    reason: e.to_string(),
                });
                None
            }
        }
    }

    fn on_signal(&mut self, signal: WatchSignal, now: Instant) {
        match signal {
            WatchSignal::Changed(root) => self.coordinator.on_change(root, now),
            WatchSignal::Overflow => {
                warn!("change notifications overflowed, forcing full rescan");
                self.reconciler.push_warning(EngineWarning::WatchOverflow);
                self.coordinator.on_overflow(now);
            }
        }
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Import {
                sources,
                mode,
                reply,
            } => {
                let report = self.reconciler.import(&sources, mode);
                let _ = reply.send(report);
                self.coordinator.request(ReconcileRequest::default(), Instant::now());
            }
            Command::Delete { names, reply } => {
                let report = self.reconciler.remove(&names);
                let _ = reply.send(report);
                self.coordinator.request(ReconcileRequest::default(), Instant::now());
            }
            Command::Rescan { full } => {
                self.coordinator.request(
                    ReconcileRequest {
                        rebuild_index: true,
                        full,
                    },
                    Instant::now(),
                );
            }
            Command::SetRoots { .. } | Command::Shutdown => {}
        }
    }

    fn reconcile(&mut self, request: ReconcileRequest, signals: &Receiver<WatchSignal>) {
        debug!(?request, "reconciling");
        let result = self.reconciler.reconcile(request.rebuild_index, request.full);

        // Changes seen during the pass queue another one
        for signal in signals.try_iter() {
            self.on_signal(signal, Instant::now());
        }

        match result {
            Ok(snapshot) => {
                self.published.publish(snapshot);
                self.coordinator.on_reconciled(Instant::now());
            }
            Err(Error::RebuildSuperseded) => {
                debug!("pass superseded, retrying");
                self.coordinator.on_superseded(request, Instant::now());
            }
            Err(e) => {
                error!(error = %e, "reconciliation failed");
                self.coordinator.on_reconciled(Instant::now());
            }
        }
    }
}
