//! Live reconciliation driven by filesystem change notifications
//!
//! ```text
//! notify thread --WatchSignal--> bounded channel --> worker
//!                                                     |
//!                                            WatchCoordinator
//!                                   (idle -> pending -> reconciling)
//! ```
//!
//! The state machine in [`coordinator`] is pure and tested with synthetic
//! instants; [`watcher`] is the thin notify adapter.

mod coordinator;
mod watcher;

pub use coordinator::{ReconcileRequest, WatchCoordinator, WatchRoot, WatchState};
pub use watcher::{FsWatcher, SIGNAL_CAPACITY, WatchSignal};
