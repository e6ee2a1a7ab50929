//! Reconciliation engine for modlink
//!
//! Keeps a flat managed directory (the folder a game scans for mods) in step
//! with a user's library tree, and tells the caller what every managed entry
//! is:
//!
//! - **linked**: a link back into the library
//! - **copied**: a regular file traced to a library file, by provenance
//!   record or by content match
//! - **foreign**: anything else
//!
//! # Architecture
//!
//! ```text
//!                 Engine (worker thread, notify, debounce)
//!                          |
//!                      Reconciler
//!                          |
//!   +-------------+--------+--------+-------------+--------------+
//!   |             |                 |             |              |
//! ContentIndexer  Classifier  ImportEngine  RemovalEngine  MetadataStore
//!   |                                                            |
//!   +----------------------- modlink-fs ------------------------+
//! ```
//!
//! # Example
//!
//! ```no_run
//! use modlink_core::{EngineConfig, ImportMode, Reconciler, Result};
//!
//! fn example() -> Result<()> {
//!     let config = EngineConfig::with_roots(Some("/mods".into()), "/games/DOOM");
//!     let reconciler = Reconciler::new(&config, "/tmp/provenance.json");
//!     reconciler.import(&["/mods/MAP01.wad".into()], ImportMode::Linked)?;
//!     let snapshot = reconciler.reconcile(true, false)?;
//!     for entry in &snapshot.entries {
//!         println!("{} {}", entry.entry.name, entry.classification.tag());
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod import;
pub mod index;
pub mod paths;
pub mod reconciler;
pub mod removal;
pub mod snapshot;
pub mod store;
pub mod watch;

pub use cache::FingerprintCache;
pub use classify::{
    Classification, ClassifiedEntry, Classifier, ClassifyOutcome, EntryKind, ManagedEntry,
    ProvenanceBasis, list_managed,
};
pub use config::EngineConfig;
pub use engine::{Engine, EngineOptions};
pub use error::{Error, ImportFailure, RemovalFailure, Result};
pub use filter::EntryFilter;
pub use import::{ImportAction, ImportEngine, ImportOutcome, ImportReport, ImportSuccess};
pub use index::{ContentIndexer, LibraryEntry, LibraryIndex, RebuildTicket, SupersedeCounter};
pub use paths::{StatePaths, default_managed_root};
pub use reconciler::Reconciler;
pub use removal::{RemovalAction, RemovalEngine, RemovalOutcome, RemovalReport};
pub use snapshot::{ClassificationSnapshot, EngineWarning};
pub use store::{ImportMode, MetadataStore, ProvenanceRecord};
pub use watch::{ReconcileRequest, WatchCoordinator, WatchRoot, WatchState};
