//! Error types for modlink-core
//!
//! [`Error`] covers failures of a whole operation. Failures that only affect
//! one file of a batch are values ([`ImportFailure`], [`RemovalFailure`])
//! carried in the batch outcome, so one bad file never aborts the rest.

use std::path::PathBuf;

/// Result type for modlink-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in modlink-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Library root missing or unreadable; the previous index stays in use
    #[error("Library root {path} is not readable: {reason}")]
    LibraryUnreadable { path: PathBuf, reason: String },

    /// A newer rebuild was requested before this one finished
    #[error("Index rebuild superseded by a newer request")]
    RebuildSuperseded,

    /// Metadata store could not be parsed
    #[error("Provenance store {path} is corrupt: {message}")]
    StoreCorrupt { path: PathBuf, message: String },

    /// The managed directory cannot be opened, nothing can be reconciled
    #[error("Managed directory {path} is not available: {reason}")]
    ManagedRootUnavailable { path: PathBuf, reason: String },

    /// No library root configured
    #[error("No library directory configured")]
    LibraryNotConfigured,

    /// Filesystem subscription could not be established
    #[error("Watch error: {reason}")]
    Watch { reason: String },

    /// The change-notification channel dropped events
    #[error("Filesystem notifications overflowed; a full rescan is required")]
    WatchOverflow,

    /// The background worker is no longer running
    #[error("Engine worker has stopped")]
    EngineStopped,

    // Transparent wrappers for underlying crate errors
    /// Filesystem error from modlink-fs
    #[error(transparent)]
    Fs(#[from] modlink_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<notify::Error> for Error {
    fn from(e: notify::Error) -> Self {
        Error::Watch {
            reason: e.to_string(),
        }
    }
}

/// Why a single file could not be imported
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImportFailure {
    #[error("Permission denied writing {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Creating links requires elevated privileges or Developer Mode ({path})")]
    LinkPrivilege { path: PathBuf },

    #[error("Source file not found: {path}")]
    SourceMissing { path: PathBuf },

    #[error("Source is not a regular file: {path}")]
    SourceNotAFile { path: PathBuf },

    #[error("Source {path} is already in the managed directory")]
    SourceInManagedDirectory { path: PathBuf },

    #[error("Managed directory is not writable: {reason}")]
    DestinationUnwritable { reason: String },

    #[error("Source {path} changed while it was being copied")]
    ContentMismatch { path: PathBuf },

    #[error("I/O error on {path}: {message}")]
    Io { path: PathBuf, message: String },
}

/// Why a single managed entry could not be removed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemovalFailure {
    #[error("Permission denied removing {name}")]
    PermissionDenied { name: String },

    #[error("Not a plain entry name: {name:?}")]
    InvalidName { name: String },

    #[error("{name} is a directory, not a managed entry")]
    NotAnEntry { name: String },

    #[error("I/O error removing {name}: {message}")]
    Io { name: String, message: String },
}
