//! Filesystem primitives for modlink
//!
//! Provides atomic write/copy/link operations, streaming content
//! fingerprints and a format-agnostic config store. Nothing in here knows
//! about libraries or managed directories; that lives in `modlink-core`.

pub mod checksum;
pub mod config;
pub mod constants;
pub mod error;
pub mod io;
pub mod link;

pub use config::ConfigStore;
pub use constants::StateFile;
pub use error::{Error, Result};
