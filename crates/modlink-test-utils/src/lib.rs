//! Shared test utilities for the modlink workspace.
//!
//! Dev-dependency only, never published. Deliberately independent of
//! `modlink-core` so core's own tests can use it.
//!
//! # Modules
//!
//! - [`mirror`] — [`TestMirror`]: temporary library tree, managed directory
//!   and state directory

pub mod mirror;

pub use mirror::TestMirror;
