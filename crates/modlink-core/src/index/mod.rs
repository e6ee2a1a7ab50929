//! Library index: content-addressed view of the library tree
//!
//! A [`LibraryIndex`] is an immutable snapshot built wholesale by the
//! [`ContentIndexer`]. Readers share it through an `Arc` and a rebuild
//! replaces the `Arc`, so nobody ever sees a half-built index.

mod indexer;

pub use indexer::{ContentIndexer, RebuildTicket, SupersedeCounter};

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// One library file as seen at index time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryEntry {
    pub path: PathBuf,
    pub file_name: String,
    pub fingerprint: String,
    pub size: u64,
}

/// Lookup tables over the library entries
///
/// Entry lists are kept sorted by path so every lookup that has to choose
/// between several candidates picks the lexicographically smallest path.
#[derive(Debug, Default)]
pub struct LibraryIndex {
    root: Option<PathBuf>,
    by_fingerprint: HashMap<String, Vec<LibraryEntry>>,
    by_name: HashMap<String, Vec<LibraryEntry>>,
    len: usize,
}

fn name_key(name: &str) -> String {
    name.to_lowercase()
}

impl LibraryIndex {
    /// An index with no entries and no root (nothing indexed yet)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build an index from entries.
    pub fn from_entries(root: Option<PathBuf>, entries: impl IntoIterator<Item = LibraryEntry>) -> Self {
        let mut index = Self {
            root,
            ..Self::default()
        };
        for entry in entries {
            index
                .by_name
                .entry(name_key(&entry.file_name))
                .or_default()
                .push(entry.clone());
            index
                .by_fingerprint
                .entry(entry.fingerprint.clone())
                .or_default()
                .push(entry);
            index.len += 1;
        }
        for list in index
            .by_fingerprint
            .values_mut()
            .chain(index.by_name.values_mut())
        {
            list.sort_by(|a, b| a.path.cmp(&b.path));
        }
        index
    }

    /// Root the index was built from
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// All entries with this fingerprint, sorted by path
    pub fn by_fingerprint(&self, fingerprint: &str) -> &[LibraryEntry] {
        self.by_fingerprint
            .get(fingerprint)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All entries with this file name (case-insensitive), sorted by path
    pub fn by_name(&self, file_name: &str) -> &[LibraryEntry] {
        self.by_name
            .get(&name_key(file_name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Entry matching both name (case-insensitive) and fingerprint
    pub fn find_exact(&self, file_name: &str, fingerprint: &str) -> Option<&LibraryEntry> {
        self.by_name(file_name)
            .iter()
            .find(|entry| entry.fingerprint == fingerprint)
    }

    /// Best match for content: an exact name match if there is one, else the
    /// content-only match with the smallest path.
    pub fn best_match(&self, file_name: &str, fingerprint: &str) -> Option<&LibraryEntry> {
        self.find_exact(file_name, fingerprint)
            .or_else(|| self.by_fingerprint(fingerprint).first())
    }

    /// Iterate over all entries (grouped by fingerprint, no particular order)
    pub fn entries(&self) -> impl Iterator<Item = &LibraryEntry> {
        self.by_fingerprint.values().flatten()
    }

    /// Number of distinct fingerprints
    pub fn distinct_contents(&self) -> usize {
        self.by_fingerprint.len()
    }
}
