//! Classification of managed-directory entries
//!
//! [`Classifier::classify`] is a pure function of the managed listing, the
//! library index and the provenance records. It does not touch the store
//! itself; the records it wants written (healed provenance) or dropped
//! (stale provenance) come back in the [`ClassifyOutcome`] for the caller to
//! apply inside its exclusion region.

mod listing;

pub use listing::list_managed;

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use serde::Serialize;

use crate::index::LibraryIndex;
use crate::store::{ImportMode, ProvenanceRecord};

/// What a managed entry is on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Link,
    File,
}

/// One entry of the managed directory, read fresh on every pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagedEntry {
    pub name: String,
    pub path: PathBuf,
    pub kind: EntryKind,
    /// Resolved link target, for links
    pub link_target: Option<PathBuf>,
    /// Whether a link's target is missing
    pub dangling: bool,
    /// Content fingerprint, for readable regular files
    pub fingerprint: Option<String>,
}

/// How the provenance of a copied entry was established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvenanceBasis {
    /// A stored provenance record matched
    Recorded,
    /// Derived from a library match (copy made elsewhere, or provenance lost)
    Inferred,
}

/// Classification tag of a managed entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "class", rename_all = "lowercase")]
pub enum Classification {
    /// A link; `broken` when its target is gone
    Linked {
        target: Option<PathBuf>,
        broken: bool,
    },
    /// A regular file traced back to a library file
    Copied {
        source: PathBuf,
        basis: ProvenanceBasis,
    },
    /// A regular file with no known origin
    Foreign,
}

impl Classification {
    /// Short tag for display and filtering
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Linked { .. } => "linked",
            Self::Copied { .. } => "copied",
            Self::Foreign => "foreign",
        }
    }

    pub fn is_linked(&self) -> bool {
        matches!(self, Self::Linked { .. })
    }

    pub fn is_copied(&self) -> bool {
        matches!(self, Self::Copied { .. })
    }

    pub fn is_foreign(&self) -> bool {
        matches!(self, Self::Foreign)
    }
}

/// An entry together with its classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedEntry {
    pub entry: ManagedEntry,
    pub classification: Classification,
}

/// Result of one classification pass
#[derive(Debug, Clone, Default)]
pub struct ClassifyOutcome {
    /// Entries in display order (case-insensitive by name)
    pub entries: Vec<ClassifiedEntry>,
    /// Provenance records to write (healed or corrected)
    pub heal: Vec<ProvenanceRecord>,
    /// Record names to drop (entry gone, or content no longer traceable)
    pub stale: Vec<String>,
}

/// Sort case-insensitively by name, exact name as tie-break.
pub(crate) fn sort_for_display<T>(items: &mut [T], name: impl Fn(&T) -> &str) {
    items.sort_by(|a, b| {
        let (a, b) = (name(a), name(b));
        a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
    });
}

/// Assigns a [`Classification`] to every managed entry
#[derive(Debug, Default, Clone, Copy)]
pub struct Classifier;

impl Classifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify `listing` against `index` and `records`.
    ///
    /// Per entry:
    /// 1. links are `linked` (flagged broken when dangling);
    /// 2. a regular file whose record fingerprint matches is `copied` from
    ///    the recorded source;
    /// 3. otherwise a library match (same name and content first, then
    ///    content alone, smallest path wins) makes it `copied` and yields a
    ///    healed record;
    /// 4. otherwise it is `foreign`.
    ///
    /// Records for names missing from the listing, and records that no
    /// longer describe a foreign entry's content, are reported as stale.
    pub fn classify(
        &self,
        listing: &[ManagedEntry],
        index: &LibraryIndex,
        records: &BTreeMap<String, ProvenanceRecord>,
    ) -> ClassifyOutcome {
        let mut outcome = ClassifyOutcome::default();
        let present: HashSet<&str> = listing.iter().map(|e| e.name.as_str()).collect();

        for entry in listing {
            let classification = self.classify_one(entry, index, records, &mut outcome);
            outcome.entries.push(ClassifiedEntry {
                entry: entry.clone(),
                classification,
            });
        }

        outcome.stale.extend(
            records
                .keys()
                .filter(|name| !present.contains(name.as_str()))
                .cloned(),
        );
        outcome.stale.sort();
        outcome.stale.dedup();

        sort_for_display(&mut outcome.entries, |e| e.entry.name.as_str());
        outcome
    }

    fn classify_one(
        &self,
        entry: &ManagedEntry,
        index: &LibraryIndex,
        records: &BTreeMap<String, ProvenanceRecord>,
        outcome: &mut ClassifyOutcome,
    ) -> Classification {
        if entry.kind == EntryKind::Link {
            return Classification::Linked {
                target: entry.link_target.clone(),
                broken: entry.dangling,
            };
        }

        // Unreadable file: no evidence either way, keep any record as is
        let Some(fingerprint) = entry.fingerprint.as_deref() else {
            return Classification::Foreign;
        };

        let record = records.get(&entry.name);
        if let Some(record) = record
            && record.fingerprint == fingerprint
        {
            if record.mode != ImportMode::Copied {
                outcome.heal.push(ProvenanceRecord {
                    mode: ImportMode::Copied,
                    ..record.refreshed()
                });
            }
            return Classification::Copied {
                source: record.source.clone(),
                basis: ProvenanceBasis::Recorded,
            };
        }

        if let Some(matched) = index.best_match(&entry.name, fingerprint) {
            outcome.heal.push(ProvenanceRecord::new(
                entry.name.clone(),
                matched.path.clone(),
                fingerprint,
                ImportMode::Copied,
            ));
            return Classification::Copied {
                source: matched.path.clone(),
                basis: ProvenanceBasis::Inferred,
            };
        }

        if record.is_some() {
            outcome.stale.push(entry.name.clone());
        }
        Classification::Foreign
    }
}
