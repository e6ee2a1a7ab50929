//! Reading provenance written by the earlier flat store format
//!
//! The old format was a flat JSON object keyed by entry name, with
//! `source`, `mode` (`"symlink"` / `"copy"`) and an optional MD5 digest.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::Utc;
use serde::Deserialize;

use super::record::{ImportMode, ProvenanceRecord};

#[derive(Debug, Deserialize)]
struct LegacyRecord {
    #[serde(default)]
    source: PathBuf,
    #[serde(default)]
    mode: ImportMode,
    #[serde(default)]
    md5: Option<String>,
}

/// Convert a legacy flat document.
///
/// MD5 digests are kept as `md5:<hex>`, which never equals a SHA-256
/// fingerprint, so these records get re-validated against the library.
pub(crate) fn parse_flat(
    value: serde_json::Value,
) -> serde_json::Result<BTreeMap<String, ProvenanceRecord>> {
    let legacy: BTreeMap<String, LegacyRecord> = serde_json::from_value(value)?;
    let now = Utc::now();

    Ok(legacy
        .into_iter()
        .map(|(name, old)| {
            let record = ProvenanceRecord {
                name: name.clone(),
                source: old.source,
                fingerprint: old.md5.map(|d| format!("md5:{d}")).unwrap_or_default(),
                mode: old.mode,
                imported_at: now,
            };
            (name, record)
        })
        .collect())
}
