//! Fingerprint cache keyed by path, size and modification time
//!
//! Only ever an optimization: an entry is reused only while the file's size
//! and mtime are unchanged, files without a readable mtime are never cached,
//! and [`FingerprintCache::clear`] forces every file to be rehashed.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use modlink_fs::checksum;
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Stamp {
    len: u64,
    modified: SystemTime,
}

impl Stamp {
    fn of(meta: &fs::Metadata) -> Option<Self> {
        Some(Self {
            len: meta.len(),
            modified: meta.modified().ok()?,
        })
    }
}

/// Shared, thread-safe fingerprint cache
#[derive(Debug, Default)]
pub struct FingerprintCache {
    entries: Mutex<HashMap<PathBuf, (Stamp, String)>>,
}

impl FingerprintCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fingerprint `path` (following links), reusing a cached value when the
    /// file is unchanged.
    pub fn fingerprint(&self, path: &Path) -> io::Result<String> {
        self.fingerprint_interruptible(path, || false)
            .map(Option::unwrap_or_default)
    }

    /// Like [`Self::fingerprint`], abandoning the hash when `interrupted`
    /// reports true. Returns `Ok(None)` in that case.
    pub fn fingerprint_interruptible(
        &self,
        path: &Path,
        interrupted: impl Fn() -> bool,
    ) -> io::Result<Option<String>> {
        let stamp = Stamp::of(&fs::metadata(path)?);

        if let Some(stamp) = stamp
            && let Some((cached, fingerprint)) = self.entries.lock().get(path)
            && *cached == stamp
        {
            return Ok(Some(fingerprint.clone()));
        }

        let fingerprint = checksum::compute_file_checksum_interruptible(path, interrupted)?;
        if let (Some(stamp), Some(fp)) = (stamp, &fingerprint) {
            self.entries
                .lock()
                .insert(path.to_path_buf(), (stamp, fp.clone()));
        }
        Ok(fingerprint)
    }

    /// Drop the cached value for one path.
    pub fn invalidate(&self, path: &Path) {
        self.entries.lock().remove(path);
    }

    /// Keep only entries whose path satisfies `keep`.
    pub fn retain(&self, keep: impl Fn(&Path) -> bool) {
        self.entries.lock().retain(|path, _| keep(path));
    }

    /// Forget everything; the next lookups rehash from disk.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
