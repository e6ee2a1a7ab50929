//! SHA-256 content fingerprints
//!
//! Provides a single canonical fingerprint format (`sha256:<hex>`) used
//! throughout the workspace for content identity, independent of file name.
//! Files are hashed in fixed-size chunks so large files never have to fit in
//! memory and a long hash can be abandoned between chunks.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

/// Prefix for all fingerprints produced by this module
const PREFIX: &str = "sha256:";

const CHUNK_SIZE: usize = 64 * 1024;

fn finish(hasher: Sha256) -> String {
    format!("{}{:x}", PREFIX, hasher.finalize())
}

/// Compute the fingerprint of in-memory content.
pub fn compute_content_checksum(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    finish(hasher)
}

/// Compute the fingerprint of a file's contents.
///
/// Follows links: the fingerprint of a link is the fingerprint of its target.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn compute_file_checksum(path: &Path) -> io::Result<String> {
    compute_file_checksum_interruptible(path, || false)
        .map(|checksum| checksum.unwrap_or_default())
}

/// Compute a file fingerprint, polling `interrupted` between chunks.
///
/// Returns `Ok(None)` if `interrupted` reported true before hashing finished.
pub fn compute_file_checksum_interruptible(
    path: &Path,
    interrupted: impl Fn() -> bool,
) -> io::Result<Option<String>> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        if interrupted() {
            return Ok(None);
        }
        let read = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..read]);
    }

    Ok(Some(finish(hasher)))
}

/// A writer that fingerprints everything written through it.
pub(crate) struct ChecksumWriter<W> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> ChecksumWriter<W> {
    pub(crate) fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    pub(crate) fn into_parts(self) -> (W, String) {
        (self.inner, finish(self.hasher))
    }
}

impl<W: Write> Write for ChecksumWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.hasher.update(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
