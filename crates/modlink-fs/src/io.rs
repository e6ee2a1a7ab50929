//! Atomic I/O operations with file locking
//!
//! Every operation that places something at a destination path first builds
//! it under a hidden temp name in the same directory and then renames it
//! into place, so readers only ever see the old entry or the complete new
//! one.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use fs2::FileExt;

use crate::checksum::ChecksumWriter;
use crate::{Error, Result, link};

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Build a temp path next to `dest` (same directory, so rename stays on one filesystem).
///
/// Names look like `.<file>.<pid>.<seq>.tmp`.
pub fn temp_path_for(dest: &Path) -> PathBuf {
    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_name = format!(
        ".{}.{}.{}.tmp",
        file_name,
        std::process::id(),
        TEMP_SEQ.fetch_add(1, Ordering::Relaxed)
    );
    dest.with_file_name(temp_name)
}

/// Whether a directory entry name has the exact shape [`temp_path_for`]
/// produces. Other hidden `.tmp` files are ordinary entries.
pub fn is_temp_artifact(name: &str) -> bool {
    let Some(inner) = name
        .strip_prefix('.')
        .and_then(|rest| rest.strip_suffix(".tmp"))
    else {
        return false;
    };
    let is_number = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    let mut parts = inner.rsplitn(3, '.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(seq), Some(pid), Some(file)) => !file.is_empty() && is_number(pid) && is_number(seq),
        _ => false,
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    Ok(())
}

/// Rename `temp` over `dest`, removing `temp` if the rename fails.
fn commit(temp: &Path, dest: &Path) -> Result<()> {
    fs::rename(temp, dest).map_err(|e| {
        let _ = fs::remove_file(temp);
        Error::io(dest, e)
    })
}

/// Write content atomically to a file with locking.
///
/// Uses write-to-temp-then-rename strategy to prevent partial writes.
/// Acquires an advisory lock to prevent concurrent access.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    ensure_parent(path)?;
    let temp_path = temp_path_for(path);

    let write = || -> Result<()> {
        let mut temp_file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .map_err(|e| Error::io(&temp_path, e))?;

        temp_file.lock_exclusive().map_err(|_| Error::LockFailed {
            path: path.to_path_buf(),
        })?;
        temp_file
            .write_all(content)
            .map_err(|e| Error::io(&temp_path, e))?;
        temp_file.sync_all().map_err(|e| Error::io(&temp_path, e))?;
        temp_file.unlock().map_err(|_| Error::LockFailed {
            path: path.to_path_buf(),
        })?;
        Ok(())
    };

    if let Err(e) = write() {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }
    commit(&temp_path, path)
}

/// Read a whole file while holding a shared lock on it.
pub fn read_locked(path: &Path) -> Result<Vec<u8>> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    file.lock_shared().map_err(|_| Error::LockFailed {
        path: path.to_path_buf(),
    })?;

    // Read through the locked handle to avoid a TOCTOU race
    let mut content = Vec::new();
    (&file)
        .read_to_end(&mut content)
        .map_err(|e| Error::io(path, e))?;
    Ok(content)
}

/// Copy `source` to `dest` byte for byte, atomically.
///
/// The bytes are fingerprinted while they are written; if the result does
/// not equal `expected` (the source changed mid-copy) the temp file is
/// discarded and [`Error::ChecksumMismatch`] is returned, leaving `dest`
/// untouched. An existing `dest` (file or link) is replaced, never followed.
pub fn copy_atomic(source: &Path, dest: &Path, expected: &str) -> Result<u64> {
    let temp_path = temp_path_for(dest);

    let copy = || -> Result<u64> {
        let mut input = File::open(source).map_err(|e| Error::io(source, e))?;
        let output = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .map_err(|e| Error::io(&temp_path, e))?;
        output.lock_exclusive().map_err(|_| Error::LockFailed {
            path: dest.to_path_buf(),
        })?;

        let mut writer = ChecksumWriter::new(output);
        let copied = std::io::copy(&mut input, &mut writer).map_err(|e| Error::io(dest, e))?;
        let (output, actual) = writer.into_parts();
        output.sync_all().map_err(|e| Error::io(&temp_path, e))?;

        if actual != expected {
            return Err(Error::ChecksumMismatch {
                path: source.to_path_buf(),
                expected: expected.to_string(),
                actual,
            });
        }
        Ok(copied)
    };

    match copy() {
        Ok(copied) => {
            commit(&temp_path, dest)?;
            tracing::debug!(source = %source.display(), dest = %dest.display(), bytes = copied, "copied");
            Ok(copied)
        }
        Err(e) => {
            let _ = fs::remove_file(&temp_path);
            Err(e)
        }
    }
}

/// Create a link at `dest` pointing to `target`, atomically replacing any
/// existing entry at `dest`.
pub fn link_atomic(target: &Path, dest: &Path) -> Result<()> {
    let temp_path = temp_path_for(dest);
    link::create_file_link(target, &temp_path).map_err(|e| Error::io(dest, e))?;
    commit(&temp_path, dest)?;
    tracing::debug!(target = %target.display(), dest = %dest.display(), "linked");
    Ok(())
}
