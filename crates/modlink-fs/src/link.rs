//! Filesystem link inspection and creation
//!
//! "Link" here means a symbolic link. On Windows creating one may require
//! Developer Mode or elevation; callers get the raw OS error to report.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Windows `ERROR_PRIVILEGE_NOT_HELD`, returned when symlink creation is not permitted.
pub const ERROR_PRIVILEGE_NOT_HELD: i32 = 1314;

/// Create a file link at `link` that resolves to `target`.
#[cfg(unix)]
pub fn create_file_link(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

/// Create a file link at `link` that resolves to `target`.
#[cfg(windows)]
pub fn create_file_link(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

/// Whether `path` itself is a link (does not follow it).
pub fn is_link(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

/// Read a link's target, resolving a relative target against the link's directory.
pub fn resolve_link(link: &Path) -> io::Result<PathBuf> {
    let target = fs::read_link(link)?;
    if target.is_absolute() {
        return Ok(target);
    }
    Ok(link
        .parent()
        .map(|parent| parent.join(&target))
        .unwrap_or(target))
}

/// Whether a link's target is missing.
pub fn is_dangling(link: &Path) -> bool {
    fs::metadata(link).is_err()
}

/// Whether an I/O error means the caller lacks the privilege to create links.
pub fn is_link_privilege_error(err: &io::Error) -> bool {
    cfg!(windows) && err.raw_os_error() == Some(ERROR_PRIVILEGE_NOT_HELD)
}
