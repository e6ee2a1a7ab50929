//! Per-user state locations and one-time legacy migration

use std::fs;
use std::path::{Path, PathBuf};

use modlink_fs::StateFile;
use modlink_fs::constants::APP_DIR_NAME;
use tracing::{debug, info, warn};

/// Where configuration and provenance live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    state_dir: PathBuf,
    legacy_dir: Option<PathBuf>,
}

impl StatePaths {
    /// Per-user locations: `<config_dir>/modlink`, with the directory of the
    /// running executable as the legacy location.
    ///
    /// Falls back to the home directory, then the current directory, when
    /// the platform reports no config directory.
    pub fn resolve() -> Self {
        let base = dirs::config_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        let legacy_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        Self {
            state_dir: base.join(APP_DIR_NAME),
            legacy_dir,
        }
    }

    /// Explicit state directory, no legacy location
    pub fn at(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            legacy_dir: None,
        }
    }

    pub fn with_legacy_dir(mut self, legacy_dir: impl Into<PathBuf>) -> Self {
        self.legacy_dir = Some(legacy_dir.into());
        self
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn legacy_dir(&self) -> Option<&Path> {
        self.legacy_dir.as_deref()
    }

    pub fn file(&self, file: StateFile) -> PathBuf {
        self.state_dir.join(file)
    }

    pub fn config_file(&self) -> PathBuf {
        self.file(StateFile::Config)
    }

    pub fn store_file(&self) -> PathBuf {
        self.file(StateFile::Provenance)
    }

    /// Copy state files from the legacy directory when the per-user copy is
    /// absent. The legacy files are never deleted.
    ///
    /// Returns the files that were migrated. A file that fails to copy is
    /// logged and skipped; the new location is then simply used fresh.
    pub fn migrate_legacy(&self) -> Vec<PathBuf> {
        let Some(legacy_dir) = &self.legacy_dir else {
            return Vec::new();
        };
        if legacy_dir == &self.state_dir {
            return Vec::new();
        }

        let mut migrated = Vec::new();
        for file in StateFile::all() {
            let old = legacy_dir.join(file);
            let new = self.file(file);
            if new.exists() || !old.is_file() {
                continue;
            }
            let content = match fs::read(&old) {
                Ok(content) => content,
                Err(e) => {
                    warn!(path = %old.display(), error = %e, "cannot read legacy state");
                    continue;
                }
            };
            match modlink_fs::io::write_atomic(&new, &content) {
                Ok(()) => {
                    info!(from = %old.display(), to = %new.display(), "migrated legacy state");
                    migrated.push(new);
                }
                Err(e) => warn!(path = %new.display(), error = %e, "legacy migration failed"),
            }
        }
        if migrated.is_empty() {
            debug!(legacy = %legacy_dir.display(), "no legacy state to migrate");
        }
        migrated
    }
}

const STEAM_APP_ID: &str = "2280";
const ENGINE_MARKER: &str = "kexengine.cfg";

fn saved_games(home: &Path) -> PathBuf {
    home.join("Saved Games").join("Nightdive Studios").join("DOOM")
}

/// `compatdata/<id>/pfx/drive_c/users/steamuser/Saved Games/...`
fn proton_saved_games(compat_root: &Path, id: &str) -> PathBuf {
    saved_games(
        &compat_root
            .join(id)
            .join("pfx")
            .join("drive_c")
            .join("users")
            .join("steamuser"),
    )
}

fn has_marker(dir: &Path) -> bool {
    dir.is_dir() && dir.join(ENGINE_MARKER).is_file()
}

/// Best guess at the engine's local-mod directory under `home`.
///
/// On Windows this is `~/Saved Games/Nightdive Studios/DOOM`. Elsewhere the
/// Steam Proton prefix of the canonical app id is tried first, then any
/// prefix with the same layout, both only when `kexengine.cfg` is present;
/// otherwise the Windows-style path under `home`.
pub fn default_managed_root_in(home: &Path) -> PathBuf {
    if cfg!(windows) {
        return saved_games(home);
    }

    let compat_root = home
        .join(".local")
        .join("share")
        .join("Steam")
        .join("steamapps")
        .join("compatdata");

    let canonical = proton_saved_games(&compat_root, STEAM_APP_ID);
    if has_marker(&canonical) {
        return canonical;
    }

    if let Ok(entries) = fs::read_dir(&compat_root) {
        let mut ids: Vec<String> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        ids.sort();
        if let Some(found) = ids
            .iter()
            .map(|id| proton_saved_games(&compat_root, id))
            .find(|dir| has_marker(dir))
        {
            return found;
        }
    }

    saved_games(home)
}

/// [`default_managed_root_in`] for the current user's home directory.
pub fn default_managed_root() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    default_managed_root_in(&home)
}
