//! Well-known names for per-user state.

use std::path::Path;

/// Directory name used under the platform config directory.
pub const APP_DIR_NAME: &str = "modlink";

/// Files modlink keeps in its per-user state directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateFile {
    /// Engine configuration (`config.toml`)
    Config,
    /// Provenance records for managed entries (`provenance.json`)
    Provenance,
}

impl StateFile {
    /// Get the file name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "config.toml",
            Self::Provenance => "provenance.json",
        }
    }

    /// All state files, in migration order.
    pub fn all() -> [StateFile; 2] {
        [Self::Config, Self::Provenance]
    }
}

impl AsRef<Path> for StateFile {
    fn as_ref(&self) -> &Path {
        Path::new(self.as_str())
    }
}

impl std::fmt::Display for StateFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
