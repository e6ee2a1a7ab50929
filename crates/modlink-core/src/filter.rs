//! Which files take part in indexing and classification

use std::path::Path;

/// Extension allow-list; empty means every file is accepted.
///
/// Extensions are compared case-insensitively and may be given with or
/// without a leading dot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFilter {
    extensions: Vec<String>,
}

impl EntryFilter {
    /// Accept every file
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new<S: AsRef<str>>(extensions: impl IntoIterator<Item = S>) -> Self {
        let extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self { extensions }
    }

    /// Whether a file with this name is accepted
    pub fn allows(&self, name: &str) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        Path::new(name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| self.extensions.iter().any(|allowed| *allowed == ext))
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }
}
