//! [`TestMirror`] fixture for library/managed directory scenarios.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary `library/` tree, flat `managed/` directory and `state/`
/// directory, all under one temp root.
///
/// Paths are canonical so they compare equal to what the engine reports.
///
/// # Example
///
/// ```rust,no_run
/// use modlink_test_utils::TestMirror;
///
/// let mirror = TestMirror::new();
/// let source = mirror.write_library_file("megawads/MAP01.wad", b"map");
/// mirror.write_managed_file("BOSS.wad", b"boss");
/// mirror.assert_managed_exists("BOSS.wad");
/// ```
pub struct TestMirror {
    _temp_dir: TempDir,
    root: PathBuf,
}

impl Default for TestMirror {
    fn default() -> Self {
        Self::new()
    }
}

impl TestMirror {
    /// Create the three directories under a fresh temp root.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = dunce::canonicalize(temp_dir.path()).unwrap();
        for dir in ["library", "managed", "state"] {
            fs::create_dir_all(root.join(dir)).unwrap();
        }
        Self {
            _temp_dir: temp_dir,
            root,
        }
    }

    /// Temp root containing everything else
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn library(&self) -> PathBuf {
        self.root.join("library")
    }

    pub fn managed(&self) -> PathBuf {
        self.root.join("managed")
    }

    pub fn state(&self) -> PathBuf {
        self.root.join("state")
    }

    /// Provenance store path inside the state directory
    pub fn store_path(&self) -> PathBuf {
        self.state().join("provenance.json")
    }

    /// Config file path inside the state directory
    pub fn config_path(&self) -> PathBuf {
        self.state().join("config.toml")
    }

    /// Write a file at `rel` under the library, creating parents.
    pub fn write_library_file(&self, rel: &str, content: &[u8]) -> PathBuf {
        write(&self.library().join(rel), content)
    }

    /// Write a regular file straight into the managed directory.
    pub fn write_managed_file(&self, name: &str, content: &[u8]) -> PathBuf {
        write(&self.managed().join(name), content)
    }

    /// Create a link `name` in the managed directory pointing at `target`.
    #[cfg(unix)]
    pub fn link_managed(&self, name: &str, target: &Path) -> PathBuf {
        let path = self.managed().join(name);
        std::os::unix::fs::symlink(target, &path)
            .unwrap_or_else(|e| panic!("link_managed: failed to link {name}: {e}"));
        path
    }

    /// Read a managed entry's content (following links).
    pub fn read_managed(&self, name: &str) -> Vec<u8> {
        let path = self.managed().join(name);
        fs::read(&path).unwrap_or_else(|e| panic!("Could not read {}: {e}", path.display()))
    }

    /// Whether the managed entry is a link (not followed).
    pub fn is_managed_link(&self, name: &str) -> bool {
        fs::symlink_metadata(self.managed().join(name))
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false)
    }

    /// Sorted names in the managed directory.
    pub fn managed_names(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.managed())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// Assert that the managed entry `name` exists (a dangling link counts).
    ///
    /// # Panics
    /// Panics with a descriptive message if the entry does not exist.
    pub fn assert_managed_exists(&self, name: &str) {
        let path = self.managed().join(name);
        assert!(
            fs::symlink_metadata(&path).is_ok(),
            "Expected managed entry to exist: {}",
            path.display()
        );
    }

    /// Assert that the managed entry `name` does **not** exist.
    ///
    /// # Panics
    /// Panics with a descriptive message if the entry exists.
    pub fn assert_managed_missing(&self, name: &str) {
        let path = self.managed().join(name);
        assert!(
            fs::symlink_metadata(&path).is_err(),
            "Expected managed entry NOT to exist: {}",
            path.display()
        );
    }

    /// Assert that the managed entry `name` holds exactly `content`.
    ///
    /// # Panics
    /// Panics if the entry cannot be read or differs.
    pub fn assert_managed_content(&self, name: &str, content: &[u8]) {
        let actual = self.read_managed(name);
        assert!(
            actual == content,
            "Managed entry {name} has unexpected content.\nExpected: {:?}\nActual: {:?}",
            String::from_utf8_lossy(content),
            String::from_utf8_lossy(&actual)
        );
    }
}

fn write(path: &Path, content: &[u8]) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap_or_else(|e| panic!("Could not write {}: {e}", path.display()));
    path.to_path_buf()
}
