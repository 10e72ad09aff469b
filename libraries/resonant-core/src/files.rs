//! File access abstraction
//!
//! Impulse responses, DDC files and liveprog scripts are referenced from the
//! settings store by path. Relative paths are resolved against a library root
//! so presets stay portable between installations.

use crate::error::{CoreError, Result};
use std::path::{Path, PathBuf};

/// File access used by the engine and the script document
pub trait FileStore: Send + Sync {
    /// Resolve a stored path into a full path
    fn resolve(&self, path: &str) -> PathBuf;

    /// Check whether the path points to an existing regular file
    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    /// Read a whole file as UTF-8 text
    fn read_to_string(&self, path: &Path) -> Result<String> {
        if !self.is_file(path) {
            return Err(CoreError::FileNotFound(path.display().to_string()));
        }
        Ok(std::fs::read_to_string(path)?)
    }

    /// Read a whole file as bytes
    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        if !self.is_file(path) {
            return Err(CoreError::FileNotFound(path.display().to_string()));
        }
        Ok(std::fs::read(path)?)
    }

    /// Replace a file's contents
    fn write_string(&self, path: &Path, contents: &str) -> Result<()> {
        Ok(std::fs::write(path, contents)?)
    }
}

/// Local filesystem rooted at a library directory
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    /// Create a store resolving relative paths against `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Library root directory
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Default for LocalFileStore {
    fn default() -> Self {
        Self::new(".")
    }
}

impl FileStore for LocalFileStore {
    fn resolve(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_paths_against_root() {
        let store = LocalFileStore::new("/library");
        assert_eq!(
            store.resolve("Convolver/hall.wav"),
            PathBuf::from("/library/Convolver/hall.wav")
        );
        assert_eq!(store.resolve("/abs/ir.wav"), PathBuf::from("/abs/ir.wav"));
    }

    #[test]
    fn directories_are_not_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());
        assert!(!store.is_file(dir.path()));
        assert!(matches!(
            store.read_to_string(dir.path()),
            Err(CoreError::FileNotFound(_))
        ));
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());
        let path = store.resolve("script.eel");

        store.write_string(&path, "gain = 1;").unwrap();
        assert!(store.is_file(&path));
        assert_eq!(store.read_to_string(&path).unwrap(), "gain = 1;");
    }
}
