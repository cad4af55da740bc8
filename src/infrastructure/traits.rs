//! I/O boundary traits for testability
//!
//! These traits abstract external I/O operations, allowing the session
//! to be tested with mock implementations.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Persisted boolean preferences, keyed by name.
///
/// Callers treat every failure as best-effort: a failed read means "unset".
pub trait PreferenceStore: Send + Sync {
    /// Read a preference. `Ok(None)` if it was never written.
    fn get(&self, key: &str) -> io::Result<Option<bool>>;

    /// Write a preference.
    fn set(&self, key: &str, value: bool) -> io::Result<()>;
}

// ============================================================
// REAL IMPLEMENTATIONS
// ============================================================

/// Preferences in a TOML file of `key = bool` pairs.
#[derive(Debug)]
pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> io::Result<BTreeMap<String, bool>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e),
        };
        toml::from_str(&content).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("parse {}: {}", self.path.display(), e),
            )
        })
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get(&self, key: &str) -> io::Result<Option<bool>> {
        Ok(self.read_all()?.get(key).copied())
    }

    fn set(&self, key: &str, value: bool) -> io::Result<()> {
        let mut all = self.read_all()?;
        all.insert(key.to_string(), value);
        let content = toml::to_string(&all)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, content)
    }
}

/// Same-session store used when no storage backend is reachable.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: Mutex<BTreeMap<String, bool>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> io::Result<Option<bool>> {
        let values = self
            .values
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "preference store poisoned"))?;
        Ok(values.get(key).copied())
    }

    fn set(&self, key: &str, value: bool) -> io::Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "preference store poisoned"))?;
        values.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_missing_file_when_get_then_unset() {
        let temp = tempfile::TempDir::new().unwrap();
        let store = FilePreferenceStore::new(temp.path().join("nested/prefs.toml"));
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn given_written_value_when_get_then_returns_it_and_keeps_other_keys() {
        let temp = tempfile::TempDir::new().unwrap();
        let store = FilePreferenceStore::new(temp.path().join("nested/prefs.toml"));

        store.set("a", true).unwrap();
        store.set("b", false).unwrap();

        assert_eq!(store.get("a").unwrap(), Some(true));
        assert_eq!(store.get("b").unwrap(), Some(false));
    }

    #[test]
    fn given_corrupt_file_when_get_then_invalid_data() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("prefs.toml");
        std::fs::write(&path, "not = [valid").unwrap();

        let err = FilePreferenceStore::new(&path).get("a").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn given_memory_store_when_set_then_get_in_same_session() {
        let store = MemoryPreferenceStore::new();
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", true).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(true));
    }
}
