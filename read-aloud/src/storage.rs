//! Key-value storage backends.
//!
//! ## File Location
//!
//! [`JsonFileStorage::default_path`] stores everything in
//! `~/.read-aloud.json`, a single JSON object mapping keys to string values.
//!
//! ## Atomicity
//!
//! Writes use a temp file + rename pattern so the file is never left
//! partially written if the process is interrupted.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::errors::StorageError;
use crate::traits::KeyValueStore;

/// Default storage file name.
const STORAGE_FILE_NAME: &str = ".read-aloud.json";

/// File-backed store holding every key in one JSON object.
///
/// ## Examples
///
/// ```no_run
/// use read_aloud::{JsonFileStorage, KeyValueStore};
///
/// let storage = JsonFileStorage::new("/tmp/read-aloud.json");
/// storage.write("userSettings", "{}").unwrap();
/// assert_eq!(storage.read("userSettings").unwrap().as_deref(), Some("{}"));
/// ```
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `~/.read-aloud.json`.
    ///
    /// ## Errors
    ///
    /// Returns `StorageError::NoHomeDirectory` if the home directory cannot
    /// be determined.
    pub fn default_path() -> Result<Self, StorageError> {
        let home = dirs::home_dir().ok_or(StorageError::NoHomeDirectory)?;
        Ok(Self::new(home.join(STORAGE_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>, StorageError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let contents = fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        Ok(serde_json::from_str(&contents)?)
    }

    /// Read the map for a write; a corrupt file is replaced.
    fn read_map_for_update(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match self.read_map() {
            Err(StorageError::Malformed(e)) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Discarding malformed storage file"
                );
                Ok(BTreeMap::new())
            }
            other => other,
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(map)?;
        write_atomically(&self.path, json.as_bytes()).map_err(|e| self.io_error(e))
    }
}

impl KeyValueStore for JsonFileStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read_map()?.remove(key))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut map = self.read_map_for_update()?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut map = self.read_map_for_update()?;
        if map.remove(key).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

/// Write the file atomically using temp file + rename.
fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), std::io::Error> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    // Same directory as the target so the rename stays on one filesystem
    let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
    temp_file.write_all(contents)?;
    temp_file.flush()?;
    temp_file.persist(path).map_err(|e| e.error)?;

    Ok(())
}

/// In-process store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}
