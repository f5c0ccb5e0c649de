//! Key-value stores for whole-record persistence.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::atomic::{read_json, write_json};
use crate::error::{PersistenceError, Result};

/// Storage collaborator for relay state.
///
/// Each key holds one JSON document that is always read and written whole.
pub trait KeyValueStore: Send + Sync {
    /// Returns the document stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Replaces the document stored under `key`.
    fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Removes `key`. Missing keys are not an error.
    fn delete(&self, key: &str) -> Result<()>;

    /// Lists all keys, sorted.
    fn list(&self) -> Result<Vec<String>>;
}

/// Loads and deserializes the document under `key`.
pub fn load_typed<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Serializes `value` and stores it under `key`.
pub fn save_typed<T: Serialize + ?Sized>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    store.set(key, serde_json::to_value(value)?)
}

fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(PersistenceError::InvalidKey(key.to_string()))
    }
}

/// Stores each key as `{base_path}/{key}.json`.
///
/// ```text
/// base_path/
/// ├── channels.json
/// ├── jobs.json
/// └── session-state.json
/// ```
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    base_path: PathBuf,
}

impl JsonFileStore {
    /// Creates a store rooted at `base_path`. The directory is created on first write.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Returns the directory this store writes to.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn record_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.base_path.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.record_path(key)?;
        trace!(path = %path.display(), "reading record");
        read_json(&path)
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let path = self.record_path(key)?;
        debug!(path = %path.display(), "writing record");
        write_json(&path, &value)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.record_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(PersistenceError::WriteError { path, source }),
        }
    }

    fn list(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.base_path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(PersistenceError::ReadError {
                    path: self.base_path.clone(),
                    source,
                })
            }
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| PersistenceError::ReadError {
                path: self.base_path.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    keys.push(stem.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// In-memory store, mainly for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Value>>> {
        self.records
            .lock()
            .map_err(|e| PersistenceError::LockPoisoned(e.to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        validate_key(key)?;
        self.lock()?.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }
}
