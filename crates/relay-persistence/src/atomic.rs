//! Crash-safe file writes.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{PersistenceError, Result};

/// Replaces the file at `path` with `data` in one step.
///
/// The bytes go to a temp file in the same directory, are synced, and the
/// temp file is renamed over the target, so readers see either the old
/// contents or the new ones.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|source| PersistenceError::DirectoryError {
        path: dir.to_path_buf(),
        source,
    })?;

    let write_err = |source| PersistenceError::WriteError {
        path: path.to_path_buf(),
        source,
    };

    let mut staged = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    staged.write_all(data).map_err(write_err)?;
    staged.as_file().sync_all().map_err(write_err)?;
    staged.persist(path).map_err(|e| write_err(e.error))?;

    Ok(())
}

/// Serializes `value` as pretty JSON and writes it atomically.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &json)
}

/// Reads a JSON file, returning `None` when it does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(PersistenceError::ReadError {
            path: path.to_path_buf(),
            source,
        }),
    }
}
