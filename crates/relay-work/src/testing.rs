//! Store double whose writes can be made to fail.

use std::io;
use std::sync::Mutex;

use relay_persistence::{KeyValueStore, MemoryStore, PersistenceError};
use serde_json::Value;

/// Wraps a [`MemoryStore`] and rejects writes while `failing` is set.
#[derive(Default)]
pub(crate) struct FailingStore {
    inner: MemoryStore,
    failing: Mutex<bool>,
}

impl FailingStore {
    pub(crate) fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }
}

impl KeyValueStore for FailingStore {
    fn get(&self, key: &str) -> relay_persistence::Result<Option<Value>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: Value) -> relay_persistence::Result<()> {
        if *self.failing.lock().unwrap() {
            return Err(PersistenceError::WriteError {
                path: key.into(),
                source: io::Error::other("disk full"),
            });
        }
        self.inner.set(key, value)
    }

    fn delete(&self, key: &str) -> relay_persistence::Result<()> {
        self.inner.delete(key)
    }

    fn list(&self) -> relay_persistence::Result<Vec<String>> {
        self.inner.list()
    }
}
