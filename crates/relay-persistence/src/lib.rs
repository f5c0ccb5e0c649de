//! Persistence layer for tmux-relay.
//!
//! Relay components persist whole records through the [`KeyValueStore`]
//! trait so the queue and state tracker never depend on a file layout.
//! Two stores are provided:
//!
//! - [`JsonFileStore`]: one pretty-printed JSON file per key, written
//!   atomically (temp file, then rename)
//! - [`MemoryStore`]: an in-process map, used in tests
//!
//! # Example
//!
//! ```no_run
//! use relay_persistence::{JsonFileStore, KeyValueStore};
//! use serde_json::json;
//!
//! let store = JsonFileStore::new("/tmp/relay");
//! store.set("channels", json!({"general": "relay-general"})).unwrap();
//! assert!(store.get("channels").unwrap().is_some());
//! ```

pub mod atomic;
pub mod error;
pub mod store;

pub use error::{PersistenceError, Result};
pub use store::{load_typed, save_typed, JsonFileStore, KeyValueStore, MemoryStore};
