//! Error types for queue and state operations.

use relay_persistence::PersistenceError;
use thiserror::Error;

/// Errors that can occur while reading or rewriting work records.
#[derive(Error, Debug)]
pub enum WorkError {
    /// Persistence error.
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Lock poisoned (thread panicked while holding lock).
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Result type alias for work operations.
pub type Result<T> = std::result::Result<T, WorkError>;
