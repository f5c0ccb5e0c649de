//! Error types for process and tmux operations.

use std::time::Duration;

use thiserror::Error;

/// Why a process adapter call failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    /// The program is not installed or not in PATH.
    #[error("{0} not found in PATH")]
    NotInstalled(String),

    /// Session not found.
    #[error("session '{0}' not found")]
    SessionNotFound(String),

    /// Session name tmux cannot target unambiguously.
    #[error("invalid session name {0:?}: use letters, digits, '-' or '_'")]
    InvalidSessionName(String),

    /// The command ran and exited unsuccessfully.
    #[error("command failed: {stderr}")]
    CommandFailed { code: Option<i32>, stderr: String },

    /// The command did not finish before its deadline.
    #[error("command timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The command produced more output than allowed.
    #[error("command output exceeded {0} bytes")]
    OutputOverflow(usize),

    /// Spawning or talking to the process failed.
    #[error("io error: {0}")]
    Io(String),
}

impl ProcessError {
    /// Returns true for deadline failures, which are worth retrying.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProcessError::Timeout(_))
    }
}

/// Result type alias for process operations.
pub type Result<T> = std::result::Result<T, ProcessError>;
