//! Error types for the engine.
//!
//! Every failure a caller can see is one of a closed set of kinds. Each
//! carries a discriminator ([`ErrorKind`]) for code and a remediation text
//! ([`EngineError::user_guide`]) for people.

use std::fmt;
use std::time::Duration;

use relay_dsl::DslError;
use relay_persistence::PersistenceError;
use relay_tmux::ProcessError;
use relay_work::WorkError;
use serde::Serialize;
use thiserror::Error;

/// Machine-checkable error discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MixedCharacter,
    DslParse,
    ProcessCommand,
    ProcessTimeout,
    SessionNotConfigured,
    InvalidSessionName,
    Storage,
}

impl ErrorKind {
    /// True if the user can fix the problem by changing their input or setup.
    pub fn is_user_fixable(&self) -> bool {
        matches!(
            self,
            ErrorKind::MixedCharacter
                | ErrorKind::DslParse
                | ErrorKind::SessionNotConfigured
                | ErrorKind::InvalidSessionName
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::MixedCharacter => "mixed_character",
            ErrorKind::DslParse => "dsl_parse",
            ErrorKind::ProcessCommand => "process_command",
            ErrorKind::ProcessTimeout => "process_timeout",
            ErrorKind::SessionNotConfigured => "session_not_configured",
            ErrorKind::InvalidSessionName => "invalid_session_name",
            ErrorKind::Storage => "storage",
        };
        f.write_str(s)
    }
}

/// Errors returned by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A backtick run mixed key letters with other characters.
    #[error("{0}")]
    MixedCharacter(DslError),

    /// The key notation is malformed.
    #[error("{0}")]
    DslParse(DslError),

    /// A tmux call failed.
    #[error("tmux command failed for session '{session}': {source}")]
    ProcessCommand {
        session: String,
        #[source]
        source: ProcessError,
    },

    /// A tmux call exceeded its deadline.
    #[error("tmux command for session '{session}' timed out after {}s", .timeout.as_secs())]
    ProcessTimeout { session: String, timeout: Duration },

    /// The channel has no session bound to it.
    #[error("channel '{channel_id}' has no session configured")]
    SessionNotConfigured { channel_id: String },

    /// A binding names a session tmux cannot target.
    #[error("invalid session name '{session}' for channel '{channel_id}'")]
    InvalidSessionName { channel_id: String, session: String },

    /// Reading or writing persisted records failed.
    #[error("storage error: {0}")]
    Storage(#[from] WorkError),
}

impl EngineError {
    /// Wraps an adapter failure for `session`, separating out deadlines.
    pub fn process(session: &str, error: ProcessError) -> Self {
        match error {
            ProcessError::Timeout(timeout) => EngineError::ProcessTimeout {
                session: session.to_string(),
                timeout,
            },
            source => EngineError::ProcessCommand {
                session: session.to_string(),
                source,
            },
        }
    }

    /// Returns the discriminator for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::MixedCharacter(_) => ErrorKind::MixedCharacter,
            EngineError::DslParse(_) => ErrorKind::DslParse,
            EngineError::ProcessCommand { .. } => ErrorKind::ProcessCommand,
            EngineError::ProcessTimeout { .. } => ErrorKind::ProcessTimeout,
            EngineError::SessionNotConfigured { .. } => ErrorKind::SessionNotConfigured,
            EngineError::InvalidSessionName { .. } => ErrorKind::InvalidSessionName,
            EngineError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Remediation text suitable for showing to the user.
    pub fn user_guide(&self) -> String {
        match self {
            EngineError::MixedCharacter(err) | EngineError::DslParse(err) => err.user_guide(),
            EngineError::ProcessCommand { session, source } => match source {
                ProcessError::NotInstalled(program) => format!(
                    "{program} is not installed or not on PATH. Install it on the host running the relay."
                ),
                ProcessError::SessionNotFound(_) => format!(
                    "Session '{session}' is not running. It is created again on the next prompt, \
                     or remove the binding if the channel is no longer used."
                ),
                _ => format!(
                    "tmux could not complete the command for '{session}'. Check that tmux is \
                     healthy on the host, then retry."
                ),
            },
            EngineError::ProcessTimeout { session, timeout } => format!(
                "Session '{session}' did not respond within {}s. Retry the command, or cancel \
                 the job if the program is stuck.",
                timeout.as_secs()
            ),
            EngineError::SessionNotConfigured { channel_id } => format!(
                "Channel '{channel_id}' is not connected to a project yet. Bind it to a working \
                 directory first, then send the command again."
            ),
            EngineError::InvalidSessionName { session, .. } => format!(
                "'{session}' cannot be used as a session name. Use only letters, digits, '-' \
                 and '_', and check RELAY_SESSION_PREFIX if the name was generated."
            ),
            EngineError::Storage(_) => {
                "The relay could not read or write its state. Check permissions and free space \
                 in the state directory."
                    .to_string()
            }
        }
    }
}

impl From<DslError> for EngineError {
    fn from(err: DslError) -> Self {
        match err {
            DslError::MixedCharacter { .. } => EngineError::MixedCharacter(err),
            DslError::Parse { .. } => EngineError::DslParse(err),
        }
    }
}

impl From<PersistenceError> for EngineError {
    fn from(err: PersistenceError) -> Self {
        EngineError::Storage(WorkError::Persistence(err))
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
