//! Uniform outcome of a process adapter call.

use crate::error::ProcessError;

/// Outcome of one adapter call, or of a whole key sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// True when the call did what it was asked to.
    pub success: bool,
    /// Captured standard output (empty for calls that print nothing).
    pub output: String,
    /// Failure detail; present exactly when `success` is false.
    pub error: Option<ProcessError>,
}

impl CommandResult {
    /// A successful result carrying `output`.
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    /// A failed result.
    pub fn failed(error: ProcessError) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error),
        }
    }

    /// Human-readable error message, if the call failed.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    /// Converts into a `Result`, yielding the output on success.
    pub fn into_result(self) -> Result<String, ProcessError> {
        match self.error {
            None if self.success => Ok(self.output),
            Some(err) => Err(err),
            None => Err(ProcessError::Io("command reported failure without detail".into())),
        }
    }
}
