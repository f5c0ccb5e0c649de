//! tmux implementation of [`SessionAdapter`].

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use relay_models::Key;
use tracing::debug;

use crate::adapter::SessionAdapter;
use crate::error::ProcessError;
use crate::result::CommandResult;
use crate::runner::CommandRunner;

/// Stderr fragments tmux prints when a target session is gone.
const MISSING_SESSION_MARKERS: [&str; 4] = [
    "can't find session",
    "can't find pane",
    "no server running",
    "session not found",
];

/// Session adapter backed by the `tmux` binary.
#[derive(Debug, Clone)]
pub struct TmuxAdapter {
    runner: CommandRunner,
}

impl Default for TmuxAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl TmuxAdapter {
    /// Creates an adapter that runs `tmux` from PATH with default bounds.
    pub fn new() -> Self {
        Self::with_runner(CommandRunner::new("tmux"))
    }

    /// Creates an adapter around a preconfigured runner.
    pub fn with_runner(runner: CommandRunner) -> Self {
        Self { runner }
    }

    /// Returns a copy of this adapter with a different per-call deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.runner = self.runner.with_timeout(timeout);
        self
    }

    /// Checks whether tmux can be executed.
    pub async fn is_available(&self) -> bool {
        self.runner.run(&["-V"]).await.success
    }

    async fn run_on_session(&self, name: &str, args: Vec<String>) -> CommandResult {
        if let Err(err) = validate_session_name(name) {
            return CommandResult::failed(err);
        }
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let result = self.runner.run(&args).await;
        detect_missing_session(result, name)
    }
}

/// Rejects names tmux would parse as a window or pane target.
///
/// Accepted names are non-empty and use only ASCII letters, digits, `-`
/// and `_`.
pub fn validate_session_name(name: &str) -> Result<(), ProcessError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ProcessError::InvalidSessionName(name.to_string()))
    }
}

fn detect_missing_session(result: CommandResult, name: &str) -> CommandResult {
    match &result.error {
        Some(ProcessError::CommandFailed { stderr, .. })
            if MISSING_SESSION_MARKERS.iter().any(|m| stderr.contains(m)) =>
        {
            CommandResult::failed(ProcessError::SessionNotFound(name.to_string()))
        }
        _ => result,
    }
}

/// Exact-match session target (`=name`), so `relay-a` never matches `relay-ab`.
fn session_target(name: &str) -> String {
    format!("={}", name)
}

/// Active pane of the exactly-matched session.
fn pane_target(name: &str) -> String {
    format!("={}:", name)
}

/// Escapes text for `send-keys -l`.
///
/// tmux treats an argument ending in `;` as a command separator, so a
/// trailing `;` is sent as `\;`.
pub(crate) fn escape_literal(text: &str) -> String {
    match text.strip_suffix(';') {
        Some(head) => format!("{}\\;", head),
        None => text.to_string(),
    }
}

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

pub(crate) fn create_args(name: &str, working_dir: &Path) -> Vec<String> {
    owned(&[
        "new-session",
        "-d",
        "-s",
        name,
        "-c",
        &*working_dir.to_string_lossy(),
    ])
}

pub(crate) fn literal_args(name: &str, text: &str) -> Vec<String> {
    owned(&[
        "send-keys",
        "-t",
        pane_target(name).as_str(),
        "-l",
        "--",
        escape_literal(text).as_str(),
    ])
}

pub(crate) fn key_args(name: &str, key: Key) -> Vec<String> {
    owned(&["send-keys", "-t", pane_target(name).as_str(), key.tmux_name()])
}

pub(crate) fn capture_args(name: &str, start_line: Option<i32>, end_line: Option<i32>) -> Vec<String> {
    let mut args = owned(&["capture-pane", "-p", "-J", "-t", pane_target(name).as_str()]);
    if let Some(start) = start_line {
        args.push("-S".into());
        args.push(start.to_string());
    }
    if let Some(end) = end_line {
        args.push("-E".into());
        args.push(end.to_string());
    }
    args
}

#[async_trait]
impl SessionAdapter for TmuxAdapter {
    async fn create_session(&self, name: &str, working_dir: &Path) -> CommandResult {
        debug!(session = %name, dir = %working_dir.display(), "creating tmux session");
        if let Err(err) = validate_session_name(name) {
            return CommandResult::failed(err);
        }
        let args = create_args(name, working_dir);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.runner.run(&args).await
    }

    async fn session_exists(&self, name: &str) -> CommandResult {
        self.run_on_session(name, owned(&["has-session", "-t", session_target(name).as_str()]))
            .await
    }

    async fn kill_session(&self, name: &str) -> CommandResult {
        debug!(session = %name, "killing tmux session");
        self.run_on_session(name, owned(&["kill-session", "-t", session_target(name).as_str()]))
            .await
    }

    async fn send_literal_text(&self, name: &str, text: &str) -> CommandResult {
        if text.is_empty() {
            return CommandResult::ok("");
        }
        debug!(session = %name, len = text.len(), "sending literal text");
        self.run_on_session(name, literal_args(name, text)).await
    }

    async fn send_key(&self, name: &str, key: Key) -> CommandResult {
        debug!(session = %name, key = %key, "sending key");
        self.run_on_session(name, key_args(name, key)).await
    }

    async fn capture_pane(
        &self,
        name: &str,
        start_line: Option<i32>,
        end_line: Option<i32>,
    ) -> CommandResult {
        self.run_on_session(name, capture_args(name, start_line, end_line))
            .await
    }

    async fn clear_scrollback(&self, name: &str) -> CommandResult {
        debug!(session = %name, "clearing scrollback");
        self.run_on_session(name, owned(&["clear-history", "-t", pane_target(name).as_str()]))
            .await
    }
}
