//! The process adapter interface.

use std::path::Path;

use async_trait::async_trait;
use relay_models::Key;

use crate::result::CommandResult;

/// Drives a terminal multiplexer session.
///
/// One method per multiplexer operation. Implementations report every
/// failure through [`CommandResult`] instead of panicking, which also keeps
/// the interface easy to fake in tests.
#[async_trait]
pub trait SessionAdapter: Send + Sync {
    /// Creates a detached session named `name` starting in `working_dir`.
    async fn create_session(&self, name: &str, working_dir: &Path) -> CommandResult;

    /// Probes for a session. `success` is true iff the session exists.
    async fn session_exists(&self, name: &str) -> CommandResult;

    /// Kills a session and the programs running in it.
    async fn kill_session(&self, name: &str) -> CommandResult;

    /// Types `text` exactly as given. Key names inside it are not interpreted.
    async fn send_literal_text(&self, name: &str, text: &str) -> CommandResult;

    /// Presses a named key.
    async fn send_key(&self, name: &str, key: Key) -> CommandResult;

    /// Captures pane contents. Line numbers follow tmux: 0 is the first
    /// visible line, negative numbers reach into scrollback.
    async fn capture_pane(
        &self,
        name: &str,
        start_line: Option<i32>,
        end_line: Option<i32>,
    ) -> CommandResult;

    /// Drops the session's scrollback history.
    async fn clear_scrollback(&self, name: &str) -> CommandResult;

    /// Convenience wrapper over [`session_exists`](Self::session_exists).
    async fn has_session(&self, name: &str) -> bool {
        self.session_exists(name).await.success
    }
}
