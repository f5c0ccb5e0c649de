//! Channel to tmux session bindings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Associates a chat channel with the tmux session that serves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelBinding {
    /// Channel identifier as supplied by the caller.
    pub channel_id: String,
    /// tmux session name.
    pub session_name: String,
    /// Directory the session starts in.
    pub working_dir: PathBuf,
    /// When the binding was created.
    pub created_at: DateTime<Utc>,
}

impl ChannelBinding {
    /// Creates a binding with an explicit session name.
    pub fn new(
        channel_id: impl Into<String>,
        session_name: impl Into<String>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            session_name: session_name.into(),
            working_dir: working_dir.into(),
            created_at: Utc::now(),
        }
    }

    /// Derives a tmux-safe session name from a prefix and channel ID.
    ///
    /// tmux reserves `:` and `.` in targets, so anything outside
    /// `[A-Za-z0-9_-]` becomes `-`.
    pub fn session_name_for(prefix: &str, channel_id: &str) -> String {
        let sanitized: String = channel_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        format!("{}-{}", prefix, sanitized)
    }
}
