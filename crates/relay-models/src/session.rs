//! Per-channel interaction state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether the controlled program is waiting on a channel's user.
///
/// `timeout_at` is set exactly when `is_waiting_for_response` is true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Channel this state belongs to.
    pub channel_id: String,

    /// True while the program is paused on a prompt for this channel.
    #[serde(default)]
    pub is_waiting_for_response: bool,

    /// Most recent prompt sent to the program.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_prompt: Option<String>,

    /// Most recent output observed from the program.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_output: Option<String>,

    /// When the current wait expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_at: Option<DateTime<Utc>>,
}

impl SessionState {
    /// Creates an idle state for a channel.
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            is_waiting_for_response: false,
            last_prompt: None,
            last_output: None,
            timeout_at: None,
        }
    }

    /// Returns true if the wait has expired at `now`.
    pub fn is_timed_out_at(&self, now: DateTime<Utc>) -> bool {
        match (self.is_waiting_for_response, self.timeout_at) {
            (true, Some(deadline)) => now >= deadline,
            _ => false,
        }
    }

    /// Resets everything but the channel ID.
    pub fn reset(&mut self) {
        self.is_waiting_for_response = false;
        self.last_prompt = None;
        self.last_output = None;
        self.timeout_at = None;
    }
}
