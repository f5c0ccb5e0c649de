//! Job types for relay.
//!
//! A job is one operation a chat channel asked for (a prompt to type, a key
//! sequence to play, a capture to take). Jobs live in the per-channel queue
//! and move through a small status lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::JobId;

/// Status of a job.
///
/// ```text
/// Pending ──> Running ──> Completed | Failed
///    │           │
///    └───────────┴──> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Waiting to be dispatched.
    #[default]
    Pending,
    /// Claimed by a dispatcher and executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Cancelled before it finished.
    Cancelled,
}

impl JobStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    /// Returns true for statuses a job never leaves.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Returns true if moving from `self` to `next` is a defined transition.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Pending, JobStatus::Cancelled)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Cancelled)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// What a job asks the controlled program to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Type the payload as literal text, then press Enter.
    Prompt,
    /// Compile the payload as key notation and play it.
    Keys,
    /// Take a capture of the session; the payload is ignored.
    Capture,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobKind::Prompt => "prompt",
            JobKind::Keys => "keys",
            JobKind::Capture => "capture",
        };
        f.write_str(s)
    }
}

/// A queued operation for one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier.
    pub id: JobId,

    /// Channel that requested the job.
    pub channel_id: String,

    /// What the job does.
    pub kind: JobKind,

    /// Text or key notation, depending on `kind`.
    pub payload: String,

    /// Current status.
    pub status: JobStatus,

    /// When the job was enqueued.
    pub created_at: DateTime<Utc>,

    /// When the job entered `Running`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// When the job reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Error recorded on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    /// Creates a new pending job.
    pub fn new(channel_id: impl Into<String>, kind: JobKind, payload: impl Into<String>) -> Self {
        Self {
            id: JobId::new(),
            channel_id: channel_id.into(),
            kind,
            payload: payload.into(),
            status: JobStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    /// Applies a status transition at time `now`.
    ///
    /// Returns false and leaves the job untouched when the transition is not
    /// defined for the current status.
    pub fn transition(&mut self, next: JobStatus, error: Option<String>, now: DateTime<Utc>) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }

        self.status = next;
        match next {
            JobStatus::Running => self.started_at = Some(now),
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled => {
                self.completed_at = Some(now);
                if error.is_some() {
                    self.error = error;
                }
            }
            JobStatus::Pending => {}
        }
        true
    }

    /// Returns true if the job has reached a terminal status.
    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}
