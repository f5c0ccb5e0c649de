//! Fail-fast playback of compiled segments.

use std::sync::Arc;
use std::time::Duration;

use relay_models::Segment;
use relay_output::{process_capture_result, CaptureResult};
use relay_tmux::{CommandResult, SessionAdapter};
use tracing::{debug, warn};

/// What to capture once a sequence has been played.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureOptions {
    /// Lines kept from the head of a long capture.
    pub first_lines: usize,
    /// Lines kept from the tail of a long capture.
    pub last_lines: usize,
    /// Scrollback lines to include (0 for the visible pane only).
    pub history_lines: u32,
}

impl CaptureOptions {
    pub(crate) fn start_line(&self) -> Option<i32> {
        (self.history_lines > 0).then(|| -i32::try_from(self.history_lines).unwrap_or(i32::MAX))
    }
}

/// Result of playing a sequence.
#[derive(Debug, Clone)]
pub struct SequenceOutcome {
    /// Aggregate result. On failure, carries the failing step's error.
    pub result: CommandResult,
    /// Adapter calls made, including a failed one.
    pub steps_executed: usize,
    /// Post-sequence capture, when requested and the sequence succeeded.
    pub capture: Option<CaptureResult>,
}

impl SequenceOutcome {
    /// True when every segment was delivered.
    pub fn is_success(&self) -> bool {
        self.result.success
    }
}

/// Plays segment lists against sessions, one adapter call at a time.
#[derive(Clone)]
pub struct SequenceExecutor {
    adapter: Arc<dyn SessionAdapter>,
    key_delay: Duration,
}

impl SequenceExecutor {
    /// Creates an executor pausing `key_delay` between steps.
    pub fn new(adapter: Arc<dyn SessionAdapter>, key_delay: Duration) -> Self {
        Self { adapter, key_delay }
    }

    /// Plays `segments` against `session`, stopping at the first failure.
    ///
    /// Nothing after a failed step is sent. An empty list succeeds without
    /// touching the session (a capture is still taken if requested).
    pub async fn execute(
        &self,
        segments: &[Segment],
        session: &str,
        capture: Option<CaptureOptions>,
    ) -> SequenceOutcome {
        let mut steps_executed = 0;

        for (index, segment) in segments.iter().enumerate() {
            if index > 0 && !self.key_delay.is_zero() {
                tokio::time::sleep(self.key_delay).await;
            }

            let result = match segment {
                Segment::Key { key } => self.adapter.send_key(session, *key).await,
                Segment::Text { content } => self.adapter.send_literal_text(session, content).await,
            };
            steps_executed += 1;

            if !result.success {
                warn!(
                    session = %session,
                    step = index + 1,
                    total = segments.len(),
                    segment = %segment,
                    error = ?result.error_message(),
                    "sequence aborted"
                );
                return SequenceOutcome {
                    result,
                    steps_executed,
                    capture: None,
                };
            }
        }

        debug!(session = %session, steps = steps_executed, "sequence delivered");

        let capture = match capture {
            Some(options) => {
                if steps_executed > 0 && !self.key_delay.is_zero() {
                    tokio::time::sleep(self.key_delay).await;
                }
                self.capture(session, &options).await
            }
            None => None,
        };

        SequenceOutcome {
            result: CommandResult::ok(
                capture
                    .as_ref()
                    .map(|c| c.summary.clone())
                    .unwrap_or_default(),
            ),
            steps_executed,
            capture,
        }
    }

    /// Captures and normalizes `session`'s pane. Failures are logged.
    pub async fn capture(&self, session: &str, options: &CaptureOptions) -> Option<CaptureResult> {
        let raw = self
            .adapter
            .capture_pane(session, options.start_line(), None)
            .await;
        if !raw.success {
            warn!(session = %session, error = ?raw.error_message(), "capture after sequence failed");
            return None;
        }
        Some(process_capture_result(
            &raw.output,
            options.first_lines,
            options.last_lines,
        ))
    }
}
