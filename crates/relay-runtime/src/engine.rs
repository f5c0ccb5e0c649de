//! The channel-facing engine.
//!
//! Data flow for one job:
//!
//! ```text
//! enqueue ──> queue ──> dispatch_next ──> compile ──> execute ──> capture
//!                                                                   │
//!               job status <── tracker (waiting?) <── classify <────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use relay_models::{ChannelBinding, Job, JobKind, JobStatus, Key, Segment, SessionState};
use relay_output::{process_capture_result, CaptureResult, OutputClassification, StabilityTracker};
use relay_persistence::{JsonFileStore, KeyValueStore};
use relay_tmux::{validate_session_name, SessionAdapter};
use relay_work::{ChannelRegistry, JobQueue, SessionStateTracker};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::error::{EngineError, Result};
use crate::executor::{CaptureOptions, SequenceExecutor, SequenceOutcome};

/// Outcome of dispatching one job.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    /// The job in its final recorded state.
    pub job: Job,
    /// Playback result, absent when the job failed before playback.
    pub outcome: Option<SequenceOutcome>,
    /// Verdicts over the post-playback capture.
    pub classification: Option<OutputClassification>,
}

/// Why [`Engine::wait_for_idle`] stopped polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdleReason {
    /// An error marker appeared.
    ErrorDetected,
    /// The program asked the user something.
    AwaitingInput,
    /// Output stopped changing.
    Stable,
    /// The wait hit its upper bound.
    TimedOut,
}

/// Result of waiting for a session to settle.
#[derive(Debug, Clone)]
pub struct IdleReport {
    pub reason: IdleReason,
    pub capture: CaptureResult,
    pub classification: OutputClassification,
    pub polls: u32,
}

/// Drives tmux sessions on behalf of chat channels.
pub struct Engine {
    config: RelayConfig,
    adapter: Arc<dyn SessionAdapter>,
    executor: SequenceExecutor,
    queue: JobQueue,
    tracker: SessionStateTracker,
    channels: ChannelRegistry,
}

impl Engine {
    /// Creates an engine persisting into `store`.
    pub fn new(
        config: RelayConfig,
        adapter: Arc<dyn SessionAdapter>,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self> {
        let executor = SequenceExecutor::new(adapter.clone(), config.key_delay);
        let queue = JobQueue::new(store.clone())?;
        let tracker = SessionStateTracker::new(store.clone())?
            .with_default_timeout(config.prompt_timeout_minutes);
        let channels = ChannelRegistry::new(store)?;

        Ok(Self {
            config,
            adapter,
            executor,
            queue,
            tracker,
            channels,
        })
    }

    /// Creates an engine persisting as JSON files under `config.state_dir`.
    pub fn open(config: RelayConfig, adapter: Arc<dyn SessionAdapter>) -> Result<Self> {
        let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::new(&config.state_dir));
        info!(state_dir = %config.state_dir.display(), "opening relay state");
        Self::new(config, adapter, store)
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn tracker(&self) -> &SessionStateTracker {
        &self.tracker
    }

    pub fn channels(&self) -> &ChannelRegistry {
        &self.channels
    }

    fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            first_lines: self.config.capture_first_lines,
            last_lines: self.config.capture_last_lines,
            history_lines: self.config.capture_history_lines,
        }
    }

    // Channels

    /// Binds `channel_id` to a session working in `working_dir`.
    ///
    /// The session name defaults to `{prefix}-{channel}`. Names tmux
    /// cannot target are rejected before anything is stored.
    pub fn bind_channel(
        &self,
        channel_id: &str,
        working_dir: impl Into<PathBuf>,
        session_name: Option<String>,
    ) -> Result<ChannelBinding> {
        let session = session_name
            .unwrap_or_else(|| ChannelBinding::session_name_for(&self.config.session_prefix, channel_id));
        if validate_session_name(&session).is_err() {
            return Err(EngineError::InvalidSessionName {
                channel_id: channel_id.to_string(),
                session,
            });
        }
        let binding = ChannelBinding::new(channel_id, session, working_dir);
        self.channels.bind(binding.clone())?;
        Ok(binding)
    }

    /// Removes a channel's binding. The tmux session is left running.
    pub fn unbind_channel(&self, channel_id: &str) -> Result<Option<ChannelBinding>> {
        Ok(self.channels.unbind(channel_id)?)
    }

    /// The binding for `channel_id`, or `SessionNotConfigured`.
    pub fn binding(&self, channel_id: &str) -> Result<ChannelBinding> {
        self.channels
            .get(channel_id)?
            .ok_or_else(|| EngineError::SessionNotConfigured {
                channel_id: channel_id.to_string(),
            })
    }

    /// Makes sure the channel's session is running, creating it if needed.
    ///
    /// A new session gets the configured launch command typed into it.
    pub async fn ensure_session(&self, channel_id: &str) -> Result<ChannelBinding> {
        let binding = self.binding(channel_id)?;
        let session = binding.session_name.as_str();

        if self.adapter.has_session(session).await {
            return Ok(binding);
        }

        info!(channel = %channel_id, session = %session, "creating session");
        self.adapter
            .create_session(session, &binding.working_dir)
            .await
            .into_result()
            .map_err(|e| EngineError::process(session, e))?;

        if let Some(command) = &self.config.launch_command {
            let launch = [Segment::text(command.as_str()), Segment::key(Key::Enter)];
            let outcome = self.executor.execute(&launch, session, None).await;
            if let Some(err) = outcome.result.error {
                return Err(EngineError::process(session, err));
            }
            debug!(session = %session, command = %command, "launch command sent");
        }

        Ok(binding)
    }

    // Direct operations

    /// Compiles key notation. Pure; never touches a session.
    pub fn compile(&self, notation: &str) -> Result<Vec<Segment>> {
        Ok(relay_dsl::compile(notation)?)
    }

    async fn play(&self, channel_id: &str, segments: &[Segment]) -> Result<SequenceOutcome> {
        let binding = self.ensure_session(channel_id).await?;
        let outcome = self
            .executor
            .execute(segments, &binding.session_name, Some(self.capture_options()))
            .await;

        match &outcome.result.error {
            Some(err) => Err(EngineError::process(&binding.session_name, err.clone())),
            None => {
                if let Some(capture) = &outcome.capture {
                    self.observe(channel_id, capture)?;
                }
                Ok(outcome)
            }
        }
    }

    /// Types `text` into the channel's session and presses Enter.
    pub async fn send_text(&self, channel_id: &str, text: &str) -> Result<SequenceOutcome> {
        self.binding(channel_id)?;
        self.tracker.set_last_prompt(channel_id, text)?;
        self.play(channel_id, &prompt_segments(text)).await
    }

    /// Compiles `notation` and plays it into the channel's session.
    pub async fn send_keys(&self, channel_id: &str, notation: &str) -> Result<SequenceOutcome> {
        let segments = self.compile(notation)?;
        self.play(channel_id, &segments).await
    }

    /// Captures and normalizes the channel's pane.
    pub async fn capture(&self, channel_id: &str) -> Result<CaptureResult> {
        let binding = self.binding(channel_id)?;
        let session = binding.session_name.as_str();
        let options = self.capture_options();

        let raw = self
            .adapter
            .capture_pane(session, options.start_line(), None)
            .await
            .into_result()
            .map_err(|e| EngineError::process(session, e))?;

        Ok(process_capture_result(&raw, options.first_lines, options.last_lines))
    }

    /// Kills the channel's session and resets its tracked state.
    pub async fn kill_session(&self, channel_id: &str) -> Result<()> {
        let binding = self.binding(channel_id)?;
        self.adapter
            .kill_session(&binding.session_name)
            .await
            .into_result()
            .map_err(|e| EngineError::process(&binding.session_name, e))?;
        self.tracker.clear_session(channel_id)?;
        info!(channel = %channel_id, session = %binding.session_name, "session killed");
        Ok(())
    }

    /// Drops the channel's scrollback.
    pub async fn clear_scrollback(&self, channel_id: &str) -> Result<()> {
        let binding = self.binding(channel_id)?;
        self.adapter
            .clear_scrollback(&binding.session_name)
            .await
            .into_result()
            .map_err(|e| EngineError::process(&binding.session_name, e))?;
        Ok(())
    }

    /// Records a capture and updates the waiting flag from its verdicts.
    fn observe(&self, channel_id: &str, capture: &CaptureResult) -> Result<OutputClassification> {
        let classification = OutputClassification::classify(&capture.full_output);
        self.record_observation(channel_id, capture, &classification)?;
        Ok(classification)
    }

    /// A prompt still on screen keeps the deadline it was first seen with.
    fn record_observation(
        &self,
        channel_id: &str,
        capture: &CaptureResult,
        classification: &OutputClassification,
    ) -> Result<()> {
        self.tracker.set_last_output(channel_id, capture.summary.as_str())?;
        if classification.awaiting_input {
            self.tracker.mark_waiting(channel_id)?;
        } else {
            self.tracker.set_waiting_for_response(channel_id, false, None)?;
        }
        Ok(())
    }

    // Jobs

    /// Queues a job. Key notation is compiled up front so bad input is
    /// rejected here rather than at dispatch.
    pub fn enqueue(&self, channel_id: &str, kind: JobKind, payload: &str) -> Result<Job> {
        if kind == JobKind::Keys {
            relay_dsl::compile(payload)?;
        }
        Ok(self.queue.add_job(channel_id, kind, payload)?)
    }

    /// Cancels a job. An in-flight job keeps running but is not marked done.
    pub fn cancel(&self, id: &relay_models::JobId) -> Result<Option<Job>> {
        Ok(self.queue.cancel_job(id)?)
    }

    /// Claims and runs the channel's oldest pending job.
    ///
    /// Returns `None` when nothing is pending, or when the single-active-job
    /// guard is on and another job of the channel is running. Once a job is
    /// claimed, every failure (including state writes) is recorded on the
    /// job as FAILED rather than returned, so the channel never stays blocked
    /// behind a job left in RUNNING.
    pub async fn dispatch_next(&self, channel_id: &str) -> Result<Option<DispatchReport>> {
        if self.config.single_active_job && self.queue.has_running_job(channel_id)? {
            debug!(channel = %channel_id, "dispatch skipped: job already running");
            return Ok(None);
        }

        let Some(next) = self.queue.get_next_job(channel_id)? else {
            return Ok(None);
        };
        let Some(job) = self
            .queue
            .update_job_status(&next.id, JobStatus::Running, None)?
        else {
            return Ok(None);
        };
        info!(job_id = %job.id, channel = %channel_id, kind = %job.kind, "dispatching job");

        let binding = match self.ensure_session(channel_id).await {
            Ok(binding) => binding,
            Err(err) => return self.fail(job, err.to_string(), None, None),
        };

        let segments = match job.kind {
            JobKind::Prompt => {
                if let Err(err) = self.tracker.set_last_prompt(channel_id, job.payload.as_str()) {
                    return self.fail(job, EngineError::from(err).to_string(), None, None);
                }
                prompt_segments(&job.payload)
            }
            JobKind::Keys => match relay_dsl::compile(&job.payload) {
                Ok(segments) => segments,
                Err(err) => return self.fail(job, EngineError::from(err).to_string(), None, None),
            },
            JobKind::Capture => Vec::new(),
        };

        let outcome = self
            .executor
            .execute(&segments, &binding.session_name, Some(self.capture_options()))
            .await;

        if let Some(message) = outcome.result.error_message() {
            return self.fail(job, message, Some(outcome), None);
        }

        let classification = match &outcome.capture {
            Some(capture) => {
                let classification = OutputClassification::classify(&capture.full_output);
                if let Err(err) = self.record_observation(channel_id, capture, &classification) {
                    return self.fail(job, err.to_string(), Some(outcome), Some(classification));
                }
                Some(classification)
            }
            None => None,
        };

        let job = self.finish(job, JobStatus::Completed, None)?;
        Ok(Some(DispatchReport {
            job,
            outcome: Some(outcome),
            classification,
        }))
    }

    fn fail(
        &self,
        job: Job,
        message: String,
        outcome: Option<SequenceOutcome>,
        classification: Option<OutputClassification>,
    ) -> Result<Option<DispatchReport>> {
        warn!(job_id = %job.id, error = %message, "job failed");
        let job = self.finish(job, JobStatus::Failed, Some(message))?;
        Ok(Some(DispatchReport {
            job,
            outcome,
            classification,
        }))
    }

    /// Records a terminal status. A job cancelled meanwhile stays cancelled.
    fn finish(&self, job: Job, status: JobStatus, error: Option<String>) -> Result<Job> {
        match self.queue.update_job_status(&job.id, status, error)? {
            Some(updated) => Ok(updated),
            None => Ok(self.queue.get_job(&job.id)?.unwrap_or(job)),
        }
    }

    // Waiting

    /// Polls the channel's pane until it errors, prompts, or settles.
    ///
    /// Gives up after `idle_wait` and reports the last capture.
    pub async fn wait_for_idle(&self, channel_id: &str) -> Result<IdleReport> {
        let deadline = Instant::now() + self.config.idle_wait;
        let mut stability = StabilityTracker::new();
        let mut polls = 0;

        loop {
            let capture = self.capture(channel_id).await?;
            polls += 1;
            let classification = OutputClassification::classify(&capture.full_output);
            stability.observe(&capture.full_output);

            let reason = if classification.has_error {
                Some(IdleReason::ErrorDetected)
            } else if classification.awaiting_input {
                Some(IdleReason::AwaitingInput)
            } else if stability.is_stable(self.config.stable_polls) {
                Some(IdleReason::Stable)
            } else if Instant::now() >= deadline {
                Some(IdleReason::TimedOut)
            } else {
                None
            };

            if let Some(reason) = reason {
                self.observe(channel_id, &capture)?;
                debug!(channel = %channel_id, ?reason, polls, "session settled");
                return Ok(IdleReport {
                    reason,
                    capture,
                    classification,
                    polls,
                });
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Clears the waiting flag of every timed-out channel.
    ///
    /// Returns the states as they were before clearing.
    pub fn expire_timed_out(&self) -> Result<Vec<SessionState>> {
        let expired = self.tracker.find_timed_out_sessions()?;
        for state in &expired {
            info!(channel = %state.channel_id, "prompt wait timed out");
            self.tracker
                .set_waiting_for_response(&state.channel_id, false, None)?;
        }
        Ok(expired)
    }
}

/// Literal text followed by Enter.
fn prompt_segments(text: &str) -> Vec<Segment> {
    vec![Segment::text(text), Segment::key(Key::Enter)]
}
