//! Command handlers for CLI subcommands.

use chrono::Utc;
use relay_models::{Job, JobId, SessionState};
use relay_runtime::{Engine, EngineError, IdleReason, SequenceOutcome};
use relay_work::QueueSummary;
use serde::Serialize;
use tracing::info;

use crate::cli::Commands;

/// Result type for command operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Printing options shared by every command.
#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    pub json: bool,
}

impl Output {
    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce() -> String) {
        if self.json {
            match serde_json::to_string_pretty(value) {
                Ok(json) => println!("{}", json),
                Err(e) => eprintln!("Error: failed to encode JSON: {}", e),
            }
        } else {
            println!("{}", text());
        }
    }
}

/// Execute a CLI command.
pub async fn execute(engine: &Engine, command: Commands, out: Output) -> Result<()> {
    match command {
        Commands::Bind { channel, dir, session } => {
            let binding = engine.bind_channel(&channel, dir, session)?;
            out.emit(&binding, || {
                format!(
                    "Bound '{}' to session '{}' in {}",
                    binding.channel_id,
                    binding.session_name,
                    binding.working_dir.display()
                )
            });
        }
        Commands::Unbind { channel } => match engine.unbind_channel(&channel)? {
            Some(binding) => out.emit(&binding, || format!("Unbound '{}'", channel)),
            None => println!("Channel '{}' was not bound", channel),
        },
        Commands::Channels => {
            let bindings = engine.channels().list()?;
            out.emit(&bindings, || {
                if bindings.is_empty() {
                    return "No channels bound".to_string();
                }
                bindings
                    .iter()
                    .map(|b| format!("{:<20} {:<24} {}", b.channel_id, b.session_name, b.working_dir.display()))
                    .collect::<Vec<_>>()
                    .join("\n")
            });
        }
        Commands::Send { channel, text } => {
            let outcome = engine.send_text(&channel, &text).await?;
            print_outcome(&outcome, out);
        }
        Commands::Keys { channel, notation } => {
            let outcome = engine.send_keys(&channel, &notation).await?;
            print_outcome(&outcome, out);
        }
        Commands::Enqueue { channel, payload, kind } => {
            let job = engine.enqueue(&channel, kind.into(), &payload)?;
            out.emit(&job, || format!("Queued {} job {}", job.kind, job.id));
        }
        Commands::Run { channel, all } => loop {
            let Some(report) = engine.dispatch_next(&channel).await? else {
                if !all {
                    println!("Nothing to dispatch for '{}'", channel);
                }
                break;
            };
            out.emit(&report.job, || describe_job(&report.job));
            if let Some(capture) = report.outcome.as_ref().and_then(|o| o.capture.as_ref()) {
                if !out.json && !capture.summary.is_empty() {
                    println!("{}", capture.summary);
                }
            }
            if !all {
                break;
            }
        },
        Commands::Queue { channel } => {
            let jobs = engine.queue().list_jobs(&channel)?;
            let summary = engine.queue().get_queue_summary(&channel)?;
            #[derive(Serialize)]
            struct QueueView<'a> {
                summary: QueueSummary,
                jobs: &'a [Job],
            }
            out.emit(&QueueView { summary, jobs: &jobs }, || {
                let mut lines = vec![format!(
                    "{} pending, {} running, {} completed, {} failed, {} cancelled",
                    summary.pending, summary.running, summary.completed, summary.failed, summary.cancelled
                )];
                lines.extend(jobs.iter().map(describe_job));
                lines.join("\n")
            });
        }
        Commands::Cancel { job_id } => {
            let id = JobId::from_string(job_id);
            match engine.cancel(&id)? {
                Some(job) => out.emit(&job, || format!("Cancelled {}", job.id)),
                None => println!("Job {} not found or already finished", id),
            }
        }
        Commands::Capture { channel, full } => {
            let capture = engine.capture(&channel).await?;
            out.emit(&capture, || {
                if full {
                    capture.full_output.clone()
                } else {
                    capture.summary.clone()
                }
            });
        }
        Commands::Wait { channel } => {
            let report = engine.wait_for_idle(&channel).await?;
            #[derive(Serialize)]
            struct WaitView<'a> {
                reason: IdleReason,
                polls: u32,
                summary: &'a str,
            }
            let view = WaitView {
                reason: report.reason,
                polls: report.polls,
                summary: &report.capture.summary,
            };
            out.emit(&view, || {
                format!(
                    "{:?} after {} polls\n{}",
                    report.reason, report.polls, report.capture.summary
                )
            });
        }
        Commands::Status { channel } => {
            let states = match channel {
                Some(channel) => engine.tracker().get_state(&channel)?.into_iter().collect(),
                None => engine.tracker().list_states()?,
            };
            out.emit(&states, || {
                if states.is_empty() {
                    return "No tracked sessions".to_string();
                }
                states.iter().map(describe_state).collect::<Vec<_>>().join("\n")
            });
        }
        Commands::Timeouts => {
            let expired = engine.expire_timed_out()?;
            out.emit(&expired, || {
                format!("{} channel(s) timed out", expired.len())
            });
        }
        Commands::Cleanup { hours } => {
            let removed = engine.queue().cleanup_completed_jobs(hours)?;
            info!(removed, hours, "cleanup finished");
            out.emit(&removed, || format!("Removed {} completed job(s)", removed));
        }
        Commands::Kill { channel } => {
            engine.kill_session(&channel).await?;
            println!("Killed session for '{}'", channel);
        }
        Commands::Clear { channel } => {
            engine.clear_scrollback(&channel).await?;
            println!("Cleared scrollback for '{}'", channel);
        }
        Commands::Guide => println!("{}", relay_dsl::user_guide()),
    }
    Ok(())
}

fn print_outcome(outcome: &SequenceOutcome, out: Output) {
    out.emit(&outcome.capture, || {
        let mut text = format!("Sent {} step(s)", outcome.steps_executed);
        if let Some(capture) = &outcome.capture {
            if !capture.summary.is_empty() {
                text.push('\n');
                text.push_str(&capture.summary);
            }
        }
        text
    });
}

fn describe_job(job: &Job) -> String {
    let mut line = format!(
        "{}  {:<9} {:<7} {}",
        job.id,
        job.status.to_string(),
        job.kind.to_string(),
        job.payload
    );
    if let Some(error) = &job.error {
        line.push_str(&format!("  ({})", error));
    }
    line
}

fn describe_state(state: &SessionState) -> String {
    let waiting = match state.timeout_at {
        Some(deadline) if state.is_waiting_for_response => {
            let minutes = (deadline - Utc::now()).num_minutes();
            format!("waiting, {} min left", minutes.max(0))
        }
        _ => "idle".to_string(),
    };
    format!("{:<20} {}", state.channel_id, waiting)
}
