//! Bounded execution of external commands.

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{trace, warn};

use crate::error::{ProcessError, Result};
use crate::result::CommandResult;

/// Default deadline for a single command.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap on bytes read from stdout or stderr.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Runs a program with arguments under a deadline and an output cap.
///
/// Arguments are passed straight to the program (no shell), so quoting
/// characters inside them are never interpreted.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: String,
    timeout: Duration,
    max_output_bytes: usize,
}

impl CommandRunner {
    /// Creates a runner for `program` with the default bounds.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: DEFAULT_TIMEOUT,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }

    /// Sets the per-call deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the output cap.
    pub fn with_max_output_bytes(mut self, max: usize) -> Self {
        self.max_output_bytes = max;
        self
    }

    /// The program this runner invokes.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The per-call deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs the program with the configured deadline.
    pub async fn run(&self, args: &[&str]) -> CommandResult {
        self.run_with_timeout(args, self.timeout).await
    }

    /// Runs the program with an explicit deadline.
    ///
    /// A child still running at the deadline is killed.
    pub async fn run_with_timeout(&self, args: &[&str], timeout: Duration) -> CommandResult {
        trace!(program = %self.program, args = ?args, "running command");

        match tokio::time::timeout(timeout, self.execute(args)).await {
            Ok(Ok(result)) => {
                trace!(
                    success = result.success,
                    stdout_len = result.output.len(),
                    "command completed"
                );
                result
            }
            Ok(Err(err)) => {
                warn!(program = %self.program, error = %err, "command could not run");
                CommandResult::failed(err)
            }
            Err(_) => {
                warn!(
                    program = %self.program,
                    args = ?args,
                    timeout_ms = timeout.as_millis() as u64,
                    "command timed out"
                );
                CommandResult::failed(ProcessError::Timeout(timeout))
            }
        }
    }

    async fn execute(&self, args: &[&str]) -> Result<CommandResult> {
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => ProcessError::NotInstalled(self.program.clone()),
                _ => ProcessError::Io(e.to_string()),
            })?;

        let limit = self.max_output_bytes;
        let stdout_task = tokio::spawn(read_capped(child.stdout.take(), limit));
        let stderr_task = tokio::spawn(read_capped(child.stderr.take(), limit));

        let stdout = join_reader(stdout_task).await?;
        if stdout.len() > limit {
            let _ = child.start_kill();
            return Err(ProcessError::OutputOverflow(limit));
        }
        let stderr = join_reader(stderr_task).await?;
        if stderr.len() > limit {
            let _ = child.start_kill();
            return Err(ProcessError::OutputOverflow(limit));
        }

        let status = child
            .wait()
            .await
            .map_err(|e| ProcessError::Io(e.to_string()))?;

        if status.success() {
            Ok(CommandResult::ok(String::from_utf8_lossy(&stdout)))
        } else {
            Ok(CommandResult::failed(ProcessError::CommandFailed {
                code: status.code(),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            }))
        }
    }
}

/// Reads at most `limit + 1` bytes so overflow is detectable without
/// buffering the whole stream.
async fn read_capped<R>(reader: Option<R>, limit: usize) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut buf = Vec::new();
    if let Some(reader) = reader {
        let mut limited = reader.take(limit as u64 + 1);
        limited.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

async fn join_reader(task: JoinHandle<std::io::Result<Vec<u8>>>) -> Result<Vec<u8>> {
    task.await
        .map_err(|e| ProcessError::Io(e.to_string()))?
        .map_err(|e| ProcessError::Io(e.to_string()))
}
