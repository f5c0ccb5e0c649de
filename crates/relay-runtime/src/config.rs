//! Engine configuration.
//!
//! # Environment Variables
//!
//! - `RELAY_STATE_DIR`: where jobs, session state and bindings are stored
//! - `RELAY_COMMAND_TIMEOUT_SECS`: deadline for each tmux call
//! - `RELAY_PROMPT_TIMEOUT_MINUTES`: how long a channel may wait on the user
//! - `RELAY_KEY_DELAY_MS`: pause between keystrokes of a sequence
//! - `RELAY_SESSION_PREFIX`: prefix for generated session names
//! - `RELAY_LAUNCH_COMMAND`: program typed into freshly created sessions

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use relay_output::{DEFAULT_FIRST_LINES, DEFAULT_LAST_LINES};
use relay_tmux::{DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_TIMEOUT};
use relay_work::DEFAULT_TIMEOUT_MINUTES;
use tracing::warn;

/// Environment variable for custom state directory.
pub const STATE_DIR_ENV: &str = "RELAY_STATE_DIR";
/// Environment variable for the tmux call deadline, in seconds.
pub const COMMAND_TIMEOUT_ENV: &str = "RELAY_COMMAND_TIMEOUT_SECS";
/// Environment variable for the prompt timeout, in minutes.
pub const PROMPT_TIMEOUT_ENV: &str = "RELAY_PROMPT_TIMEOUT_MINUTES";
/// Environment variable for the inter-key delay, in milliseconds.
pub const KEY_DELAY_ENV: &str = "RELAY_KEY_DELAY_MS";
/// Environment variable for the session name prefix.
pub const SESSION_PREFIX_ENV: &str = "RELAY_SESSION_PREFIX";
/// Environment variable for the launch command.
pub const LAUNCH_COMMAND_ENV: &str = "RELAY_LAUNCH_COMMAND";

/// Default state directory name under home.
const DEFAULT_STATE_DIR: &str = ".tmux-relay";

/// Configuration for the engine.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Directory holding persisted records.
    pub state_dir: PathBuf,
    /// Deadline for each tmux call.
    pub command_timeout: Duration,
    /// Output cap for each tmux call.
    pub max_output_bytes: usize,
    /// Lines kept from the head of a long capture.
    pub capture_first_lines: usize,
    /// Lines kept from the tail of a long capture.
    pub capture_last_lines: usize,
    /// Scrollback lines included in each capture.
    pub capture_history_lines: u32,
    /// How long a channel may wait on the user.
    pub prompt_timeout_minutes: u32,
    /// Pause between steps of a key sequence.
    pub key_delay: Duration,
    /// How often to capture while waiting for idle.
    pub poll_interval: Duration,
    /// Unchanged captures needed to call a session idle.
    pub stable_polls: u32,
    /// Upper bound on waiting for idle.
    pub idle_wait: Duration,
    /// Prefix for generated session names.
    pub session_prefix: String,
    /// Typed into a session right after it is created.
    pub launch_command: Option<String>,
    /// Refuse to dispatch while a channel already has a running job.
    pub single_active_job: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            command_timeout: DEFAULT_TIMEOUT,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            capture_first_lines: DEFAULT_FIRST_LINES,
            capture_last_lines: DEFAULT_LAST_LINES,
            capture_history_lines: 2000,
            prompt_timeout_minutes: DEFAULT_TIMEOUT_MINUTES,
            key_delay: Duration::from_millis(100),
            poll_interval: Duration::from_millis(500),
            stable_polls: 3,
            idle_wait: Duration::from_secs(120),
            session_prefix: "relay".to_string(),
            launch_command: None,
            single_active_job: true,
        }
    }
}

/// `~/.tmux-relay`, or `.tmux-relay` when there is no home directory.
pub fn default_state_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(DEFAULT_STATE_DIR))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR))
}

impl RelayConfig {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a config from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from `lookup`, falling back to defaults.
    ///
    /// Unparseable numbers are logged and ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup(STATE_DIR_ENV).filter(|v| !v.is_empty()) {
            config.state_dir = PathBuf::from(dir);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, COMMAND_TIMEOUT_ENV) {
            config.command_timeout = Duration::from_secs(secs);
        }
        if let Some(minutes) = parse_var(&lookup, PROMPT_TIMEOUT_ENV) {
            config.prompt_timeout_minutes = minutes;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, KEY_DELAY_ENV) {
            config.key_delay = Duration::from_millis(ms);
        }
        if let Some(prefix) = lookup(SESSION_PREFIX_ENV).filter(|v| !v.is_empty()) {
            config.session_prefix = prefix;
        }
        config.launch_command = lookup(LAUNCH_COMMAND_ENV).filter(|v| !v.trim().is_empty());

        config
    }

    /// Sets the state directory.
    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = dir.into();
        self
    }

    /// Sets the tmux call deadline.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Sets the capture head and tail sizes.
    pub fn with_capture_lines(mut self, first: usize, last: usize) -> Self {
        self.capture_first_lines = first;
        self.capture_last_lines = last;
        self
    }

    /// Sets the prompt timeout.
    pub fn with_prompt_timeout_minutes(mut self, minutes: u32) -> Self {
        self.prompt_timeout_minutes = minutes;
        self
    }

    /// Sets the pause between keystrokes.
    pub fn with_key_delay(mut self, delay: Duration) -> Self {
        self.key_delay = delay;
        self
    }

    /// Sets the idle polling parameters.
    pub fn with_idle_polling(mut self, interval: Duration, stable_polls: u32, max_wait: Duration) -> Self {
        self.poll_interval = interval;
        self.stable_polls = stable_polls;
        self.idle_wait = max_wait;
        self
    }

    /// Sets the session name prefix.
    pub fn with_session_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.session_prefix = prefix.into();
        self
    }

    /// Sets the launch command.
    pub fn with_launch_command(mut self, command: impl Into<String>) -> Self {
        self.launch_command = Some(command.into());
        self
    }

    /// Enables or disables the single-active-job dispatch guard.
    pub fn with_single_active_job(mut self, enabled: bool) -> Self {
        self.single_active_job = enabled;
        self
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(var = key, value = %raw, "ignoring unparseable environment value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();

        assert_eq!(config.command_timeout, Duration::from_secs(30));
        assert_eq!(config.max_output_bytes, 10 * 1024 * 1024);
        assert_eq!(config.capture_first_lines, 100);
        assert_eq!(config.capture_last_lines, 50);
        assert_eq!(config.prompt_timeout_minutes, 30);
        assert_eq!(config.key_delay, Duration::from_millis(100));
        assert_eq!(config.session_prefix, "relay");
        assert!(config.launch_command.is_none());
        assert!(config.single_active_job);
        assert!(config.state_dir.ends_with(".tmux-relay"));
    }

    #[test]
    fn test_config_builder() {
        let config = RelayConfig::new()
            .with_state_dir("/tmp/relay")
            .with_key_delay(Duration::ZERO)
            .with_capture_lines(10, 5)
            .with_idle_polling(Duration::from_millis(50), 2, Duration::from_secs(1))
            .with_launch_command("claude")
            .with_single_active_job(false);

        assert_eq!(config.state_dir, PathBuf::from("/tmp/relay"));
        assert_eq!(config.key_delay, Duration::ZERO);
        assert_eq!((config.capture_first_lines, config.capture_last_lines), (10, 5));
        assert_eq!(config.stable_polls, 2);
        assert_eq!(config.launch_command.as_deref(), Some("claude"));
        assert!(!config.single_active_job);
    }

    #[test]
    fn test_from_lookup_reads_overrides() {
        let config = RelayConfig::from_lookup(lookup_from(&[
            (STATE_DIR_ENV, "/srv/relay"),
            (COMMAND_TIMEOUT_ENV, "5"),
            (PROMPT_TIMEOUT_ENV, "10"),
            (KEY_DELAY_ENV, "25"),
            (SESSION_PREFIX_ENV, "bot"),
            (LAUNCH_COMMAND_ENV, "claude --resume"),
        ]));

        assert_eq!(config.state_dir, PathBuf::from("/srv/relay"));
        assert_eq!(config.command_timeout, Duration::from_secs(5));
        assert_eq!(config.prompt_timeout_minutes, 10);
        assert_eq!(config.key_delay, Duration::from_millis(25));
        assert_eq!(config.session_prefix, "bot");
        assert_eq!(config.launch_command.as_deref(), Some("claude --resume"));
    }

    #[test]
    fn test_from_lookup_ignores_garbage() {
        let config = RelayConfig::from_lookup(lookup_from(&[
            (COMMAND_TIMEOUT_ENV, "soon"),
            (KEY_DELAY_ENV, "-1"),
            (SESSION_PREFIX_ENV, ""),
            (LAUNCH_COMMAND_ENV, "   "),
        ]));

        assert_eq!(config.command_timeout, Duration::from_secs(30));
        assert_eq!(config.key_delay, Duration::from_millis(100));
        assert_eq!(config.session_prefix, "relay");
        assert!(config.launch_command.is_none());
    }
}
