//! Engine tests against a scripted adapter and an in-memory store.

use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use relay_models::{JobKind, JobStatus, Key};
use relay_persistence::{KeyValueStore, MemoryStore, PersistenceError};
use relay_runtime::{Engine, ErrorKind, IdleReason, RelayConfig};
use relay_tmux::{CommandResult, ProcessError, SessionAdapter};
use serde_json::Value;

type KeyHook = Box<dyn Fn(Key) + Send + Sync>;

/// Fake tmux: remembers sessions, logs input, plays back scripted screens.
#[derive(Default)]
struct FakeTmux {
    sessions: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
    screens: Mutex<VecDeque<String>>,
    last_screen: Mutex<String>,
    fail_send_at: Option<usize>,
    capture_error: Option<ProcessError>,
    on_key: Mutex<Option<KeyHook>>,
    sends: Mutex<usize>,
}

impl FakeTmux {
    fn with_screens(screens: &[&str]) -> Self {
        Self {
            screens: Mutex::new(screens.iter().map(|s| s.to_string()).collect()),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn inputs(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with("key:") || c.starts_with("text:"))
            .collect()
    }

    fn send(&self, call: String) -> CommandResult {
        let mut sends = self.sends.lock().unwrap();
        let index = *sends;
        *sends += 1;
        self.calls.lock().unwrap().push(call);
        if self.fail_send_at == Some(index) {
            CommandResult::failed(ProcessError::CommandFailed {
                code: Some(1),
                stderr: "pane is dead".into(),
            })
        } else {
            CommandResult::ok("")
        }
    }
}

#[async_trait]
impl SessionAdapter for FakeTmux {
    async fn create_session(&self, name: &str, dir: &Path) -> CommandResult {
        self.calls
            .lock()
            .unwrap()
            .push(format!("create:{}:{}", name, dir.display()));
        self.sessions.lock().unwrap().insert(name.to_string());
        CommandResult::ok("")
    }

    async fn session_exists(&self, name: &str) -> CommandResult {
        if self.sessions.lock().unwrap().contains(name) {
            CommandResult::ok("")
        } else {
            CommandResult::failed(ProcessError::SessionNotFound(name.to_string()))
        }
    }

    async fn kill_session(&self, name: &str) -> CommandResult {
        self.calls.lock().unwrap().push(format!("kill:{}", name));
        if self.sessions.lock().unwrap().remove(name) {
            CommandResult::ok("")
        } else {
            CommandResult::failed(ProcessError::SessionNotFound(name.to_string()))
        }
    }

    async fn send_literal_text(&self, _: &str, text: &str) -> CommandResult {
        self.send(format!("text:{}", text))
    }

    async fn send_key(&self, _: &str, key: Key) -> CommandResult {
        let result = self.send(format!("key:{}", key));
        if let Some(hook) = self.on_key.lock().unwrap().as_ref() {
            hook(key);
        }
        result
    }

    async fn capture_pane(&self, _: &str, _: Option<i32>, _: Option<i32>) -> CommandResult {
        if let Some(err) = &self.capture_error {
            return CommandResult::failed(err.clone());
        }
        let mut last = self.last_screen.lock().unwrap();
        if let Some(next) = self.screens.lock().unwrap().pop_front() {
            *last = next;
        }
        CommandResult::ok(last.clone())
    }

    async fn clear_scrollback(&self, name: &str) -> CommandResult {
        self.calls.lock().unwrap().push(format!("clear:{}", name));
        CommandResult::ok("")
    }
}

/// Memory store that rejects writes to `failing_key` while it is set.
#[derive(Default)]
struct FailingStore {
    inner: MemoryStore,
    failing_key: Mutex<Option<&'static str>>,
}

impl FailingStore {
    fn fail_writes_to(&self, key: Option<&'static str>) {
        *self.failing_key.lock().unwrap() = key;
    }
}

impl KeyValueStore for FailingStore {
    fn get(&self, key: &str) -> relay_persistence::Result<Option<Value>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: Value) -> relay_persistence::Result<()> {
        if *self.failing_key.lock().unwrap() == Some(key) {
            return Err(PersistenceError::WriteError {
                path: key.into(),
                source: std::io::Error::other("disk full"),
            });
        }
        self.inner.set(key, value)
    }

    fn delete(&self, key: &str) -> relay_persistence::Result<()> {
        self.inner.delete(key)
    }

    fn list(&self) -> relay_persistence::Result<Vec<String>> {
        self.inner.list()
    }
}

fn config() -> RelayConfig {
    RelayConfig::new()
        .with_key_delay(Duration::ZERO)
        .with_idle_polling(Duration::from_millis(10), 2, Duration::from_secs(1))
}

fn engine_with(tmux: Arc<FakeTmux>, config: RelayConfig) -> Engine {
    Engine::new(config, tmux, Arc::new(MemoryStore::new())).unwrap()
}

fn bound_engine(tmux: Arc<FakeTmux>) -> Engine {
    let engine = engine_with(tmux, config());
    engine.bind_channel("general", "/work/app", None).unwrap();
    engine
}

#[tokio::test]
async fn test_prompt_job_round_trip() {
    let tmux = Arc::new(FakeTmux::with_screens(&[
        "\x1b[1mEdited 3 files\x1b[0m\nDo you want to proceed? [y/n]\n",
    ]));
    let engine = engine_with(tmux.clone(), config().with_launch_command("claude"));
    engine.bind_channel("general", "/work/app", None).unwrap();

    let job = engine
        .enqueue("general", JobKind::Prompt, "fix the failing test")
        .unwrap();
    let report = engine.dispatch_next("general").await.unwrap().unwrap();

    assert_eq!(report.job.id, job.id);
    assert_eq!(report.job.status, JobStatus::Completed);
    assert!(report.job.started_at.is_some());
    assert!(report.job.completed_at.is_some());
    assert!(report.classification.unwrap().awaiting_input);

    assert_eq!(
        tmux.calls()[0],
        "create:relay-general:/work/app".to_string()
    );
    assert_eq!(
        tmux.inputs(),
        vec![
            "text:claude",
            "key:Enter",
            "text:fix the failing test",
            "key:Enter"
        ]
    );

    let state = engine.tracker().get_state("general").unwrap().unwrap();
    assert!(state.is_waiting_for_response);
    assert!(state.timeout_at.is_some());
    assert_eq!(state.last_prompt.as_deref(), Some("fix the failing test"));
    assert_eq!(
        state.last_output.as_deref(),
        Some("Edited 3 files\nDo you want to proceed? [y/n]")
    );
}

#[tokio::test]
async fn test_existing_session_is_reused() {
    let tmux = Arc::new(FakeTmux::default());
    tmux.sessions
        .lock()
        .unwrap()
        .insert("relay-general".to_string());
    let engine = bound_engine(tmux.clone());

    engine.ensure_session("general").await.unwrap();
    assert!(tmux.calls().iter().all(|c| !c.starts_with("create:")));
}

#[tokio::test]
async fn test_keys_job_plays_compiled_notation() {
    let tmux = Arc::new(FakeTmux::with_screens(&["Task completed"]));
    let engine = bound_engine(tmux.clone());

    engine
        .enqueue("general", JobKind::Keys, "`ddd` custom value `e`")
        .unwrap();
    let report = engine.dispatch_next("general").await.unwrap().unwrap();

    assert_eq!(report.job.status, JobStatus::Completed);
    assert_eq!(
        tmux.inputs(),
        vec![
            "key:Down",
            "key:Down",
            "key:Down",
            "text:custom value",
            "key:Enter"
        ]
    );
    let classification = report.classification.unwrap();
    assert!(classification.completed);
    assert!(!classification.awaiting_input);
    assert!(!engine
        .tracker()
        .get_state("general")
        .unwrap()
        .unwrap()
        .is_waiting_for_response);
}

#[tokio::test]
async fn test_bad_notation_is_rejected_at_enqueue() {
    let tmux = Arc::new(FakeTmux::default());
    let engine = bound_engine(tmux);

    let err = engine
        .enqueue("general", JobKind::Keys, "`ddx`")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MixedCharacter);
    assert!(engine.queue().list_jobs("general").unwrap().is_empty());

    let err = engine.send_keys("general", "`dd").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DslParse);
}

#[tokio::test]
async fn test_unbound_channel_fails_job() {
    let tmux = Arc::new(FakeTmux::default());
    let engine = engine_with(tmux.clone(), config());

    engine.enqueue("lost", JobKind::Prompt, "hello").unwrap();
    let report = engine.dispatch_next("lost").await.unwrap().unwrap();

    assert_eq!(report.job.status, JobStatus::Failed);
    assert!(report.job.error.unwrap().contains("no session configured"));
    assert!(report.outcome.is_none());
    assert!(tmux.calls().is_empty());

    let err = engine.capture("lost").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SessionNotConfigured);
}

#[tokio::test]
async fn test_failed_step_fails_job_fast() {
    let tmux = Arc::new(FakeTmux {
        fail_send_at: Some(1),
        ..Default::default()
    });
    let engine = bound_engine(tmux.clone());

    engine
        .enqueue("general", JobKind::Keys, "`d` next `e`")
        .unwrap();
    let report = engine.dispatch_next("general").await.unwrap().unwrap();

    assert_eq!(report.job.status, JobStatus::Failed);
    assert_eq!(report.job.error.as_deref(), Some("command failed: pane is dead"));
    assert_eq!(tmux.inputs(), vec!["key:Down", "text:next"]);
    assert_eq!(report.outcome.unwrap().steps_executed, 2);
}

#[tokio::test]
async fn test_direct_send_reports_process_error() {
    let tmux = Arc::new(FakeTmux {
        fail_send_at: Some(0),
        ..Default::default()
    });
    let engine = bound_engine(tmux);

    let err = engine.send_text("general", "hi").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProcessCommand);
}

#[tokio::test]
async fn test_capture_timeout_kind() {
    let tmux = Arc::new(FakeTmux {
        capture_error: Some(ProcessError::Timeout(Duration::from_secs(30))),
        ..Default::default()
    });
    let engine = bound_engine(tmux);

    let err = engine.capture("general").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProcessTimeout);
}

#[tokio::test]
async fn test_single_active_job_guard() {
    let tmux = Arc::new(FakeTmux::default());
    let engine = bound_engine(tmux.clone());

    let first = engine.enqueue("general", JobKind::Prompt, "one").unwrap();
    engine.enqueue("general", JobKind::Prompt, "two").unwrap();
    engine
        .queue()
        .update_job_status(&first.id, JobStatus::Running, None)
        .unwrap();

    assert!(engine.dispatch_next("general").await.unwrap().is_none());
    assert!(tmux.inputs().is_empty());

    let relaxed = engine_with(tmux.clone(), config().with_single_active_job(false));
    relaxed.bind_channel("general", "/work/app", None).unwrap();
    let a = relaxed.enqueue("general", JobKind::Prompt, "a").unwrap();
    relaxed.enqueue("general", JobKind::Prompt, "b").unwrap();
    relaxed
        .queue()
        .update_job_status(&a.id, JobStatus::Running, None)
        .unwrap();
    let report = relaxed.dispatch_next("general").await.unwrap().unwrap();
    assert_eq!(report.job.payload, "b");
}

#[tokio::test]
async fn test_dispatch_empty_queue() {
    let engine = bound_engine(Arc::new(FakeTmux::default()));
    assert!(engine.dispatch_next("general").await.unwrap().is_none());
}

#[tokio::test]
async fn test_cancel_during_flight_stays_cancelled() {
    let tmux = Arc::new(FakeTmux::default());
    let engine = Arc::new(bound_engine(tmux.clone()));
    let job = engine.enqueue("general", JobKind::Prompt, "long task").unwrap();

    let weak: Weak<Engine> = Arc::downgrade(&engine);
    let id = job.id.clone();
    *tmux.on_key.lock().unwrap() = Some(Box::new(move |_| {
        if let Some(engine) = weak.upgrade() {
            engine.cancel(&id).unwrap();
        }
    }));

    let report = engine.dispatch_next("general").await.unwrap().unwrap();
    assert_eq!(report.job.status, JobStatus::Cancelled);
    assert_eq!(tmux.inputs(), vec!["text:long task", "key:Enter"]);
}

#[tokio::test]
async fn test_capture_job_takes_no_input() {
    let tmux = Arc::new(FakeTmux::with_screens(&["line\n".repeat(300).as_str()]));
    let engine = bound_engine(tmux.clone());

    engine.enqueue("general", JobKind::Capture, "").unwrap();
    let report = engine.dispatch_next("general").await.unwrap().unwrap();

    assert_eq!(report.job.status, JobStatus::Completed);
    assert!(tmux.inputs().is_empty());
    let capture = report.outcome.unwrap().capture.unwrap();
    assert!(capture.is_truncated);
    assert_eq!(capture.total_lines, 300);
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_idle_until_stable() {
    let tmux = Arc::new(FakeTmux::with_screens(&["a", "a\nb", "a\nb\nc"]));
    let engine = bound_engine(tmux);

    let report = engine.wait_for_idle("general").await.unwrap();
    assert_eq!(report.reason, IdleReason::Stable);
    assert_eq!(report.polls, 5);
    assert_eq!(report.capture.full_output, "a\nb\nc");
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_idle_stops_on_prompt() {
    let tmux = Arc::new(FakeTmux::with_screens(&["working", "Continue? [y/n]"]));
    let engine = bound_engine(tmux);

    let report = engine.wait_for_idle("general").await.unwrap();
    assert_eq!(report.reason, IdleReason::AwaitingInput);
    assert_eq!(report.polls, 2);
    assert!(engine.tracker().get_state("general").unwrap().unwrap().is_waiting_for_response);
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_idle_stops_on_error() {
    let tmux = Arc::new(FakeTmux::with_screens(&["fatal: not a git repository"]));
    let engine = bound_engine(tmux);

    let report = engine.wait_for_idle("general").await.unwrap();
    assert_eq!(report.reason, IdleReason::ErrorDetected);
    assert_eq!(
        report.classification.error_line.as_deref(),
        Some("fatal: not a git repository")
    );
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_idle_gives_up() {
    let screens: Vec<String> = (0..1000).map(|i| format!("tick {}", i)).collect();
    let refs: Vec<&str> = screens.iter().map(String::as_str).collect();
    let tmux = Arc::new(FakeTmux::with_screens(&refs));
    let engine = bound_engine(tmux);

    let report = engine.wait_for_idle("general").await.unwrap();
    assert_eq!(report.reason, IdleReason::TimedOut);
    assert!(report.polls > 1);
}

#[tokio::test]
async fn test_expire_timed_out() {
    let engine = bound_engine(Arc::new(FakeTmux::default()));
    engine
        .tracker()
        .set_waiting_for_response("general", true, Some(0))
        .unwrap();
    engine
        .tracker()
        .set_waiting_for_response("other", true, Some(30))
        .unwrap();

    let expired = engine.expire_timed_out().unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].channel_id, "general");

    let state = engine.tracker().get_state("general").unwrap().unwrap();
    assert!(!state.is_waiting_for_response);
    assert!(state.timeout_at.is_none());
    assert!(engine.tracker().get_state("other").unwrap().unwrap().is_waiting_for_response);
}

#[tokio::test]
async fn test_kill_and_clear() {
    let tmux = Arc::new(FakeTmux::default());
    let engine = bound_engine(tmux.clone());
    engine.send_text("general", "hello").await.unwrap();

    engine.clear_scrollback("general").await.unwrap();
    engine.kill_session("general").await.unwrap();

    let calls = tmux.calls();
    assert!(calls.contains(&"clear:relay-general".to_string()));
    assert!(calls.contains(&"kill:relay-general".to_string()));
    let state = engine.tracker().get_state("general").unwrap().unwrap();
    assert!(state.last_prompt.is_none());

    let err = engine.kill_session("general").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProcessCommand);
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = config().with_state_dir(dir.path());

    let engine = Engine::open(config.clone(), Arc::new(FakeTmux::default())).unwrap();
    engine.bind_channel("general", "/work/app", Some("custom".into())).unwrap();
    let job = engine.enqueue("general", JobKind::Prompt, "persist me").unwrap();
    drop(engine);

    let reopened = Engine::open(config, Arc::new(FakeTmux::default())).unwrap();
    assert_eq!(reopened.binding("general").unwrap().session_name, "custom");
    assert_eq!(
        reopened.queue().get_next_job("general").unwrap().unwrap().id,
        job.id
    );
}

#[test]
fn test_store_keys_are_separate_records() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let engine = Engine::new(config(), Arc::new(FakeTmux::default()), store.clone()).unwrap();
    engine.bind_channel("general", "/w", None).unwrap();
    engine.enqueue("general", JobKind::Prompt, "x").unwrap();
    engine
        .tracker()
        .set_last_output("general", "y")
        .unwrap();

    assert_eq!(
        store.list().unwrap(),
        vec!["channels".to_string(), "jobs".to_string(), "session-state".to_string()]
    );
}

#[tokio::test]
async fn test_state_write_failure_fails_job_and_frees_channel() {
    let tmux = Arc::new(FakeTmux::default());
    let store = Arc::new(FailingStore::default());
    let engine = Engine::new(config(), tmux.clone(), store.clone()).unwrap();
    engine.bind_channel("general", "/work/app", None).unwrap();
    let first = engine.enqueue("general", JobKind::Prompt, "first").unwrap();
    let second = engine.enqueue("general", JobKind::Prompt, "second").unwrap();

    store.fail_writes_to(Some("session-state"));
    let report = engine.dispatch_next("general").await.unwrap().unwrap();

    assert_eq!(report.job.id, first.id);
    assert_eq!(report.job.status, JobStatus::Failed);
    assert!(report.job.error.unwrap().starts_with("storage error"));
    assert!(report.outcome.is_none());
    assert!(tmux.inputs().is_empty());
    assert!(!engine.queue().has_running_job("general").unwrap());

    store.fail_writes_to(None);
    let report = engine.dispatch_next("general").await.unwrap().unwrap();
    assert_eq!(report.job.id, second.id);
    assert_eq!(report.job.status, JobStatus::Completed);
}

#[tokio::test]
async fn test_observation_write_failure_fails_job() {
    let tmux = Arc::new(FakeTmux::with_screens(&["Continue? [y/n]"]));
    let store = Arc::new(FailingStore::default());
    let engine = Engine::new(config(), tmux.clone(), store.clone()).unwrap();
    engine.bind_channel("general", "/work/app", None).unwrap();
    engine.enqueue("general", JobKind::Keys, "`e`").unwrap();

    store.fail_writes_to(Some("session-state"));
    let report = engine.dispatch_next("general").await.unwrap().unwrap();

    assert_eq!(report.job.status, JobStatus::Failed);
    assert_eq!(tmux.inputs(), vec!["key:Enter"]);
    assert!(report.outcome.unwrap().is_success());
    assert!(report.classification.unwrap().awaiting_input);
    assert!(!engine.queue().has_running_job("general").unwrap());
    assert!(engine.tracker().get_state("general").unwrap().is_none());
}

#[tokio::test]
async fn test_prompt_still_showing_keeps_deadline() {
    let tmux = Arc::new(FakeTmux::with_screens(&["Do you want to continue? [y/n]"]));
    let engine = bound_engine(tmux);

    engine.send_keys("general", "`d`").await.unwrap();
    let first = engine.tracker().get_state("general").unwrap().unwrap();
    assert!(first.is_waiting_for_response);

    engine.send_keys("general", "`u`").await.unwrap();
    engine.send_text("general", "still there?").await.unwrap();
    let later = engine.tracker().get_state("general").unwrap().unwrap();
    assert!(later.is_waiting_for_response);
    assert_eq!(later.timeout_at, first.timeout_at);
}

#[test]
fn test_bind_rejects_untargetable_session_names() {
    let engine = engine_with(Arc::new(FakeTmux::default()), config());

    let err = engine
        .bind_channel("general", "/work/app", Some("main:0".into()))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidSessionName);
    assert!(err.kind().is_user_fixable());

    let dotted = engine_with(
        Arc::new(FakeTmux::default()),
        config().with_session_prefix("team.relay"),
    );
    let err = dotted.bind_channel("general", "/work/app", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidSessionName);

    assert!(engine.channels().list().unwrap().is_empty());
    assert!(dotted.channels().list().unwrap().is_empty());
    assert!(engine.binding("general").is_err());
}
