//! Per-channel interaction state.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use relay_models::SessionState;
use relay_persistence::{load_typed, save_typed, KeyValueStore};
use tracing::{debug, info};

use crate::error::{Result, WorkError};

/// Store key holding every channel's state.
pub const SESSION_STATE_KEY: &str = "session-state";

/// Minutes a channel may wait on the user before it counts as timed out.
pub const DEFAULT_TIMEOUT_MINUTES: u32 = 30;

type StateMap = BTreeMap<String, SessionState>;

/// Tracks whether each channel's program is waiting on the user.
///
/// Entries are created on first write and never deleted: clearing a channel
/// resets its fields but keeps the entry.
pub struct SessionStateTracker {
    store: Arc<dyn KeyValueStore>,
    default_timeout_minutes: u32,
    state: Mutex<StateMap>,
}

impl SessionStateTracker {
    /// Loads tracked state from `store`.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let states: StateMap = load_typed(store.as_ref(), SESSION_STATE_KEY)?.unwrap_or_default();
        debug!(channels = states.len(), "loaded session state");
        Ok(Self {
            store,
            default_timeout_minutes: DEFAULT_TIMEOUT_MINUTES,
            state: Mutex::new(states),
        })
    }

    /// Sets the timeout used when callers do not pass one.
    pub fn with_default_timeout(mut self, minutes: u32) -> Self {
        self.default_timeout_minutes = minutes;
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, StateMap>> {
        self.state
            .lock()
            .map_err(|e| WorkError::LockPoisoned(e.to_string()))
    }

    /// Applies `f` to `channel_id`'s entry (creating it) and rewrites the record.
    ///
    /// The change only becomes visible once the record has been stored.
    fn mutate<F>(&self, channel_id: &str, f: F) -> Result<SessionState>
    where
        F: FnOnce(&mut SessionState),
    {
        let mut states = self.lock()?;
        let mut next = states.clone();
        let entry = next
            .entry(channel_id.to_string())
            .or_insert_with(|| SessionState::new(channel_id));
        f(entry);
        let updated = entry.clone();
        save_typed(self.store.as_ref(), SESSION_STATE_KEY, &next)?;
        *states = next;
        Ok(updated)
    }

    /// Marks `channel_id` as waiting (with a deadline) or not waiting.
    ///
    /// `timeout_minutes` falls back to the tracker default. It is ignored
    /// when `waiting` is false, since the deadline is cleared.
    pub fn set_waiting_for_response(
        &self,
        channel_id: &str,
        waiting: bool,
        timeout_minutes: Option<u32>,
    ) -> Result<SessionState> {
        let minutes = timeout_minutes.unwrap_or(self.default_timeout_minutes);
        let now = Utc::now();
        let state = self.mutate(channel_id, |state| {
            state.is_waiting_for_response = waiting;
            state.timeout_at = waiting.then(|| now + Duration::minutes(i64::from(minutes)));
        })?;
        debug!(channel = %channel_id, waiting, timeout_at = ?state.timeout_at, "waiting state updated");
        Ok(state)
    }

    /// Marks `channel_id` as waiting unless it already is.
    ///
    /// A channel that is already waiting keeps its deadline, so repeated
    /// sightings of the same prompt do not postpone the timeout.
    pub fn mark_waiting(&self, channel_id: &str) -> Result<SessionState> {
        let deadline = Utc::now() + Duration::minutes(i64::from(self.default_timeout_minutes));
        self.mutate(channel_id, |state| {
            if !(state.is_waiting_for_response && state.timeout_at.is_some()) {
                state.is_waiting_for_response = true;
                state.timeout_at = Some(deadline);
            }
        })
    }

    /// Records the last prompt sent to `channel_id`.
    pub fn set_last_prompt(&self, channel_id: &str, prompt: impl Into<String>) -> Result<()> {
        let prompt = prompt.into();
        self.mutate(channel_id, |state| state.last_prompt = Some(prompt))?;
        Ok(())
    }

    /// Records the last output observed on `channel_id`.
    pub fn set_last_output(&self, channel_id: &str, output: impl Into<String>) -> Result<()> {
        let output = output.into();
        self.mutate(channel_id, |state| state.last_output = Some(output))?;
        Ok(())
    }

    /// Returns the tracked state, or `None` for channels never written.
    pub fn get_state(&self, channel_id: &str) -> Result<Option<SessionState>> {
        Ok(self.lock()?.get(channel_id).cloned())
    }

    /// All tracked channels, ordered by channel ID.
    pub fn list_states(&self) -> Result<Vec<SessionState>> {
        Ok(self.lock()?.values().cloned().collect())
    }

    /// True if `channel_id` is waiting and its deadline has passed.
    ///
    /// Unknown channels are simply not timed out.
    pub fn has_timed_out(&self, channel_id: &str) -> Result<bool> {
        self.has_timed_out_at(channel_id, Utc::now())
    }

    fn has_timed_out_at(&self, channel_id: &str, now: DateTime<Utc>) -> Result<bool> {
        Ok(self
            .lock()?
            .get(channel_id)
            .is_some_and(|state| state.is_timed_out_at(now)))
    }

    /// Every channel whose wait has exceeded its deadline.
    pub fn find_timed_out_sessions(&self) -> Result<Vec<SessionState>> {
        let now = Utc::now();
        Ok(self
            .lock()?
            .values()
            .filter(|state| state.is_timed_out_at(now))
            .cloned()
            .collect())
    }

    /// Resets `channel_id` to idle, keeping the entry itself.
    pub fn clear_session(&self, channel_id: &str) -> Result<()> {
        self.mutate(channel_id, SessionState::reset)?;
        info!(channel = %channel_id, "session state cleared");
        Ok(())
    }
}
