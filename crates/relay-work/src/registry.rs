//! Channel-to-session bindings.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use relay_models::ChannelBinding;
use relay_persistence::{load_typed, save_typed, KeyValueStore};
use tracing::info;

use crate::error::{Result, WorkError};

/// Store key holding every binding.
pub const CHANNELS_KEY: &str = "channels";

type BindingMap = BTreeMap<String, ChannelBinding>;

/// Persisted map from chat channel to the tmux session that serves it.
pub struct ChannelRegistry {
    store: Arc<dyn KeyValueStore>,
    bindings: Mutex<BindingMap>,
}

impl ChannelRegistry {
    /// Loads bindings from `store`.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let bindings: BindingMap = load_typed(store.as_ref(), CHANNELS_KEY)?.unwrap_or_default();
        Ok(Self {
            store,
            bindings: Mutex::new(bindings),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, BindingMap>> {
        self.bindings
            .lock()
            .map_err(|e| WorkError::LockPoisoned(e.to_string()))
    }

    /// Binds a channel, replacing any previous binding.
    pub fn bind(&self, binding: ChannelBinding) -> Result<Option<ChannelBinding>> {
        let mut bindings = self.lock()?;
        let mut next = bindings.clone();
        let channel_id = binding.channel_id.clone();
        let session = binding.session_name.clone();
        let previous = next.insert(channel_id.clone(), binding);
        save_typed(self.store.as_ref(), CHANNELS_KEY, &next)?;
        *bindings = next;
        info!(channel = %channel_id, session = %session, "channel bound");
        Ok(previous)
    }

    /// Removes a channel's binding, returning it if there was one.
    pub fn unbind(&self, channel_id: &str) -> Result<Option<ChannelBinding>> {
        let mut bindings = self.lock()?;
        let mut next = bindings.clone();
        let removed = next.remove(channel_id);
        if removed.is_some() {
            save_typed(self.store.as_ref(), CHANNELS_KEY, &next)?;
            *bindings = next;
            info!(channel = %channel_id, "channel unbound");
        }
        Ok(removed)
    }

    /// Looks up a channel's binding.
    pub fn get(&self, channel_id: &str) -> Result<Option<ChannelBinding>> {
        Ok(self.lock()?.get(channel_id).cloned())
    }

    /// All bindings, ordered by channel ID.
    pub fn list(&self) -> Result<Vec<ChannelBinding>> {
        Ok(self.lock()?.values().cloned().collect())
    }
}
