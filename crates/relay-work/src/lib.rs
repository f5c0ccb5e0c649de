//! Work tracking for tmux-relay.
//!
//! - [`JobQueue`]: per-channel FIFO of prompts, key sequences and captures
//! - [`SessionStateTracker`]: whether each channel is waiting on the user
//! - [`ChannelRegistry`]: which tmux session serves each channel
//!
//! All three keep their records in a shared
//! [`KeyValueStore`](relay_persistence::KeyValueStore) and rewrite the whole
//! record on every mutation.

pub mod error;
pub mod queue;
pub mod registry;
pub mod tracker;

#[cfg(test)]
mod testing;

pub use error::{Result, WorkError};
pub use queue::{JobQueue, QueueSummary};
pub use registry::ChannelRegistry;
pub use tracker::{SessionStateTracker, DEFAULT_TIMEOUT_MINUTES};
