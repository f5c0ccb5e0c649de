//! Core data models for tmux-relay.
//!
//! This crate provides the types shared by every relay component: jobs and
//! their lifecycle, compiled keystroke segments, per-channel session state and
//! channel bindings.

pub mod channel;
pub mod ids;
pub mod job;
pub mod segment;
pub mod session;

pub use channel::ChannelBinding;
pub use ids::JobId;
pub use job::{Job, JobKind, JobStatus};
pub use segment::{Key, Segment};
pub use session::SessionState;
