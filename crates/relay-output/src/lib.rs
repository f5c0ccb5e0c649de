//! Output handling for tmux-relay.
//!
//! Raw pane captures go through two stages:
//!
//! - **normalize**: strip escape sequences and control bytes, trim blank
//!   edges, and bound long captures to a head + tail summary
//! - **classify**: independent pattern checks for "waiting on the user",
//!   "error printed", "task finished" and "output unchanged"
//!
//! The classifier predicates are deliberately separate; callers compose them.

pub mod classify;
pub mod normalize;
pub mod patterns;

pub use classify::{
    has_error, is_awaiting_input, is_output_stable, is_task_completed, OutputClassification,
    StabilityTracker,
};
pub use normalize::{
    clean_output, process_capture_result, remove_ansi_codes, CaptureResult, DEFAULT_FIRST_LINES,
    DEFAULT_LAST_LINES,
};
pub use patterns::Pattern;
