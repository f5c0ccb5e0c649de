//! tmux session adapter for tmux-relay.
//!
//! This crate drives tmux on behalf of relay channels:
//! - Create, probe and kill sessions
//! - Type literal text and press named keys
//! - Capture pane contents and clear scrollback
//!
//! Every operation returns a [`CommandResult`]. A missing session, a missing
//! tmux binary or a failing command become `success == false` with a
//! [`ProcessError`]; nothing panics. Each call is bounded by a timeout
//! (30s by default) and an output cap (10 MiB by default).
//!
//! # Example
//!
//! ```no_run
//! use relay_models::Key;
//! use relay_tmux::{SessionAdapter, TmuxAdapter};
//!
//! # async fn demo() {
//! let tmux = TmuxAdapter::new();
//! tmux.create_session("relay-demo", std::path::Path::new("/tmp")).await;
//! tmux.send_literal_text("relay-demo", "echo hello").await;
//! tmux.send_key("relay-demo", Key::Enter).await;
//!
//! let capture = tmux.capture_pane("relay-demo", None, None).await;
//! if capture.success {
//!     println!("{}", capture.output);
//! }
//! tmux.kill_session("relay-demo").await;
//! # }
//! ```

pub mod adapter;
pub mod error;
pub mod orchestrator;
pub mod result;
pub mod runner;

pub use adapter::SessionAdapter;
pub use error::ProcessError;
pub use orchestrator::{validate_session_name, TmuxAdapter};
pub use result::CommandResult;
pub use runner::{CommandRunner, DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_TIMEOUT};
