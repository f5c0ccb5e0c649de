//! Runtime for tmux-relay.
//!
//! Wires the pieces together for chat channels:
//!
//! - [`SequenceExecutor`]: plays compiled segments into a session, fail-fast
//! - [`Engine`]: channel bindings, session provisioning, job dispatch,
//!   capture classification and prompt timeouts
//! - [`RelayConfig`]: defaults plus `RELAY_*` environment overrides
//! - [`logging::init`]: subscriber setup for binaries
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use relay_models::JobKind;
//! use relay_runtime::{Engine, RelayConfig};
//! use relay_tmux::TmuxAdapter;
//!
//! # async fn demo() -> relay_runtime::Result<()> {
//! let config = RelayConfig::from_env();
//! let tmux = Arc::new(TmuxAdapter::new().with_timeout(config.command_timeout));
//! let engine = Engine::open(config, tmux)?;
//!
//! engine.bind_channel("general", "/home/me/project", None)?;
//! engine.enqueue("general", JobKind::Prompt, "run the test suite")?;
//! if let Some(report) = engine.dispatch_next("general").await? {
//!     println!("{} -> {}", report.job.id, report.job.status);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod logging;

pub use config::RelayConfig;
pub use engine::{DispatchReport, Engine, IdleReason, IdleReport};
pub use error::{EngineError, ErrorKind, Result};
pub use executor::{CaptureOptions, SequenceExecutor, SequenceOutcome};
