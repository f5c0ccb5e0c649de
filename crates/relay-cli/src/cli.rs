//! Command-line interface definition using clap.

use clap::{Parser, Subcommand};
use relay_models::JobKind;
use std::path::PathBuf;

/// tmux-relay - drive interactive terminal programs on behalf of chat channels
#[derive(Parser, Debug)]
#[command(name = "relay")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to state directory
    #[arg(short, long, env = "RELAY_STATE_DIR", global = true)]
    pub state_dir: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bind a channel to a working directory
    Bind {
        channel: String,
        /// Directory the session starts in
        dir: PathBuf,
        /// Session name (default: <prefix>-<channel>)
        #[arg(long)]
        session: Option<String>,
    },

    /// Remove a channel's binding
    Unbind { channel: String },

    /// List bound channels
    Channels,

    /// Type text into a channel's session and press Enter
    Send { channel: String, text: String },

    /// Play key notation into a channel's session
    Keys { channel: String, notation: String },

    /// Queue a job for a channel
    Enqueue {
        channel: String,
        /// Prompt text or key notation (ignored for capture jobs)
        #[arg(default_value = "")]
        payload: String,
        #[arg(short, long, value_enum, default_value = "prompt")]
        kind: KindArg,
    },

    /// Dispatch pending jobs for a channel
    Run {
        channel: String,
        /// Keep dispatching until the queue is empty
        #[arg(short, long)]
        all: bool,
    },

    /// Show a channel's jobs
    Queue { channel: String },

    /// Cancel a job
    Cancel { job_id: String },

    /// Capture a channel's pane
    Capture {
        channel: String,
        /// Print the whole capture instead of the summary
        #[arg(long)]
        full: bool,
    },

    /// Poll a channel until it prompts, errors or goes quiet
    Wait { channel: String },

    /// Show tracked session state
    Status { channel: Option<String> },

    /// Clear waiting state of channels whose prompt timed out
    Timeouts,

    /// Remove old completed jobs
    Cleanup {
        /// Age threshold in hours
        #[arg(long, default_value_t = 24)]
        hours: u32,
    },

    /// Kill a channel's session
    Kill { channel: String },

    /// Clear a channel's scrollback
    Clear { channel: String },

    /// Show the key notation guide
    Guide,
}

/// Job kind as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum KindArg {
    Prompt,
    Keys,
    Capture,
}

impl From<KindArg> for JobKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Prompt => JobKind::Prompt,
            KindArg::Keys => JobKind::Keys,
            KindArg::Capture => JobKind::Capture,
        }
    }
}
