//! tmux-relay CLI entry point.

use std::sync::Arc;

use clap::Parser;
use tracing::debug;

use relay_cli::cli::Cli;
use relay_cli::commands::{self, Output};
use relay_runtime::{logging, Engine, RelayConfig};
use relay_tmux::{CommandRunner, TmuxAdapter};

#[tokio::main]
async fn main() {
    // Load .env.local or .env if present
    let _ = dotenvy::from_filename(".env.local").or_else(|_| dotenvy::dotenv());

    let cli = Cli::parse();
    logging::init(cli.verbose);

    let mut config = RelayConfig::from_env();
    if let Some(dir) = cli.state_dir.clone() {
        config.state_dir = dir;
    }
    debug!(?config, "configuration loaded");

    let runner = CommandRunner::new("tmux")
        .with_timeout(config.command_timeout)
        .with_max_output_bytes(config.max_output_bytes);
    let tmux = Arc::new(TmuxAdapter::with_runner(runner));

    let engine = match Engine::open(config, tmux) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let out = Output { json: cli.json };
    if let Err(e) = commands::execute(&engine, cli.command, out).await {
        eprintln!("Error: {}", e);
        eprintln!("\n{}", e.user_guide());
        std::process::exit(1);
    }
}
