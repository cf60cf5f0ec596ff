//! # Q IDE console
//!
//! Runs an interactive R session on the terminal through the Q IDE console
//! engine: prompt-aware output framing, a serialized command queue and the
//! environment pane's housekeeping commands as `:` commands.
//!
//! ## Architecture
//!
//! This is Layer 3 - the binary that ties together:
//! - qide-core: Configuration, errors and session events
//! - qide-process: Interpreter lookup and process I/O
//! - qide-session: Command queue, output framer and session controller

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use qide::ConsoleApp;
use qide_core::IdeConfig;
use qide_session::{SessionController, StartupProfile};

/// Line-oriented R console.
#[derive(Debug, Parser)]
#[command(name = "qide", version, about)]
struct Args {
    /// Configuration file (YAML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// R executable to use instead of searching for one
    #[arg(long = "r", value_name = "PATH")]
    r_executable: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => IdeConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => IdeConfig::default(),
    };
    if let Some(path) = args.r_executable {
        config.interpreter.executable = Some(path);
    }

    // Initialize logging; stdout belongs to the console
    let level = args
        .log_level
        .unwrap_or_else(|| config.logging.level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("qide v{} starting", env!("CARGO_PKG_VERSION"));

    let (mut session, events) = SessionController::channel(config.interpreter.clone());
    if config.environment.install_profile {
        match StartupProfile::from_settings(&config.environment).install() {
            Ok(env) => {
                for (key, value) in env {
                    session = session.with_env(key, value);
                }
            }
            Err(e) => tracing::warn!("Startup profile not installed: {}", e),
        }
    }

    let mut app = ConsoleApp::stdio(session, events, &config);
    app.run(BufReader::new(tokio::io::stdin())).await?;

    tracing::info!("qide shutting down");

    Ok(())
}
