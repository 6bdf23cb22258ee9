//! Kiosk supervisor daemon.
//!
//! Keeps a fixed set of dashboard sessions alive on a display host without
//! human intervention.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────────┐
//!                         │                  KIOSK SUPERVISOR                      │
//!                         │                                                        │
//!   Content heartbeats    │  ┌─────────┐    ┌────────────┐    ┌──────────────┐    │
//!   ──────────────────────┼─▶│ ingress │───▶│ supervisor │───▶│ health store │    │
//!   Host surface signals  │  │ server  │    │ (dispatch) │    └──────┬───────┘    │
//!   ──────────────────────┼─▶└─────────┘    └─────┬──────┘           │            │
//!                         │                       │                   ▼            │
//!                         │      ┌────────────────┼────────┐   ┌──────────────┐    │
//!                         │      ▼                ▼        │   │   watchdog   │    │
//!                         │ ┌──────────┐   ┌───────────┐   │   │  (periodic)  │    │
//!                         │ │ network  │   │   drift   │   │   └──────┬───────┘    │
//!                         │ │ backoff  │   │   guard   │   │          ▼            │
//!                         │ └────┬─────┘   └─────┬─────┘   │   ┌──────────────┐    │
//!                         │      │               │         └──▶│  escalator   │────┼──▶ relaunch
//!                         │      ▼               ▼             └──────────────┘    │
//!   Display host          │  ┌──────────────────────────┐                          │
//!   ◀─────────────────────┼──│ surface host (remote /   │                          │
//!                         │  │ headless)                │                          │
//!                         │  └──────────────────────────┘                          │
//!                         └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use kiosk_supervisor::config::loader::load_or_default;
use kiosk_supervisor::lifecycle::startup;
use kiosk_supervisor::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "kiosk-supervisor")]
#[command(about = "Self-healing supervisor for kiosk dashboard sessions", long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "KIOSK_CONFIG", default_value = "kiosk.toml")]
    config: PathBuf,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_or_default(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration {}: {}", args.config.display(), e);
            return ExitCode::FAILURE;
        }
    };

    if args.check {
        println!("Configuration OK");
        return ExitCode::SUCCESS;
    }

    let _log_guard = init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        screens = config.display.as_ref().map(|d| d.screen_count()).unwrap_or(0),
        host_mode = ?config.host.mode,
        "kiosk-supervisor starting"
    );

    match startup::run(config, &args.config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Fatal startup error");
            ExitCode::FAILURE
        }
    }
}
