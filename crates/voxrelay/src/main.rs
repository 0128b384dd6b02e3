//! voxrelay - WebSocket relay for realtime voice sessions
//!
//! Main entry point for the voxrelay CLI.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{check, config, start};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// voxrelay - WebSocket relay for realtime voice sessions
#[derive(Parser)]
#[command(name = "voxrelay")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the relay server
    Start(start::StartArgs),

    /// Validate configuration and test the provider credentials
    Check(check::CheckArgs),

    /// Show the resolved configuration
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console (human-readable) + rotating JSON file
    let filter = if cli.verbose {
        concat!(
            "voxrelay=debug,voxrelay_server=debug,voxrelay_oauth=debug,",
            "voxrelay_config=debug,tower_http=debug,info"
        )
    } else {
        "voxrelay=info,voxrelay_server=info,voxrelay_oauth=info,warn"
    };

    let log_dir = voxrelay_config::xdg_config_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| std::path::PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "voxrelay.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(concat!(
                    "voxrelay=trace,voxrelay_server=trace,voxrelay_oauth=trace,",
                    "voxrelay_config=trace,info"
                ))),
        )
        .init();

    let ctx = commands::Context {
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Start(args) => start::run(args, &ctx).await,
        Commands::Check(args) => check::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
