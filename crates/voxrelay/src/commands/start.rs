//! Start command - runs the relay in the foreground.

use anyhow::Result;
use clap::Args;
use tracing::info;
use voxrelay_server::RelayServer;

use super::{ConfigFileArgs, Context};

/// Arguments for the start command.
///
/// CLI arguments override config file values and environment variables.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Port to listen on (overrides config and WS_PORT)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind to (overrides config and VOXRELAY_BIND)
    #[arg(short, long)]
    pub bind: Option<String>,

    #[command(flatten)]
    pub file: ConfigFileArgs,
}

/// Run the start command.
pub async fn run(args: StartArgs, ctx: &Context) -> Result<()> {
    let loaded = super::load(args.file.config.as_deref())?;
    let relay = super::resolve(&loaded, args.port, args.bind.as_deref())?;

    if ctx.verbose {
        for path in loaded.loaded_from() {
            eprintln!("config: {}", path.display());
        }
    }

    info!(
        bind = %relay.bind_address,
        upstream = %relay.chat_url,
        config_id = relay.config_id.as_deref().unwrap_or("-"),
        api_key_source = %relay.credentials.api_key.source,
        "Starting voxrelay"
    );

    RelayServer::from_relay_config(&relay)
        .run_with_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received Ctrl-C");
    }
}
