//! CLI command handlers.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use voxrelay_config::{ENV_BIND, ENV_PORT, LoadedConfig, RelayConfig};

pub mod check;
pub mod config;
pub mod start;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Verbose output enabled.
    pub verbose: bool,
}

/// Config file selection shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigFileArgs {
    /// Path to config file (loaded after discovered config files)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Discover and merge config files, printing load warnings to stderr.
pub fn load(config: Option<&Path>) -> Result<LoadedConfig> {
    let loaded = voxrelay_config::load_config_with_options(None, None, config)?;
    for warning in &loaded.warnings {
        eprintln!("warning: {}", warning);
    }
    Ok(loaded)
}

/// Resolve the loaded config against the process environment.
///
/// `port` and `bind` come from CLI flags and win over the `WS_PORT` and
/// `VOXRELAY_BIND` variables.
pub fn resolve(
    loaded: &LoadedConfig,
    port: Option<u16>,
    bind: Option<&str>,
) -> Result<RelayConfig> {
    let relay = voxrelay_config::resolve_with_env(&loaded.config, |name| match name {
        ENV_PORT => port
            .map(|p| p.to_string())
            .or_else(|| std::env::var(name).ok()),
        ENV_BIND => bind
            .map(str::to_string)
            .or_else(|| std::env::var(name).ok()),
        _ => std::env::var(name).ok(),
    })?;
    Ok(relay)
}
