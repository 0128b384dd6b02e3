//! Config command - configuration inspection.

use anyhow::Result;
use clap::{Args, Subcommand};
use voxrelay_config::{
    ENV_API_KEY, ENV_BIND, ENV_CONFIG_ID, ENV_PORT, ENV_SECRET_KEY, RelayConfig, ResolvedSecret,
};

use super::{ConfigFileArgs, Context};

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: Option<ConfigCommand>,

    #[command(flatten)]
    pub file: ConfigFileArgs,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the resolved configuration with secrets redacted (default)
    Show,

    /// Show which config files are loaded and their precedence
    Which,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command.unwrap_or(ConfigCommand::Show) {
        ConfigCommand::Show => cmd_show(&args.file, ctx),
        ConfigCommand::Which => cmd_which(&args.file),
    }
}

fn cmd_show(file: &ConfigFileArgs, ctx: &Context) -> Result<()> {
    let loaded = super::load(file.config.as_deref())?;
    let relay = super::resolve(&loaded, None, None)?;

    println!("# voxrelay configuration\n");

    let sources = loaded.loaded_from();
    if sources.is_empty() {
        println!("No config files loaded (using defaults)\n");
    } else {
        println!("Config files:");
        for source in &sources {
            println!("  {}", source.display());
        }
        println!();
    }

    print!("{}", render(&relay));

    if ctx.verbose && !loaded.config.has_plaintext_secrets() {
        println!("\n---\nRaw config:\n");
        if let Ok(toml_str) = loaded.config.to_toml() {
            println!("{}", toml_str);
        }
    }

    Ok(())
}

fn cmd_which(file: &ConfigFileArgs) -> Result<()> {
    let loaded = super::load(file.config.as_deref())?;

    println!("Config file search order (later overrides earlier):\n");
    for source in &loaded.sources {
        let status = if source.loaded {
            "✓ loaded"
        } else {
            "· not found"
        };
        println!("  {} {}", status, source.path.display());
    }
    println!();
    let overrides = [ENV_API_KEY, ENV_SECRET_KEY, ENV_CONFIG_ID, ENV_PORT, ENV_BIND];
    println!("Environment overrides: {}", overrides.join(", "));
    Ok(())
}

fn redacted(secret: &ResolvedSecret) -> String {
    format!("*** ({})", secret.source)
}

/// Human-readable resolved config. Secret values never appear.
fn render(relay: &RelayConfig) -> String {
    let mut out = String::new();
    out.push_str("Provider:\n");
    out.push_str(&format!("  api_key:    {}\n", redacted(&relay.credentials.api_key)));
    out.push_str(&format!("  secret_key: {}\n", redacted(&relay.credentials.secret_key)));
    out.push_str(&format!(
        "  config_id:  {}\n",
        relay.config_id.as_deref().unwrap_or("(none)")
    ));
    out.push_str(&format!("  token_url:  {}\n", relay.token_url));
    out.push_str(&format!("  chat_url:   {}\n", relay.chat_url));
    out.push_str("\nServer:\n");
    out.push_str(&format!("  bind: {}\n", relay.bind_address));
    out.push_str("\nSession:\n");
    out.push_str(&format!(
        "  heartbeat_interval: {}s\n",
        relay.heartbeat_interval.as_secs()
    ));
    out.push_str(&format!("  token_timeout:      {}s\n", relay.token_timeout.as_secs()));
    out.push_str(&format!(
        "  connect_timeout:    {}s\n",
        relay.connect_timeout.as_secs()
    ));
    out.push_str(&format!("  max_message_size:   {}\n", relay.max_message_size));
    out.push_str(&format!("  retain_closed:      {}\n", relay.retain_closed));
    out
}
