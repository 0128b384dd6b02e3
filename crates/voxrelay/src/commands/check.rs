//! Check command - validates configuration and tries the credentials.

use anyhow::{Context as _, Result};
use clap::Args;
use voxrelay_oauth::{
    ClientCredentials, ClientCredentialsExchanger, CredentialSource, OAuthConfig,
};

use super::{ConfigFileArgs, Context};

/// Arguments for the check command.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Only validate configuration; skip the token exchange
    #[arg(long)]
    pub offline: bool,

    #[command(flatten)]
    pub file: ConfigFileArgs,
}

/// Run the check command.
pub async fn run(args: CheckArgs, ctx: &Context) -> Result<()> {
    let loaded = super::load(args.file.config.as_deref())?;
    let relay = super::resolve(&loaded, None, None)?;

    println!("Configuration OK");
    println!("  api key:    {}", relay.credentials.api_key.source);
    println!("  secret key: {}", relay.credentials.secret_key.source);
    if ctx.verbose {
        println!("  token url:  {}", relay.token_url);
    }

    if args.offline {
        return Ok(());
    }

    let exchanger = ClientCredentialsExchanger::new(
        OAuthConfig {
            token_url: relay.token_url.clone(),
            timeout: relay.token_timeout,
        },
        ClientCredentials::new(
            relay.credentials.api_key.value.clone(),
            relay.credentials.secret_key.value.clone(),
        ),
    );
    let credential = exchanger
        .fetch()
        .await
        .context("Token exchange failed")?;

    println!(
        "Token exchange OK ({} character token)",
        credential.access_token().len()
    );
    Ok(())
}
