//! Relay config resolution. Turns the layered file config plus environment
//! into a validated [`RelayConfig`].
//!
//! Nothing can start a relay without going through here, so missing or
//! placeholder credentials are caught before any socket is bound.

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use crate::secrets::{ResolvedSecret, resolve_secret};
use crate::{ConfigError, ProviderConfig, Result, ServerConfig, SessionConfig, VoxrelayConfig};

/// Provider API key.
pub const ENV_API_KEY: &str = "HUME_API_KEY";

/// Provider secret key.
pub const ENV_SECRET_KEY: &str = "HUME_SECRET_KEY";

/// Optional EVI configuration id.
pub const ENV_CONFIG_ID: &str = "HUME_CONFIG_ID";

/// Listening port.
pub const ENV_PORT: &str = "WS_PORT";

/// Bind host.
pub const ENV_BIND: &str = "VOXRELAY_BIND";

/// Validated provider credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCredentials {
    pub api_key: ResolvedSecret,
    pub secret_key: ResolvedSecret,
}

impl ProviderCredentials {
    /// Resolve both credentials, rejecting missing and placeholder values.
    pub fn resolve<F>(provider: &ProviderConfig, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = required_secret(
            "HUME_API_KEY",
            ENV_API_KEY,
            provider.api_key.as_deref(),
            &env,
        )?;
        let secret_key = required_secret(
            "HUME_SECRET_KEY",
            ENV_SECRET_KEY,
            provider.secret_key.as_deref(),
            &env,
        )?;
        Ok(Self {
            api_key,
            secret_key,
        })
    }
}

fn required_secret<F>(
    name: &str,
    env_var: &str,
    config_value: Option<&str>,
    env: &F,
) -> Result<ResolvedSecret>
where
    F: Fn(&str) -> Option<String>,
{
    let secret =
        resolve_secret(env_var, config_value, env).ok_or_else(|| ConfigError::MissingCredential {
            name: name.to_string(),
            env_var: env_var.to_string(),
        })?;
    if secret.is_placeholder() {
        return Err(ConfigError::PlaceholderCredential {
            name: name.to_string(),
        });
    }
    Ok(secret)
}

/// A fully resolved relay configuration ready to start a server.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Provider API key and secret.
    pub credentials: ProviderCredentials,
    /// Optional EVI configuration id (never empty).
    pub config_id: Option<String>,
    /// Token endpoint.
    pub token_url: String,
    /// Realtime WebSocket endpoint.
    pub chat_url: String,
    /// Listening address.
    pub bind_address: SocketAddr,
    /// Heartbeat period.
    pub heartbeat_interval: Duration,
    /// Token request timeout.
    pub token_timeout: Duration,
    /// Upstream handshake timeout.
    pub connect_timeout: Duration,
    /// Largest client message in bytes.
    pub max_message_size: usize,
    /// Closed sessions retained for polling.
    pub retain_closed: usize,
}

/// Resolve against the process environment.
pub fn resolve_relay_config(config: &VoxrelayConfig) -> Result<RelayConfig> {
    resolve_with_env(config, |name| std::env::var(name).ok())
}

/// Resolve against an arbitrary environment lookup.
pub fn resolve_with_env<F>(config: &VoxrelayConfig, env: F) -> Result<RelayConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let provider = config.provider.clone().unwrap_or_default();
    let server = config.server.clone().unwrap_or_default();
    let session = config.session.clone().unwrap_or_default();

    let credentials = ProviderCredentials::resolve(&provider, &env)?;

    let config_id = env(ENV_CONFIG_ID)
        .or(provider.config_id.clone())
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());

    validate_url("provider.token_url", &provider.token_url, &["http", "https"])?;
    validate_url("provider.chat_url", &provider.chat_url, &["ws", "wss"])?;

    let bind_address = resolve_bind_address(&server, &env)?;
    let session = validate_session(session)?;

    Ok(RelayConfig {
        credentials,
        config_id,
        token_url: provider.token_url,
        chat_url: provider.chat_url,
        bind_address,
        heartbeat_interval: Duration::from_secs(session.heartbeat_interval_secs),
        token_timeout: Duration::from_secs(session.token_timeout_secs),
        connect_timeout: Duration::from_secs(session.connect_timeout_secs),
        max_message_size: session.max_message_size,
        retain_closed: session.retain_closed,
    })
}

fn validate_url(field: &str, value: &str, schemes: &[&str]) -> Result<()> {
    let parsed = url::Url::parse(value).map_err(|e| ConfigError::InvalidValue {
        field: field.to_string(),
        reason: e.to_string(),
    })?;
    if !schemes.contains(&parsed.scheme()) {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!(
                "scheme '{}' not supported (expected one of {})",
                parsed.scheme(),
                schemes.join(", ")
            ),
        });
    }
    Ok(())
}

fn resolve_bind_address<F>(server: &ServerConfig, env: &F) -> Result<SocketAddr>
where
    F: Fn(&str) -> Option<String>,
{
    let port = match env(ENV_PORT).filter(|p| !p.is_empty()) {
        Some(raw) => raw.trim().parse::<u16>().map_err(|e| ConfigError::InvalidValue {
            field: ENV_PORT.to_string(),
            reason: format!("'{}' is not a port: {}", raw, e),
        })?,
        None => server.port,
    };
    let host = env(ENV_BIND)
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| server.bind.clone());

    (host.as_str(), port)
        .to_socket_addrs()
        .map_err(|e| ConfigError::InvalidValue {
            field: "server.bind".to_string(),
            reason: format!("cannot resolve '{}': {}", host, e),
        })?
        .next()
        .ok_or_else(|| ConfigError::InvalidValue {
            field: "server.bind".to_string(),
            reason: format!("'{}' resolved to no addresses", host),
        })
}

fn validate_session(session: SessionConfig) -> Result<SessionConfig> {
    let positive = [
        ("session.heartbeat_interval_secs", session.heartbeat_interval_secs),
        ("session.token_timeout_secs", session.token_timeout_secs),
        ("session.connect_timeout_secs", session.connect_timeout_secs),
    ];
    for (field, value) in positive {
        if value == 0 {
            return Err(ConfigError::InvalidValue {
                field: field.to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
    }
    if session.max_message_size == 0 {
        return Err(ConfigError::InvalidValue {
            field: "session.max_message_size".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(session)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
