//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [provider]               # voice provider credentials and endpoints
//! [server]                 # listening socket
//! [session]                # per-session timers and limits
//! ```

use serde::{Deserialize, Serialize};

/// Default listening port for the relay.
pub const DEFAULT_PORT: u16 = 8787;

/// Default bind host.
pub const DEFAULT_BIND: &str = "0.0.0.0";

/// Provider OAuth token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://api.hume.ai/oauth2-cc/token";

/// Provider realtime chat endpoint.
pub const DEFAULT_CHAT_URL: &str = "wss://api.hume.ai/v0/evi/chat";

/// Heartbeat period in seconds.
pub const DEFAULT_HEARTBEAT_SECS: u64 = 25;

/// Token request timeout in seconds.
pub const DEFAULT_TOKEN_TIMEOUT_SECS: u64 = 10;

/// Upstream handshake timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Largest inbound WebSocket message accepted from clients (16 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Closed sessions kept around for status polling.
pub const DEFAULT_RETAIN_CLOSED: usize = 256;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VoxrelayConfig {
    /// Voice provider settings.
    pub provider: Option<ProviderConfig>,

    /// Listening socket settings.
    pub server: Option<ServerConfig>,

    /// Per-session settings.
    pub session: Option<SessionConfig>,
}

impl VoxrelayConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections are replaced whole, not field by field.
    pub fn merge(&mut self, other: VoxrelayConfig) {
        if other.provider.is_some() {
            self.provider = other.provider;
        }

        if other.server.is_some() {
            self.server = other.server;
        }

        if other.session.is_some() {
            self.session = other.session;
        }
    }

    /// Whether any secret is stored in plaintext in this config.
    pub fn has_plaintext_secrets(&self) -> bool {
        self.provider
            .as_ref()
            .is_some_and(|p| p.api_key.is_some() || p.secret_key.is_some())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Provider Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// `[provider]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API key (prefer the `HUME_API_KEY` env var).
    pub api_key: Option<String>,
    /// Secret key (prefer the `HUME_SECRET_KEY` env var).
    pub secret_key: Option<String>,
    /// Optional EVI configuration id.
    pub config_id: Option<String>,
    /// OAuth client-credentials token endpoint.
    pub token_url: String,
    /// Realtime WebSocket endpoint.
    pub chat_url: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            secret_key: None,
            config_id: None,
            token_url: DEFAULT_TOKEN_URL.to_string(),
            chat_url: DEFAULT_CHAT_URL.to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to listen on.
    pub port: u16,
    /// Address to bind to.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// `[session]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds between heartbeat pings.
    pub heartbeat_interval_secs: u64,
    /// Seconds allowed for the token exchange.
    pub token_timeout_secs: u64,
    /// Seconds allowed for the upstream handshake.
    pub connect_timeout_secs: u64,
    /// Largest client message in bytes.
    pub max_message_size: usize,
    /// Closed sessions retained for status polling.
    pub retain_closed: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_SECS,
            token_timeout_secs: DEFAULT_TOKEN_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            retain_closed: DEFAULT_RETAIN_CLOSED,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
