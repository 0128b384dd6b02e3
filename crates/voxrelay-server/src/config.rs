//! Server configuration.

use std::net::SocketAddr;
use std::time::Duration;

use voxrelay_config::{
    DEFAULT_CHAT_URL, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_HEARTBEAT_SECS,
    DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_PORT, DEFAULT_RETAIN_CLOSED, RelayConfig,
};

use crate::bridge::SessionSettings;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the listener to.
    pub bind_address: SocketAddr,

    /// Provider realtime endpoint, without query parameters.
    pub upstream_url: String,

    /// EVI configuration id appended to every upstream URL.
    pub config_id: Option<String>,

    /// Period between liveness pings on an active session.
    pub heartbeat_interval: Duration,

    /// Upper bound on the upstream handshake.
    pub connect_timeout: Duration,

    /// Largest inbound client message in bytes. Larger messages end the
    /// client connection.
    pub max_message_size: usize,

    /// Closed sessions kept in the registry for polling.
    pub retain_closed_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            upstream_url: DEFAULT_CHAT_URL.to_string(),
            config_id: None,
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            retain_closed_sessions: DEFAULT_RETAIN_CLOSED,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bind address.
    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    /// Set the upstream endpoint.
    pub fn with_upstream_url(mut self, url: impl Into<String>) -> Self {
        self.upstream_url = url.into();
        self
    }

    /// Set the EVI configuration id. Empty ids clear it.
    pub fn with_config_id(mut self, config_id: Option<String>) -> Self {
        self.config_id = config_id.filter(|id| !id.is_empty());
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    pub fn with_retain_closed_sessions(mut self, count: usize) -> Self {
        self.retain_closed_sessions = count;
        self
    }

    /// Settings handed to each new session.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            upstream_url: self.upstream_url.clone(),
            config_id: self.config_id.clone(),
            heartbeat_interval: self.heartbeat_interval,
        }
    }
}

impl From<&RelayConfig> for ServerConfig {
    fn from(relay: &RelayConfig) -> Self {
        Self {
            bind_address: relay.bind_address,
            upstream_url: relay.chat_url.clone(),
            config_id: relay.config_id.clone(),
            heartbeat_interval: relay.heartbeat_interval,
            connect_timeout: relay.connect_timeout,
            max_message_size: relay.max_message_size,
            retain_closed_sessions: relay.retain_closed,
        }
    }
}
