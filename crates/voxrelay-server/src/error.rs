//! Error types for the relay server.

use std::net::SocketAddr;

use thiserror::Error;

/// Relay error type.
///
/// Only [`RelayError::Bind`] and [`RelayError::Io`] ever reach the process;
/// dial errors are absorbed by the session that hit them.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The upstream WebSocket could not be opened.
    #[error("Upstream connect failed: {0}")]
    UpstreamConnectFailed(String),

    /// The configured upstream URL does not parse.
    #[error("Invalid upstream URL '{url}': {reason}")]
    InvalidUpstreamUrl { url: String, reason: String },

    /// The listening socket could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Serving failed after bind.
    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
