//! Error types for the credential exchange.

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, OAuthError>;

/// Errors that can occur while obtaining a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OAuthError {
    /// Token endpoint answered with a non-2xx status.
    #[error("Token request failed: {status} {status_text}")]
    TokenRequestFailed { status: u16, status_text: String },

    /// Token endpoint answered with a body that is not a JSON object.
    #[error("Token response invalid: {0}")]
    TokenResponseInvalid(String),

    /// Token endpoint answered without a usable `access_token`.
    #[error("No access token received from provider")]
    TokenMissing,

    /// Network/HTTP transport error.
    #[error("Network error: {0}")]
    Network(String),
}
