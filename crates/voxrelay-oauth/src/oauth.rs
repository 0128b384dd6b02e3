//! OAuth 2.0 client-credentials flow against the provider token endpoint.

use std::time::Duration;

use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::header;
use serde::Deserialize;

use crate::credential::Credential;
use crate::error::{OAuthError, Result};

/// Provider token endpoint.
pub const HUME_TOKEN_URL: &str = "https://api.hume.ai/oauth2-cc/token";

/// Default time allowed for the token round trip.
pub const DEFAULT_TOKEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Token endpoint configuration.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub token_url: String,
    pub timeout: Duration,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self::hume()
    }
}

impl OAuthConfig {
    /// Config for the hosted provider endpoint.
    pub fn hume() -> Self {
        Self {
            token_url: HUME_TOKEN_URL.to_string(),
            timeout: DEFAULT_TOKEN_TIMEOUT,
        }
    }

    /// Config pointing at a custom token endpoint.
    pub fn with_token_url(token_url: impl Into<String>) -> Self {
        Self {
            token_url: token_url.into(),
            ..Self::hume()
        }
    }
}

/// Provider API key and secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub api_key: String,
    pub secret_key: String,
}

impl ClientCredentials {
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// `Authorization` header value: `Basic base64(api_key:secret)`.
    pub fn basic_authorization(&self) -> String {
        let raw = format!("{}:{}", self.api_key, self.secret_key);
        format!("Basic {}", STANDARD.encode(raw))
    }
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("api_key", &"***")
            .field("secret_key", &"***")
            .finish()
    }
}

/// Token endpoint response. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Turn a raw token endpoint response into a [`Credential`].
///
/// Status is checked first, then the body shape, then the token itself.
pub fn parse_token_response(status: reqwest::StatusCode, body: &str) -> Result<Credential> {
    if !status.is_success() {
        return Err(OAuthError::TokenRequestFailed {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
        });
    }

    let response: TokenResponse = serde_json::from_str(body)
        .map_err(|e| OAuthError::TokenResponseInvalid(e.to_string()))?;

    match response.access_token {
        Some(token) if !token.is_empty() => Ok(Credential::new(
            token,
            response.token_type,
            response.expires_in,
        )),
        _ => Err(OAuthError::TokenMissing),
    }
}

/// Exchange client credentials for a bearer token.
///
/// Performs exactly one request; retry policy belongs to the caller.
pub async fn exchange_client_credentials(
    client: &reqwest::Client,
    config: &OAuthConfig,
    credentials: &ClientCredentials,
) -> Result<Credential> {
    let response = client
        .post(&config.token_url)
        .header(header::AUTHORIZATION, credentials.basic_authorization())
        .form(&[("grant_type", "client_credentials")])
        .timeout(config.timeout)
        .send()
        .await
        .map_err(|e| OAuthError::Network(format!("Token request failed: {}", e)))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| OAuthError::Network(format!("Failed to read token response: {}", e)))?;

    let credential = parse_token_response(status, &body)?;
    tracing::debug!(
        token_len = credential.access_token().len(),
        expires_in = ?credential.expires_in,
        "Access token issued"
    );
    Ok(credential)
}
