//! Upstream connector: URL construction and the dialer seam.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite;
use url::Url;
use voxrelay_oauth::Credential;

use crate::error::{RelayError, Result};
use crate::leg::Leg;

/// Where to send users whose provider account ran out of credit.
pub const BILLING_URL: &str = "https://platform.hume.ai/billing";

const ACCESS_TOKEN_PARAM: &str = "access_token";
const REDACTED: &str = "***";

/// Whether a close reason or handshake error signals exhausted credit.
pub fn is_quota_exhausted(reason: &str) -> bool {
    reason.to_ascii_lowercase().contains("credit balance")
}

/// The per-session upstream endpoint.
///
/// `Display` and `Debug` both hide the access token; only [`as_str`]
/// yields the real URL and it should go nowhere but the dialer.
///
/// [`as_str`]: UpstreamUrl::as_str
#[derive(Clone, PartialEq, Eq)]
pub struct UpstreamUrl {
    url: Url,
}

impl UpstreamUrl {
    /// Build the endpoint from the base chat URL, a fresh credential and an
    /// optional configuration id. Empty ids are ignored.
    pub fn build(base: &str, credential: &Credential, config_id: Option<&str>) -> Result<Self> {
        let mut url = Url::parse(base).map_err(|e| RelayError::InvalidUpstreamUrl {
            url: base.to_string(),
            reason: e.to_string(),
        })?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair(ACCESS_TOKEN_PARAM, credential.access_token())
                .append_pair("verbose_transcription", "true");
            if let Some(id) = config_id.filter(|id| !id.is_empty()) {
                query.append_pair("config_id", id);
            }
        }

        Ok(Self { url })
    }

    /// The full URL including the token.
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// The URL with `access_token` replaced by `***`.
    pub fn redacted(&self) -> String {
        let pairs: Vec<(String, String)> = self
            .url
            .query_pairs()
            .map(|(k, v)| {
                let v = if k == ACCESS_TOKEN_PARAM {
                    REDACTED.to_string()
                } else {
                    v.into_owned()
                };
                (k.into_owned(), v)
            })
            .collect();

        let mut redacted = self.url.clone();
        redacted.query_pairs_mut().clear().extend_pairs(pairs);
        redacted.to_string()
    }
}

impl std::fmt::Display for UpstreamUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.redacted())
    }
}

impl std::fmt::Debug for UpstreamUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("UpstreamUrl").field(&self.redacted()).finish()
    }
}

/// Opens the upstream leg for a session.
#[async_trait]
pub trait UpstreamDialer: Send + Sync {
    async fn dial(&self, url: &UpstreamUrl) -> Result<Leg>;
}

/// Shared dialer handle.
pub type SharedDialer = Arc<dyn UpstreamDialer>;

/// Production dialer over tokio-tungstenite with native TLS.
#[derive(Debug, Clone)]
pub struct TungsteniteDialer {
    connect_timeout: Duration,
}

impl TungsteniteDialer {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl UpstreamDialer for TungsteniteDialer {
    async fn dial(&self, url: &UpstreamUrl) -> Result<Leg> {
        tracing::info!(url = %url, "Connecting to upstream");

        let handshake = tokio::time::timeout(self.connect_timeout, connect_async(url.as_str()));
        match handshake.await {
            Ok(Ok((socket, response))) => {
                tracing::debug!(status = %response.status(), "Upstream handshake complete");
                Ok(Leg::from_tungstenite(socket))
            }
            Ok(Err(e)) => Err(RelayError::UpstreamConnectFailed(describe_handshake_error(e))),
            Err(_) => Err(RelayError::UpstreamConnectFailed(format!(
                "handshake timed out after {}s",
                self.connect_timeout.as_secs()
            ))),
        }
    }
}

/// Render a handshake failure, keeping the HTTP body when the provider
/// rejected the upgrade so quota messages survive.
fn describe_handshake_error(err: tungstenite::Error) -> String {
    match err {
        tungstenite::Error::Http(response) => {
            let body = response
                .body()
                .as_ref()
                .map(|b| String::from_utf8_lossy(b).trim().to_string())
                .unwrap_or_default();
            if body.is_empty() {
                format!("HTTP {}", response.status())
            } else {
                format!("HTTP {}: {}", response.status(), body)
            }
        }
        other => other.to_string(),
    }
}
