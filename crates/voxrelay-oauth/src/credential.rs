//! Bearer credentials and the sources that issue them.
//!
//! A relay session fetches exactly one credential and never shares it with
//! another session, so nothing here caches tokens.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{OAuthError, Result};
use crate::oauth::{ClientCredentials, OAuthConfig, exchange_client_credentials};

// ============================================================================
// Credential
// ============================================================================

/// An opaque bearer token plus the context it was issued in.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    access_token: String,
    pub token_type: Option<String>,
    pub expires_in: Option<u64>,
    pub issued_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(
        access_token: impl Into<String>,
        token_type: Option<String>,
        expires_in: Option<u64>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            token_type,
            expires_in,
            issued_at: Utc::now(),
        }
    }

    /// Create a bare bearer credential.
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self::new(access_token, Some("Bearer".to_string()), None)
    }

    /// The raw token. Never log this.
    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"***")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

// ============================================================================
// CredentialSource Trait
// ============================================================================

/// Something that can issue a fresh bearer credential.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Obtain a new credential. Called once per session.
    async fn fetch(&self) -> Result<Credential>;
}

/// Shared credential source for use across sessions.
pub type SharedCredentialSource = Arc<dyn CredentialSource>;

// ============================================================================
// ClientCredentialsExchanger
// ============================================================================

/// Production source: performs the client-credentials exchange.
#[derive(Debug, Clone)]
pub struct ClientCredentialsExchanger {
    client: reqwest::Client,
    config: OAuthConfig,
    credentials: ClientCredentials,
}

impl ClientCredentialsExchanger {
    /// Create an exchanger with its own HTTP client.
    pub fn new(config: OAuthConfig, credentials: ClientCredentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            credentials,
        }
    }
}

#[async_trait]
impl CredentialSource for ClientCredentialsExchanger {
    async fn fetch(&self) -> Result<Credential> {
        exchange_client_credentials(&self.client, &self.config, &self.credentials).await
    }
}

// ============================================================================
// StaticCredentialSource (for testing)
// ============================================================================

/// Fixed-outcome source for tests. Counts how often it was asked.
#[derive(Debug)]
pub struct StaticCredentialSource {
    outcome: std::result::Result<String, OAuthError>,
    fetch_count: AtomicU32,
}

impl StaticCredentialSource {
    /// Always issue `token`.
    pub fn token(token: impl Into<String>) -> Self {
        Self {
            outcome: Ok(token.into()),
            fetch_count: AtomicU32::new(0),
        }
    }

    /// Always fail with `error`.
    pub fn failing(error: OAuthError) -> Self {
        Self {
            outcome: Err(error),
            fetch_count: AtomicU32::new(0),
        }
    }

    pub fn fetch_count(&self) -> u32 {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialSource for StaticCredentialSource {
    async fn fetch(&self) -> Result<Credential> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            Ok(token) => Ok(Credential::bearer(token.clone())),
            Err(e) => Err(e.clone()),
        }
    }
}
