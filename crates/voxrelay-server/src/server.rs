//! The relay server: listener, router and shutdown.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use voxrelay_config::RelayConfig;
use voxrelay_oauth::{
    ClientCredentials, ClientCredentialsExchanger, OAuthConfig, SharedCredentialSource,
};

use crate::config::ServerConfig;
use crate::error::{RelayError, Result};
use crate::registry::SessionRegistry;
use crate::state::{RelayState, relay_handler};
use crate::upstream::{SharedDialer, TungsteniteDialer};

/// How long shutdown waits for stopped sessions to finish closing.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// The voxrelay WebSocket relay.
pub struct RelayServer {
    state: RelayState,
}

impl RelayServer {
    /// Create a server with explicit credential and dialer seams.
    pub fn new(
        config: ServerConfig,
        credentials: SharedCredentialSource,
        dialer: SharedDialer,
    ) -> Self {
        Self {
            state: RelayState::new(config, credentials, dialer),
        }
    }

    /// Create the production server from a validated configuration.
    pub fn from_relay_config(relay: &RelayConfig) -> Self {
        let credentials = ClientCredentials::new(
            relay.credentials.api_key.value.clone(),
            relay.credentials.secret_key.value.clone(),
        );
        let oauth = OAuthConfig {
            token_url: relay.token_url.clone(),
            timeout: relay.token_timeout,
        };
        let exchanger = ClientCredentialsExchanger::new(oauth, credentials);
        let dialer = TungsteniteDialer::new(relay.connect_timeout);

        Self::new(ServerConfig::from(relay), Arc::new(exchanger), Arc::new(dialer))
    }

    /// Handle to the session registry.
    pub fn sessions(&self) -> SessionRegistry {
        self.state.registry.clone()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// Every path upgrades to a relay session; there are no other routes.
    pub fn router(&self) -> Router {
        Router::new()
            .fallback(relay_handler)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind the configured address and serve until the process ends.
    pub async fn run(self) -> Result<()> {
        self.run_with_shutdown(std::future::pending()).await
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    pub async fn run_with_shutdown<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.state.config.bind_address;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| RelayError::Bind { addr, source })?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already-bound listener.
    ///
    /// When `shutdown` resolves the listener stops accepting and every live
    /// session is asked to stop. Upgrades that complete after that point are
    /// stopped as soon as they register. The call returns once all sessions
    /// have closed or the drain timeout passes.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener.local_addr()?;
        let registry = self.state.registry.clone();
        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();

        info!(addr = %local_addr, "Relay listening");

        let stopper = registry.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                let stopped = stopper.shut_down();
                info!(sessions = stopped, "Shutting down relay");
            })
            .await?;

        if !registry.wait_until_idle(DRAIN_TIMEOUT).await {
            warn!(
                remaining = registry.live_count(),
                "Sessions still open after shutdown drain"
            );
        }
        info!("Relay stopped");
        Ok(())
    }
}
