//! Shared relay state and the upgrade handler.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use tracing::info;
use voxrelay_oauth::SharedCredentialSource;

use crate::bridge::{SessionBridge, SessionReport};
use crate::config::ServerConfig;
use crate::leg::Leg;
use crate::registry::SessionRegistry;
use crate::upstream::SharedDialer;

/// State shared by every connection.
#[derive(Clone)]
pub struct RelayState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,

    /// Issues one credential per session.
    pub credentials: SharedCredentialSource,

    /// Opens upstream legs.
    pub dialer: SharedDialer,

    /// Live and recently closed sessions.
    pub registry: SessionRegistry,
}

impl RelayState {
    pub fn new(
        config: ServerConfig,
        credentials: SharedCredentialSource,
        dialer: SharedDialer,
    ) -> Self {
        let registry = SessionRegistry::new(config.retain_closed_sessions);
        Self {
            config: Arc::new(config),
            credentials,
            dialer,
            registry,
        }
    }
}

/// Upgrade any request to a relay session.
pub async fn relay_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    State(state): State<RelayState>,
) -> Response {
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| async move {
            run_session(state, socket, remote_addr).await;
        })
}

/// Run one session on an upgraded socket and retire it afterwards.
pub async fn run_session(
    state: RelayState,
    socket: WebSocket,
    remote_addr: SocketAddr,
) -> SessionReport {
    let ticket = state.registry.register(Some(remote_addr));
    let id = ticket.id;
    info!(session_id = %id, remote_addr = %remote_addr, "Client connected");

    let bridge = SessionBridge::new(
        ticket,
        state.config.session_settings(),
        Arc::clone(&state.credentials),
        Arc::clone(&state.dialer),
    );
    let report = bridge.run(Leg::from_axum(socket)).await;

    state.registry.retire(id);
    report
}
