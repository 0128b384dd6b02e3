//! Common test utilities for integration tests.
//!
//! [`FakeProvider`] serves a token endpoint and a realtime WebSocket on a
//! local port; [`TestRelay`] runs the production relay against it.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, bail};
use axum::Router;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::routing::{get, post};
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::CloseFrame as ClientCloseFrame;
use tokio_tungstenite::tungstenite::Message as ClientMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use voxrelay_config::{VoxrelayConfig, resolve_with_env};
use voxrelay_server::{RelayServer, SessionRegistry, SessionSnapshot};

/// Client side of a relay connection.
pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long any single wait in these tests may take.
pub const WAIT: Duration = Duration::from_secs(5);

/// Token endpoint reply.
#[derive(Debug, Clone)]
pub struct TokenReply {
    pub status: StatusCode,
    pub body: String,
}

impl TokenReply {
    pub fn ok(token: &str) -> Self {
        Self {
            status: StatusCode::OK,
            body: serde_json::json!({
                "access_token": token,
                "token_type": "Bearer",
                "expires_in": 1800,
            })
            .to_string(),
        }
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body: body.to_string(),
        }
    }
}

/// What the fake realtime endpoint does with a connection.
#[derive(Debug, Clone)]
pub enum UpstreamBehavior {
    /// Record every data frame and send it back.
    Echo,
    /// Close immediately with this code and reason.
    CloseWith { code: u16, reason: String },
}

struct ProviderState {
    token: TokenReply,
    behavior: UpstreamBehavior,
    token_requests: AtomicUsize,
    authorizations: Mutex<Vec<String>>,
    connections: Mutex<Vec<String>>,
    received: Mutex<Vec<Message>>,
    closes_received: AtomicUsize,
}

/// Local stand-in for the provider's token and realtime endpoints.
pub struct FakeProvider {
    pub addr: SocketAddr,
    state: Arc<ProviderState>,
    _handle: JoinHandle<()>,
}

impl FakeProvider {
    pub async fn start(token: TokenReply, behavior: UpstreamBehavior) -> Result<Self> {
        let state = Arc::new(ProviderState {
            token,
            behavior,
            token_requests: AtomicUsize::new(0),
            authorizations: Mutex::new(Vec::new()),
            connections: Mutex::new(Vec::new()),
            received: Mutex::new(Vec::new()),
            closes_received: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/oauth2-cc/token", post(token_handler))
            .route("/v0/evi/chat", get(chat_handler))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            addr,
            state,
            _handle: handle,
        })
    }

    pub fn token_url(&self) -> String {
        format!("http://{}/oauth2-cc/token", self.addr)
    }

    pub fn chat_url(&self) -> String {
        format!("ws://{}/v0/evi/chat", self.addr)
    }

    pub fn token_requests(&self) -> usize {
        self.state.token_requests.load(Ordering::SeqCst)
    }

    /// `Authorization` headers seen by the token endpoint.
    pub fn authorizations(&self) -> Vec<String> {
        self.state.authorizations.lock().clone()
    }

    /// Raw query strings of every realtime connection.
    pub fn connections(&self) -> Vec<String> {
        self.state.connections.lock().clone()
    }

    /// Data frames the realtime endpoint received, in order.
    pub fn received(&self) -> Vec<Message> {
        self.state.received.lock().clone()
    }

    /// Close frames the realtime endpoint received.
    pub fn closes_received(&self) -> usize {
        self.state.closes_received.load(Ordering::SeqCst)
    }
}

async fn token_handler(
    State(state): State<Arc<ProviderState>>,
    headers: HeaderMap,
) -> (StatusCode, String) {
    state.token_requests.fetch_add(1, Ordering::SeqCst);
    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        state.authorizations.lock().push(auth.to_string());
    }
    (state.token.status, state.token.body.clone())
}

async fn chat_handler(
    ws: WebSocketUpgrade,
    RawQuery(query): RawQuery,
    State(state): State<Arc<ProviderState>>,
) -> Response {
    state.connections.lock().push(query.unwrap_or_default());
    ws.on_upgrade(move |socket| upstream_session(state, socket))
}

async fn upstream_session(state: Arc<ProviderState>, mut socket: WebSocket) {
    if let UpstreamBehavior::CloseWith { code, reason } = &state.behavior {
        let frame = CloseFrame {
            code: *code,
            reason: reason.clone().into(),
        };
        let _ = socket.send(Message::Close(Some(frame))).await;
    }

    while let Some(Ok(msg)) = socket.recv().await {
        match msg {
            Message::Text(_) | Message::Binary(_) => {
                state.received.lock().push(msg.clone());
                if matches!(state.behavior, UpstreamBehavior::Echo)
                    && socket.send(msg).await.is_err()
                {
                    break;
                }
            }
            Message::Close(_) => {
                state.closes_received.fetch_add(1, Ordering::SeqCst);
                break;
            }
            _ => {}
        }
    }
}

/// The relay under test, wired to a [`FakeProvider`].
pub struct TestRelay {
    pub addr: SocketAddr,
    pub sessions: SessionRegistry,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<voxrelay_server::Result<()>>,
}

impl TestRelay {
    pub async fn start(provider: &FakeProvider) -> Result<Self> {
        let file = VoxrelayConfig::from_toml(&format!(
            r#"
[provider]
token_url = "{}"
chat_url = "{}"
config_id = "cfg-test"

[server]
bind = "127.0.0.1"
port = 0
"#,
            provider.token_url(),
            provider.chat_url()
        ))?;
        let relay = resolve_with_env(&file, |name| match name {
            "HUME_API_KEY" => Some("test-key".to_string()),
            "HUME_SECRET_KEY" => Some("test-secret".to_string()),
            _ => None,
        })?;

        let server = RelayServer::from_relay_config(&relay);
        let sessions = server.sessions();

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve(listener, async move {
            let _ = rx.await;
        }));

        Ok(Self {
            addr,
            sessions,
            shutdown: Some(tx),
            handle,
        })
    }

    pub async fn connect(&self) -> Result<Client> {
        let (client, _) = connect_async(format!("ws://{}/", self.addr)).await?;
        Ok(client)
    }

    /// Poll the registry until some session matches `pred`.
    pub async fn wait_for_session<F>(&self, pred: F) -> Result<SessionSnapshot>
    where
        F: Fn(&SessionSnapshot) -> bool,
    {
        let found = timeout(WAIT, async {
            loop {
                if let Some(snapshot) = self.sessions.list().into_iter().find(|s| pred(s)) {
                    return snapshot;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        match found {
            Ok(snapshot) => Ok(snapshot),
            Err(_) => bail!("Timeout waiting for session; have {:?}", self.sessions.list()),
        }
    }

    /// Trigger graceful shutdown and wait for the server to return.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        timeout(WAIT, self.handle).await???;
        Ok(())
    }
}

/// Read until the relay closes the client. Returns the close frame.
pub async fn recv_close(client: &mut Client) -> Result<Option<ClientCloseFrame>> {
    match timeout(WAIT, read_until_close(client)).await {
        Ok(result) => result,
        Err(_) => bail!("Timeout waiting for close frame"),
    }
}

async fn read_until_close(client: &mut Client) -> Result<Option<ClientCloseFrame>> {
    while let Some(msg) = client.next().await {
        if let ClientMessage::Close(frame) = msg? {
            return Ok(frame);
        }
    }
    bail!("Connection ended without a close frame")
}

/// Poll `cond` until it holds.
pub async fn eventually<F>(cond: F) -> Result<()>
where
    F: Fn() -> bool,
{
    let result = timeout(WAIT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    match result {
        Ok(()) => Ok(()),
        Err(_) => bail!("Condition not met in time"),
    }
}
