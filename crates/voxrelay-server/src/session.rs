//! Session identity, lifecycle state and stop control.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use uuid::Uuid;

/// Identifier for one downstream/upstream pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The browser closed its socket.
    DownstreamClosed,
    /// The browser socket failed.
    DownstreamError,
    /// The provider closed its socket.
    UpstreamClosed,
    /// The provider socket failed.
    UpstreamError,
    /// No credential could be obtained.
    FailedAuth,
    /// The upstream handshake failed.
    FailedConnect,
    /// The provider account has no credit left.
    FailedQuota,
    /// Stop was requested through the registry or by shutdown.
    Stopped,
}

impl Termination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Termination::DownstreamClosed => "downstream_closed",
            Termination::DownstreamError => "downstream_error",
            Termination::UpstreamClosed => "upstream_closed",
            Termination::UpstreamError => "upstream_error",
            Termination::FailedAuth => "failed_auth",
            Termination::FailedConnect => "failed_connect",
            Termination::FailedQuota => "failed_quota",
            Termination::Stopped => "stopped",
        }
    }

    /// Ended before or while setting up the upstream leg.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Termination::FailedAuth | Termination::FailedConnect | Termination::FailedQuota
        )
    }

    /// A client must not reconnect after this outcome.
    ///
    /// Only a clean close from either side may be retried.
    pub fn suppresses_reconnect(&self) -> bool {
        !matches!(self, Termination::UpstreamClosed | Termination::DownstreamClosed)
    }
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable session state. Moves only forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "termination", rename_all = "snake_case")]
pub enum SessionState {
    Connecting,
    Active,
    Closed(Termination),
}

impl SessionState {
    pub fn is_closed(&self) -> bool {
        matches!(self, SessionState::Closed(_))
    }

    pub fn termination(&self) -> Option<Termination> {
        match self {
            SessionState::Closed(t) => Some(*t),
            _ => None,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Active => write!(f, "active"),
            SessionState::Closed(t) => write!(f, "closed ({})", t),
        }
    }
}

/// Stop handle shared between a session task and its observers.
///
/// Once `stop_requested` is set it never clears, and the session starts no
/// new forward or connect work.
#[derive(Debug, Default)]
pub struct SessionControl {
    cancel: CancellationToken,
    stop_requested: AtomicBool,
}

impl SessionControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the session to stop. Returns `true` for the first request.
    pub fn request_stop(&self) -> bool {
        let first = !self.stop_requested.swap(true, Ordering::SeqCst);
        self.cancel.cancel();
        first
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// Resolves once stop has been requested.
    pub fn stopped(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }
}
