//! Registry of live and recently closed sessions.
//!
//! Each session publishes its [`SessionState`] through a `watch` channel and
//! keeps the sending half; the registry holds the receiver and the stop
//! handle. Closed sessions stay visible for polling until more than
//! `retain_closed` newer ones have closed. Once [`SessionRegistry::shut_down`]
//! runs, every session registered afterwards starts out stop-requested.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::session::{SessionControl, SessionId, SessionState};

const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Point-in-time view of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub remote_addr: Option<SocketAddr>,
    pub started_at: DateTime<Utc>,
    pub state: SessionState,
    pub stop_requested: bool,
}

impl SessionSnapshot {
    /// Whether a client may open a replacement session.
    ///
    /// Only sessions that closed cleanly qualify, and never ones that were
    /// stopped on request.
    pub fn reconnect_allowed(&self) -> bool {
        match self.state {
            SessionState::Closed(termination) => {
                !self.stop_requested && !termination.suppresses_reconnect()
            }
            _ => false,
        }
    }
}

/// Handed to the session task at registration.
#[derive(Debug)]
pub struct SessionTicket {
    pub id: SessionId,
    pub control: Arc<SessionControl>,
    pub state: watch::Sender<SessionState>,
}

#[derive(Debug)]
struct Entry {
    remote_addr: Option<SocketAddr>,
    started_at: DateTime<Utc>,
    control: Arc<SessionControl>,
    state: watch::Receiver<SessionState>,
}

impl Entry {
    fn snapshot(&self, id: SessionId) -> SessionSnapshot {
        SessionSnapshot {
            id,
            remote_addr: self.remote_addr,
            started_at: self.started_at,
            state: *self.state.borrow(),
            stop_requested: self.control.is_stop_requested(),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    live: HashMap<SessionId, Entry>,
    closed: VecDeque<(SessionId, Entry)>,
    shutting_down: bool,
}

/// Shared, cloneable session registry.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    inner: Arc<Mutex<Inner>>,
    retain_closed: usize,
}

impl SessionRegistry {
    pub fn new(retain_closed: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            retain_closed,
        }
    }

    /// Register a new session in the `Connecting` state.
    ///
    /// After shutdown has begun the session is stopped before it starts.
    pub fn register(&self, remote_addr: Option<SocketAddr>) -> SessionTicket {
        let id = SessionId::new();
        let control = Arc::new(SessionControl::new());
        let (tx, rx) = watch::channel(SessionState::Connecting);

        let mut inner = self.inner.lock();
        if inner.shutting_down {
            control.request_stop();
        }
        inner.live.insert(
            id,
            Entry {
                remote_addr,
                started_at: Utc::now(),
                control: Arc::clone(&control),
                state: rx,
            },
        );

        SessionTicket {
            id,
            control,
            state: tx,
        }
    }

    /// Move a finished session to the closed list, evicting the oldest
    /// closed entries beyond the retention bound.
    pub fn retire(&self, id: SessionId) {
        let mut inner = self.inner.lock();
        let Some(entry) = inner.live.remove(&id) else {
            return;
        };
        if self.retain_closed == 0 {
            return;
        }
        inner.closed.push_back((id, entry));
        while inner.closed.len() > self.retain_closed {
            inner.closed.pop_front();
        }
    }

    pub fn get(&self, id: SessionId) -> Option<SessionSnapshot> {
        let inner = self.inner.lock();
        if let Some(entry) = inner.live.get(&id) {
            return Some(entry.snapshot(id));
        }
        inner
            .closed
            .iter()
            .find(|(closed_id, _)| *closed_id == id)
            .map(|(_, entry)| entry.snapshot(id))
    }

    /// All known sessions, oldest first.
    pub fn list(&self) -> Vec<SessionSnapshot> {
        let inner = self.inner.lock();
        let mut sessions: Vec<SessionSnapshot> = inner
            .live
            .iter()
            .map(|(id, entry)| entry.snapshot(*id))
            .chain(inner.closed.iter().map(|(id, entry)| entry.snapshot(*id)))
            .collect();
        sessions.sort_by_key(|s| s.started_at);
        sessions
    }

    /// Request that a live session stop. Returns `false` if the session is
    /// unknown or already closed.
    pub fn request_stop(&self, id: SessionId) -> bool {
        let inner = self.inner.lock();
        match inner.live.get(&id) {
            Some(entry) => {
                entry.control.request_stop();
                true
            }
            None => false,
        }
    }

    /// Stop every live session and every one registered from now on.
    /// Returns how many live sessions were asked.
    pub fn shut_down(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.shutting_down = true;
        for entry in inner.live.values() {
            entry.control.request_stop();
        }
        inner.live.len()
    }

    pub fn live_count(&self) -> usize {
        self.inner.lock().live.len()
    }

    /// Wait for every live session to retire. Returns `false` on timeout.
    pub async fn wait_until_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.live_count() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(IDLE_POLL_INTERVAL).await;
        }
        true
    }

    /// Wait until the session's state satisfies `pred`.
    ///
    /// Returns the matching state, or `None` if the session is unknown or its
    /// task went away first.
    pub async fn wait_for<F>(&self, id: SessionId, pred: F) -> Option<SessionState>
    where
        F: Fn(&SessionState) -> bool,
    {
        let mut rx = {
            let inner = self.inner.lock();
            inner
                .live
                .get(&id)
                .map(|e| e.state.clone())
                .or_else(|| {
                    inner
                        .closed
                        .iter()
                        .find(|(closed_id, _)| *closed_id == id)
                        .map(|(_, e)| e.state.clone())
                })?
        };
        let state = rx.wait_for(|s| pred(s)).await.ok()?;
        Some(*state)
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(voxrelay_config::DEFAULT_RETAIN_CLOSED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Termination;

    fn addr() -> Option<SocketAddr> {
        Some("127.0.0.1:50000".parse().unwrap())
    }

    #[test]
    fn test_register_and_get() {
        let registry = SessionRegistry::new(4);
        let ticket = registry.register(addr());

        let snapshot = registry.get(ticket.id).unwrap();
        assert_eq!(snapshot.state, SessionState::Connecting);
        assert_eq!(snapshot.remote_addr, addr());
        assert!(!snapshot.stop_requested);
        assert_eq!(registry.live_count(), 1);
    }

    #[test]
    fn test_state_updates_are_visible() {
        let registry = SessionRegistry::new(4);
        let ticket = registry.register(None);

        ticket.state.send_replace(SessionState::Active);
        assert_eq!(registry.get(ticket.id).unwrap().state, SessionState::Active);
    }

    #[test]
    fn test_request_stop() {
        let registry = SessionRegistry::new(4);
        let ticket = registry.register(None);

        assert!(registry.request_stop(ticket.id));
        assert!(ticket.control.is_stop_requested());
        assert!(registry.get(ticket.id).unwrap().stop_requested);
        assert!(!registry.request_stop(SessionId::new()));
    }

    #[test]
    fn test_retire_keeps_bounded_history() {
        let registry = SessionRegistry::new(2);
        let tickets: Vec<_> = (0..3).map(|_| registry.register(None)).collect();
        for ticket in &tickets {
            ticket
                .state
                .send_replace(SessionState::Closed(Termination::DownstreamClosed));
            registry.retire(ticket.id);
        }

        assert_eq!(registry.live_count(), 0);
        assert!(registry.get(tickets[0].id).is_none());
        assert!(registry.get(tickets[1].id).is_some());
        assert!(registry.get(tickets[2].id).is_some());
        assert_eq!(registry.list().len(), 2);
        assert!(!registry.request_stop(tickets[2].id));
    }

    #[test]
    fn test_shut_down_stops_live_sessions() {
        let registry = SessionRegistry::new(2);
        let a = registry.register(None);
        let b = registry.register(None);

        assert_eq!(registry.shut_down(), 2);
        assert!(a.control.is_stop_requested());
        assert!(b.control.is_stop_requested());
    }

    #[test]
    fn test_register_after_shut_down_is_stopped() {
        let registry = SessionRegistry::new(2);
        assert_eq!(registry.shut_down(), 0);

        let late = registry.register(None);
        assert!(late.control.is_stop_requested());
        assert!(registry.get(late.id).unwrap().stop_requested);
    }

    #[test]
    fn test_reconnect_allowed() {
        let snapshot = |state, stop_requested| SessionSnapshot {
            id: SessionId::new(),
            remote_addr: None,
            started_at: Utc::now(),
            state,
            stop_requested,
        };

        let closed = |termination, stop_requested| {
            snapshot(SessionState::Closed(termination), stop_requested).reconnect_allowed()
        };

        assert!(!snapshot(SessionState::Active, false).reconnect_allowed());
        assert!(closed(Termination::UpstreamClosed, false));
        assert!(!closed(Termination::UpstreamClosed, true));
        assert!(!closed(Termination::FailedQuota, false));
        assert!(!closed(Termination::FailedAuth, false));
    }

    #[tokio::test]
    async fn test_wait_for_closed_state() {
        let registry = SessionRegistry::new(2);
        let ticket = registry.register(None);
        let id = ticket.id;

        let state_tx = ticket.state;
        tokio::spawn(async move {
            state_tx.send_replace(SessionState::Active);
            state_tx.send_replace(SessionState::Closed(Termination::FailedQuota));
        });

        let state = registry.wait_for(id, SessionState::is_closed).await;
        assert_eq!(state, Some(SessionState::Closed(Termination::FailedQuota)));
    }
}
