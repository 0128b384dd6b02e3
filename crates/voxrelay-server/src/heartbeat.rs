//! Per-session liveness ping timer.
//!
//! The [`Heartbeat`] only produces ticks; the bridge decides what to send on
//! each. It never ends a session on its own.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Heartbeat timer owned by one session task.
#[derive(Debug)]
pub struct Heartbeat {
    period: Duration,
    interval: Option<Interval>,
    stopped: bool,
}

impl Heartbeat {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            interval: None,
            stopped: false,
        }
    }

    /// Start ticking. The first tick fires one period from now.
    ///
    /// No-op once running or after [`stop`](Self::stop).
    pub fn start(&mut self) {
        if self.interval.is_some() || self.stopped {
            return;
        }
        let mut interval = tokio::time::interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
    }

    /// Wait for the next tick. Pends forever while not running, so it can
    /// sit in a `select!` from the moment the session starts.
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    /// Cancel the timer. Returns `true` only for the first call, whether or
    /// not the timer ever started.
    pub fn stop(&mut self) -> bool {
        self.interval = None;
        !std::mem::replace(&mut self.stopped, true)
    }

    pub fn is_running(&self) -> bool {
        self.interval.is_some()
    }
}

#[derive(Serialize)]
struct PingMessage {
    #[serde(rename = "type")]
    kind: &'static str,
    timestamp: i64,
}

/// Application-level ping for the upstream leg.
pub fn ping_message(now: DateTime<Utc>) -> serde_json::Result<String> {
    serde_json::to_string(&PingMessage {
        kind: "ping",
        timestamp: now.timestamp_millis(),
    })
}
