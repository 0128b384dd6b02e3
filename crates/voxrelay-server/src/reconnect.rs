//! Client-side reconnect policy.
//!
//! Exponential backoff for callers that reopen a session after it closes.
//! The policy reads a [`SessionSnapshot`] and only retries after a clean
//! disconnect. Stop requests, exhausted credit, rejected credentials and
//! transport errors all end the retry loop.

use std::time::Duration;

use crate::registry::SessionSnapshot;
use crate::session::{SessionState, Termination};

/// Backoff base delay.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Upper bound on any single delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

/// The attempt counter stops growing here.
pub const DEFAULT_MAX_ATTEMPT: u32 = 6;

/// What a caller should do about a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// The session is still connecting or active.
    NotNeeded,
    /// Reconnect after `delay`; `attempt` is 1-based.
    Wait { attempt: u32, delay: Duration },
    /// Do not reconnect.
    Stop(StopReason),
}

/// Why reconnecting is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The session was stopped deliberately.
    StopRequested,
    /// The provider account is out of credit.
    QuotaExhausted,
    /// The credential exchange failed; retrying would repeat it.
    CredentialsRejected,
    /// The session ended on a connect failure or a socket error.
    ConnectionFailed,
}

#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    base: Duration,
    max_delay: Duration,
    max_attempt: u32,
    attempt: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY, DEFAULT_MAX_ATTEMPT)
    }
}

impl ReconnectPolicy {
    pub fn new(base: Duration, max_delay: Duration, max_attempt: u32) -> Self {
        Self {
            base,
            max_delay,
            max_attempt: max_attempt.max(1),
            attempt: 0,
        }
    }

    /// Delay before reconnect attempt `attempt` (1-based):
    /// `min(base * 2^(attempt-1), max_delay)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.clamp(1, self.max_attempt) - 1;
        let factor = 2u32.saturating_pow(exponent);
        self.base.saturating_mul(factor).min(self.max_delay)
    }

    /// Decide what to do about `snapshot`, advancing the attempt counter
    /// when a retry is scheduled.
    pub fn decide(&mut self, snapshot: &SessionSnapshot) -> ReconnectDecision {
        let termination = match snapshot.state {
            SessionState::Connecting | SessionState::Active => {
                return ReconnectDecision::NotNeeded;
            }
            SessionState::Closed(termination) => termination,
        };

        if snapshot.stop_requested {
            return ReconnectDecision::Stop(StopReason::StopRequested);
        }
        let refused = match termination {
            Termination::UpstreamClosed | Termination::DownstreamClosed => None,
            Termination::Stopped => Some(StopReason::StopRequested),
            Termination::FailedQuota => Some(StopReason::QuotaExhausted),
            Termination::FailedAuth => Some(StopReason::CredentialsRejected),
            Termination::FailedConnect
            | Termination::UpstreamError
            | Termination::DownstreamError => Some(StopReason::ConnectionFailed),
        };
        if let Some(reason) = refused {
            return ReconnectDecision::Stop(reason);
        }

        self.attempt = (self.attempt + 1).min(self.max_attempt);
        ReconnectDecision::Wait {
            attempt: self.attempt,
            delay: self.delay_for(self.attempt),
        }
    }

    /// Call after a session reaches `Active`.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionId;
    use chrono::Utc;

    fn closed(termination: Termination, stop_requested: bool) -> SessionSnapshot {
        SessionSnapshot {
            id: SessionId::new(),
            remote_addr: None,
            started_at: Utc::now(),
            state: SessionState::Closed(termination),
            stop_requested,
        }
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<u64> = (1..=8)
            .map(|n| policy.delay_for(n).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 10000, 10000, 10000, 10000]);
    }

    #[test]
    fn test_attempts_increase_then_cap() {
        let mut policy = ReconnectPolicy::default();
        let snapshot = closed(Termination::UpstreamClosed, false);

        for expected in [1, 2, 3, 4, 5, 6, 6, 6] {
            match policy.decide(&snapshot) {
                ReconnectDecision::Wait { attempt, .. } => assert_eq!(attempt, expected),
                other => panic!("unexpected decision {:?}", other),
            }
        }

        policy.reset();
        assert_eq!(
            policy.decide(&snapshot),
            ReconnectDecision::Wait {
                attempt: 1,
                delay: Duration::from_secs(1)
            }
        );
    }

    #[test]
    fn test_quota_stops_reconnect() {
        let mut policy = ReconnectPolicy::default();
        assert_eq!(
            policy.decide(&closed(Termination::FailedQuota, false)),
            ReconnectDecision::Stop(StopReason::QuotaExhausted)
        );
        assert_eq!(policy.attempt(), 0);
    }

    #[test]
    fn test_error_terminations_stop_reconnect() {
        let mut policy = ReconnectPolicy::default();
        let cases = [
            (Termination::FailedAuth, StopReason::CredentialsRejected),
            (Termination::FailedConnect, StopReason::ConnectionFailed),
            (Termination::UpstreamError, StopReason::ConnectionFailed),
            (Termination::DownstreamError, StopReason::ConnectionFailed),
        ];
        for (termination, reason) in cases {
            assert_eq!(
                policy.decide(&closed(termination, false)),
                ReconnectDecision::Stop(reason),
                "{} must not reconnect",
                termination
            );
        }
        assert_eq!(policy.attempt(), 0);
    }

    #[test]
    fn test_clean_disconnects_reconnect() {
        for termination in [Termination::UpstreamClosed, Termination::DownstreamClosed] {
            let mut policy = ReconnectPolicy::default();
            assert_eq!(
                policy.decide(&closed(termination, false)),
                ReconnectDecision::Wait {
                    attempt: 1,
                    delay: Duration::from_secs(1)
                }
            );
        }
    }

    #[test]
    fn test_stop_requested_wins() {
        let mut policy = ReconnectPolicy::default();
        assert_eq!(
            policy.decide(&closed(Termination::UpstreamClosed, true)),
            ReconnectDecision::Stop(StopReason::StopRequested)
        );
        assert_eq!(
            policy.decide(&closed(Termination::Stopped, false)),
            ReconnectDecision::Stop(StopReason::StopRequested)
        );
    }

    #[test]
    fn test_live_session_needs_nothing() {
        let mut policy = ReconnectPolicy::default();
        let mut snapshot = closed(Termination::UpstreamClosed, false);
        snapshot.state = SessionState::Active;
        assert_eq!(policy.decide(&snapshot), ReconnectDecision::NotNeeded);
    }
}
