//! Channel-backed legs and dialers for exercising the bridge without sockets.
//!
//! Compiled for unit tests and behind the `testing` feature for integration
//! suites.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::{FutureExt, SinkExt, StreamExt};
use tokio::sync::mpsc as tokio_mpsc;

use crate::error::{RelayError, Result};
use crate::frame::Frame;
use crate::leg::{Leg, LegError, LegSide};
use crate::upstream::{UpstreamDialer, UpstreamUrl};

/// The far end of a channel leg.
///
/// Dropping the peer ends the leg's stream, which the bridge sees as the
/// remote side going away without a close frame.
#[derive(Debug)]
pub struct LegPeer {
    to_leg: mpsc::UnboundedSender<std::result::Result<Frame, LegError>>,
    from_leg: mpsc::UnboundedReceiver<Frame>,
}

impl LegPeer {
    /// Deliver a frame to the leg. Returns `false` if the leg is gone.
    pub fn send(&self, frame: Frame) -> bool {
        self.to_leg.unbounded_send(Ok(frame)).is_ok()
    }

    /// Make the leg's next read fail.
    pub fn send_err(&self, error: LegError) -> bool {
        self.to_leg.unbounded_send(Err(error)).is_ok()
    }

    /// Next frame the leg sent, or `None` once the leg's sink is gone.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.from_leg.next().await
    }

    /// Every frame the leg sends until its sink is closed or dropped.
    pub async fn drain(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(frame) = self.from_leg.next().await {
            frames.push(frame);
        }
        frames
    }

    /// Frames already sent, without waiting.
    pub fn buffered(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(Some(frame)) = self.from_leg.next().now_or_never() {
            frames.push(frame);
        }
        frames
    }
}

/// A leg wired to an in-memory peer.
pub fn channel_leg(side: LegSide) -> (Leg, LegPeer) {
    let (to_leg, leg_rx) = mpsc::unbounded();
    let (leg_tx, from_leg) = mpsc::unbounded();

    let sink = leg_tx.sink_map_err(|_| LegError::Closed);
    let leg = Leg::new(side, Box::pin(sink), Box::pin(leg_rx));
    (leg, LegPeer { to_leg, from_leg })
}

/// The far end of a [`stalled_leg`]. It can feed the leg but never reads
/// what the leg sends.
#[derive(Debug)]
pub struct StalledPeer {
    to_leg: mpsc::UnboundedSender<std::result::Result<Frame, LegError>>,
    _unread: mpsc::Receiver<Frame>,
}

impl StalledPeer {
    /// Deliver a frame to the leg. Returns `false` if the leg is gone.
    pub fn send(&self, frame: Frame) -> bool {
        self.to_leg.unbounded_send(Ok(frame)).is_ok()
    }
}

/// A leg whose peer has stopped reading. Its sink accepts one frame and then
/// blocks for as long as the peer lives.
pub fn stalled_leg(side: LegSide) -> (Leg, StalledPeer) {
    let (to_leg, leg_rx) = mpsc::unbounded();
    let (leg_tx, unread) = mpsc::channel(0);

    let sink = leg_tx.sink_map_err(|_| LegError::Closed);
    let leg = Leg::new(side, Box::pin(sink), Box::pin(leg_rx));
    (
        leg,
        StalledPeer {
            to_leg,
            _unread: unread,
        },
    )
}

/// An upstream leg handed out by [`ChannelDialer`].
#[derive(Debug)]
pub struct DialedUpstream {
    /// The full URL the bridge dialed, token included.
    pub url: String,
    pub peer: LegPeer,
}

#[derive(Debug, Clone)]
enum DialOutcome {
    Connect,
    Fail(String),
    Hang,
}

/// Dialer that counts dial attempts and hands the peer of each new upstream
/// leg to the test through a channel.
#[derive(Debug)]
pub struct ChannelDialer {
    outcome: DialOutcome,
    dial_count: AtomicUsize,
    peers: Option<tokio_mpsc::UnboundedSender<DialedUpstream>>,
}

impl ChannelDialer {
    /// A dialer whose connections always succeed.
    pub fn connecting() -> (Self, tokio_mpsc::UnboundedReceiver<DialedUpstream>) {
        let (tx, rx) = tokio_mpsc::unbounded_channel();
        (Self::with_outcome(DialOutcome::Connect, Some(tx)), rx)
    }

    /// A dialer whose connections always fail with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_outcome(DialOutcome::Fail(message.into()), None)
    }

    /// A dialer whose handshakes never complete.
    pub fn hanging() -> Self {
        Self::with_outcome(DialOutcome::Hang, None)
    }

    fn with_outcome(
        outcome: DialOutcome,
        peers: Option<tokio_mpsc::UnboundedSender<DialedUpstream>>,
    ) -> Self {
        Self {
            outcome,
            dial_count: AtomicUsize::new(0),
            peers,
        }
    }

    pub fn dial_count(&self) -> usize {
        self.dial_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpstreamDialer for ChannelDialer {
    async fn dial(&self, url: &UpstreamUrl) -> Result<Leg> {
        self.dial_count.fetch_add(1, Ordering::SeqCst);

        match &self.outcome {
            DialOutcome::Connect => {
                let (leg, peer) = channel_leg(LegSide::Upstream);
                if let Some(peers) = &self.peers {
                    let _ = peers.send(DialedUpstream {
                        url: url.as_str().to_string(),
                        peer,
                    });
                }
                Ok(leg)
            }
            DialOutcome::Fail(message) => Err(RelayError::UpstreamConnectFailed(message.clone())),
            DialOutcome::Hang => futures::future::pending().await,
        }
    }
}
