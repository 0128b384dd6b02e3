//! One side of a relay session.
//!
//! A [`Leg`] wraps a frame sink and a frame stream together with an `open`
//! flag. Closing is idempotent: the first call sends a close frame and shuts
//! the sink, every later call is a no-op. A close never waits on the peer
//! longer than [`CLOSE_TIMEOUT`].

use std::pin::Pin;
use std::time::Duration;

use axum::extract::ws::{Message as AxumMessage, WebSocket};
use futures::{Sink, SinkExt, Stream, StreamExt, future};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::frame::{CloseReason, Frame};

/// Longest a close may wait for a peer that stopped reading.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Boxed frame sink.
pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = LegError> + Send>>;

/// Boxed frame stream.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, LegError>> + Send>>;

/// Which side of the session a leg is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegSide {
    /// The browser client.
    Downstream,
    /// The voice provider.
    Upstream,
}

impl std::fmt::Display for LegSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LegSide::Downstream => write!(f, "downstream"),
            LegSide::Upstream => write!(f, "upstream"),
        }
    }
}

/// Errors on an individual leg.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LegError {
    /// The underlying socket failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The leg's sink is gone.
    #[error("leg already closed")]
    Closed,
}

impl LegError {
    pub fn transport(e: impl std::fmt::Display) -> Self {
        LegError::Transport(e.to_string())
    }
}

/// A sink/stream pair plus open state.
pub struct Leg {
    side: LegSide,
    sink: FrameSink,
    stream: FrameStream,
    open: bool,
}

impl Leg {
    pub fn new(side: LegSide, sink: FrameSink, stream: FrameStream) -> Self {
        Self {
            side,
            sink,
            stream,
            open: true,
        }
    }

    /// Wrap an accepted axum socket as the downstream leg.
    pub fn from_axum(socket: WebSocket) -> Self {
        let (tx, rx) = socket.split();
        let sink = tx
            .sink_map_err(LegError::transport)
            .with(|frame: Frame| future::ready(Ok::<_, LegError>(AxumMessage::from(frame))));
        let stream = rx.map(|msg| msg.map(Frame::from_axum).map_err(LegError::transport));
        Self::new(LegSide::Downstream, Box::pin(sink), Box::pin(stream))
    }

    /// Wrap a tokio-tungstenite client stream as the upstream leg.
    pub fn from_tungstenite<S>(socket: WebSocketStream<S>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = socket.split();
        let sink = tx
            .sink_map_err(LegError::transport)
            .with(|frame: Frame| future::ready(Ok::<_, LegError>(WsMessage::from(frame))));
        let stream = rx.filter_map(|msg| {
            future::ready(match msg {
                Ok(msg) => Frame::from_tungstenite(msg).map(Ok),
                Err(e) => Some(Err(LegError::transport(e))),
            })
        });
        Self::new(LegSide::Upstream, Box::pin(sink), Box::pin(stream))
    }

    /// Borrow the inbound and outbound halves separately, so one task can
    /// read and write the leg concurrently.
    pub(crate) fn halves(&mut self) -> (&mut FrameStream, &mut FrameSink) {
        (&mut self.stream, &mut self.sink)
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Next inbound frame; `None` once the peer has gone away.
    pub async fn next(&mut self) -> Option<Result<Frame, LegError>> {
        self.stream.next().await
    }

    /// Record that the peer ended the leg; nothing more is sent.
    pub fn mark_closed(&mut self) {
        self.open = false;
    }

    /// Close the leg, sending `reason` if given.
    ///
    /// Returns `true` only for the call that actually closed it.
    pub async fn close(&mut self, reason: Option<CloseReason>) -> bool {
        if !self.open {
            return false;
        }
        self.open = false;

        let side = self.side;
        let sink = &mut self.sink;
        let frame = Frame::Close(reason.map(|r| r.sanitized()));
        let shutdown = async move {
            if let Err(e) = sink.send(frame).await {
                tracing::debug!(leg = %side, error = %e, "Close frame not delivered");
            }
            if let Err(e) = sink.close().await {
                tracing::debug!(leg = %side, error = %e, "Sink close failed");
            }
        };
        if tokio::time::timeout(CLOSE_TIMEOUT, shutdown).await.is_err() {
            tracing::debug!(leg = %side, "Peer not reading; abandoning close");
        }
        true
    }
}

impl std::fmt::Debug for Leg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Leg")
            .field("side", &self.side)
            .field("open", &self.open)
            .finish()
    }
}
