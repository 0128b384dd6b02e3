//! Transport-neutral WebSocket frames.
//!
//! The downstream leg is an axum socket and the upstream leg a
//! tokio-tungstenite client; both convert into [`Frame`] so the bridge never
//! touches either library's message type. Payloads pass through untouched.

use axum::extract::ws::{self, Message as AxumMessage};
use bytes::Bytes;
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};

/// Normal closure.
pub const CLOSE_NORMAL: u16 = 1000;

/// Policy violation. Used for rejected credentials and exhausted quota.
pub const CLOSE_POLICY: u16 = 1008;

/// Internal error. Used when the upstream leg cannot be opened.
pub const CLOSE_INTERNAL: u16 = 1011;

/// Largest close reason the protocol allows, in bytes.
pub const MAX_CLOSE_REASON_BYTES: usize = 123;

/// A close code plus human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub reason: String,
}

impl CloseReason {
    /// Build a close reason, truncating the text to the protocol limit.
    pub fn new(code: u16, reason: impl AsRef<str>) -> Self {
        Self {
            code,
            reason: truncate_reason(reason.as_ref()),
        }
    }

    pub fn normal() -> Self {
        Self::new(CLOSE_NORMAL, "")
    }

    pub fn policy(reason: impl AsRef<str>) -> Self {
        Self::new(CLOSE_POLICY, reason)
    }

    pub fn internal(reason: impl AsRef<str>) -> Self {
        Self::new(CLOSE_INTERNAL, reason)
    }

    /// Copy of this reason that is legal to put on the wire.
    ///
    /// Codes reserved for local signalling (1005, 1006, 1015) and anything
    /// outside the valid ranges become a normal closure.
    pub fn sanitized(&self) -> Self {
        let code = match self.code {
            1005 | 1006 | 1015 => CLOSE_NORMAL,
            1000..=1014 | 3000..=4999 => self.code,
            _ => CLOSE_NORMAL,
        };
        Self::new(code, &self.reason)
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.reason.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} {}", self.code, self.reason)
        }
    }
}

/// Truncate `reason` to [`MAX_CLOSE_REASON_BYTES`] on a char boundary.
pub fn truncate_reason(reason: &str) -> String {
    if reason.len() <= MAX_CLOSE_REASON_BYTES {
        return reason.to_string();
    }
    let mut end = MAX_CLOSE_REASON_BYTES;
    while !reason.is_char_boundary(end) {
        end -= 1;
    }
    reason[..end].to_string()
}

/// One WebSocket message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
    Ping(Bytes),
    Pong(Bytes),
    Close(Option<CloseReason>),
}

impl Frame {
    /// Data frames are the only ones the bridge forwards.
    pub fn is_data(&self) -> bool {
        matches!(self, Frame::Text(_) | Frame::Binary(_))
    }

    pub fn from_axum(msg: AxumMessage) -> Self {
        match msg {
            AxumMessage::Text(text) => Frame::Text(text.as_str().to_owned()),
            AxumMessage::Binary(data) => Frame::Binary(data),
            AxumMessage::Ping(data) => Frame::Ping(data),
            AxumMessage::Pong(data) => Frame::Pong(data),
            AxumMessage::Close(close) => Frame::Close(close.map(|c| CloseReason {
                code: c.code,
                reason: c.reason.as_str().to_owned(),
            })),
        }
    }

    /// Raw protocol frames surface as `None`; they never reach callers of
    /// a stream in message mode.
    pub fn from_tungstenite(msg: WsMessage) -> Option<Self> {
        match msg {
            WsMessage::Text(text) => Some(Frame::Text(text.as_str().to_owned())),
            WsMessage::Binary(data) => Some(Frame::Binary(data)),
            WsMessage::Ping(data) => Some(Frame::Ping(data)),
            WsMessage::Pong(data) => Some(Frame::Pong(data)),
            WsMessage::Close(close) => Some(Frame::Close(close.map(|c| CloseReason {
                code: u16::from(c.code),
                reason: c.reason.as_str().to_owned(),
            }))),
            WsMessage::Frame(_) => None,
        }
    }
}

impl From<Frame> for AxumMessage {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => AxumMessage::Text(text.into()),
            Frame::Binary(data) => AxumMessage::Binary(data),
            Frame::Ping(data) => AxumMessage::Ping(data),
            Frame::Pong(data) => AxumMessage::Pong(data),
            Frame::Close(close) => AxumMessage::Close(close.map(|c| ws::CloseFrame {
                code: c.code,
                reason: c.reason.into(),
            })),
        }
    }
}

impl From<Frame> for WsMessage {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => WsMessage::Text(text.into()),
            Frame::Binary(data) => WsMessage::Binary(data),
            Frame::Ping(data) => WsMessage::Ping(data),
            Frame::Pong(data) => WsMessage::Pong(data),
            Frame::Close(close) => WsMessage::Close(close.map(|c| {
                tungstenite::protocol::CloseFrame {
                    code: c.code.into(),
                    reason: c.reason.into(),
                }
            })),
        }
    }
}
