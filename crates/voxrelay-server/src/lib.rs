//! WebSocket relay between browser clients and the voice provider.
//!
//! Each accepted client socket becomes a session: the relay exchanges the
//! provider API key and secret for a bearer token, dials the provider's
//! realtime endpoint, and forwards frames unchanged in both directions until
//! either side closes.
//!
//! # Components
//!
//! - [`bridge`]: one task per session; connect, forward, tear down
//! - [`upstream`]: upstream URL construction and the [`UpstreamDialer`] seam
//! - [`heartbeat`]: periodic liveness pings on active sessions
//! - [`registry`]: live and recently closed sessions, stop requests
//! - [`reconnect`]: backoff policy for callers that reopen sessions
//! - [`server`]: listener, router, graceful shutdown
//!
//! # Example
//!
//! ```ignore
//! use voxrelay_config::{load_config, resolve_relay_config};
//! use voxrelay_server::RelayServer;
//!
//! let loaded = load_config(None)?;
//! let relay = resolve_relay_config(&loaded.config)?;
//! RelayServer::from_relay_config(&relay)
//!     .run_with_shutdown(async { tokio::signal::ctrl_c().await.ok(); })
//!     .await?;
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod frame;
pub mod heartbeat;
pub mod leg;
pub mod reconnect;
pub mod registry;
pub mod server;
pub mod session;
pub mod state;
pub mod upstream;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use bridge::{SessionBridge, SessionReport, SessionSettings};
pub use config::ServerConfig;
pub use error::{RelayError, Result};
pub use frame::{CloseReason, Frame};
pub use leg::{Leg, LegError, LegSide};
pub use reconnect::{ReconnectDecision, ReconnectPolicy, StopReason};
pub use registry::{SessionRegistry, SessionSnapshot};
pub use server::RelayServer;
pub use session::{SessionId, SessionState, Termination};
pub use state::RelayState;
pub use upstream::{SharedDialer, TungsteniteDialer, UpstreamDialer, UpstreamUrl};
