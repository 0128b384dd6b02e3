//! Session bridge: pairs one downstream leg with one upstream leg.
//!
//! A bridge runs as a single task. It fetches a credential and dials the
//! provider, then relays in both directions at once. Each direction reads
//! into a bounded queue that a separate writer drains, so a peer that stops
//! reading only stalls its own direction. Stop requests and heartbeat ticks
//! are always serviced. Teardown goes through this task, so a close can never
//! race a send on the same leg.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use voxrelay_oauth::{CredentialSource, SharedCredentialSource};

use crate::frame::{CloseReason, Frame};
use crate::heartbeat::{Heartbeat, ping_message};
use crate::leg::{FrameSink, FrameStream, Leg, LegError, LegSide};
use crate::registry::SessionTicket;
use crate::session::{SessionControl, SessionId, SessionState, Termination};
use crate::upstream::{BILLING_URL, SharedDialer, UpstreamDialer, UpstreamUrl, is_quota_exhausted};

/// Frames queued per direction before the reader waits on the writer.
const OUTBOUND_QUEUE: usize = 64;

/// How long a finished direction may spend writing what it already queued.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Per-session settings derived from the server configuration.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Provider realtime endpoint, without query parameters.
    pub upstream_url: String,
    /// Optional EVI configuration id.
    pub config_id: Option<String>,
    pub heartbeat_interval: Duration,
}

/// Outcome of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub id: SessionId,
    pub termination: Termination,
    pub frames_to_upstream: u64,
    pub frames_to_downstream: u64,
    /// Data frames the client sent before the upstream leg was open.
    pub dropped_while_connecting: u64,
}

/// What teardown does with one leg.
#[derive(Debug)]
enum Farewell {
    /// Send a close frame carrying this reason.
    Close(CloseReason),
    /// The peer already sent a close frame; answer it.
    Acknowledge,
    /// The peer is gone; send nothing.
    Gone,
}

/// How a session ends and what each leg is told.
#[derive(Debug)]
struct Ending {
    termination: Termination,
    downstream: Farewell,
    upstream: Farewell,
}

impl Ending {
    fn new(termination: Termination, downstream: Farewell, upstream: Farewell) -> Self {
        Self {
            termination,
            downstream,
            upstream,
        }
    }

    /// Ended before an upstream leg existed.
    fn unconnected(termination: Termination, downstream: Farewell) -> Self {
        Self::new(termination, downstream, Farewell::Gone)
    }

    fn stopped() -> Self {
        Self::new(
            Termination::Stopped,
            Farewell::Close(CloseReason::new(1000, "Session stopped")),
            Farewell::Close(CloseReason::normal()),
        )
    }

    fn upstream_lost() -> Self {
        Self::new(
            Termination::UpstreamError,
            Farewell::Close(CloseReason::internal("Upstream connection lost")),
            Farewell::Gone,
        )
    }
}

#[derive(Debug, Default)]
struct Counters {
    to_upstream: AtomicU64,
    to_downstream: AtomicU64,
    dropped: AtomicU64,
}

/// How one direction of the relay ended.
#[derive(Debug)]
enum PumpEnd {
    /// The source sent a close frame.
    Closed(Option<CloseReason>),
    /// The source ended without a close frame.
    Gone,
    /// Reading the source failed.
    Failed(LegError),
}

/// One relay session, ready to run.
pub struct SessionBridge {
    ticket: SessionTicket,
    settings: SessionSettings,
    credentials: SharedCredentialSource,
    dialer: SharedDialer,
}

impl SessionBridge {
    pub fn new(
        ticket: SessionTicket,
        settings: SessionSettings,
        credentials: SharedCredentialSource,
        dialer: SharedDialer,
    ) -> Self {
        Self {
            ticket,
            settings,
            credentials,
            dialer,
        }
    }

    pub fn id(&self) -> SessionId {
        self.ticket.id
    }

    /// Drive the session to completion. Never fails: every error becomes a
    /// [`Termination`].
    pub async fn run(self, mut downstream: Leg) -> SessionReport {
        let SessionBridge {
            ticket,
            settings,
            credentials,
            dialer,
        } = self;
        let id = ticket.id;
        let control = ticket.control;
        let state = ticket.state;

        let counters = Counters::default();
        let mut heartbeat = Heartbeat::new(settings.heartbeat_interval);

        debug!(session_id = %id, "Session connecting");

        // Connecting: drain the client while the credential and handshake
        // are in flight. Nothing is buffered for the upstream leg.
        let connected = {
            let connect = establish_upstream(id, &*credentials, &*dialer, &settings);
            tokio::pin!(connect);

            loop {
                tokio::select! {
                    biased;

                    _ = control.stopped() => break Err(Ending::stopped()),

                    frame = downstream.next() => match frame {
                        Some(Ok(frame)) if frame.is_data() => {
                            counters.dropped.fetch_add(1, Ordering::Relaxed);
                            debug!(session_id = %id, "Dropping client frame, upstream not open");
                        }
                        Some(Ok(Frame::Close(reason))) => {
                            debug!(session_id = %id, reason = ?reason, "Client closed early");
                            break Err(Ending::unconnected(
                                Termination::DownstreamClosed,
                                Farewell::Acknowledge,
                            ));
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!(session_id = %id, error = %e, "Client socket error early");
                            break Err(Ending::unconnected(
                                Termination::DownstreamError,
                                Farewell::Gone,
                            ));
                        }
                        None => {
                            break Err(Ending::unconnected(
                                Termination::DownstreamClosed,
                                Farewell::Gone,
                            ));
                        }
                    },

                    result = &mut connect => break result,
                }
            }
        };

        let termination = match connected {
            Err(ending) => finish(id, &mut heartbeat, &mut downstream, None, ending).await,
            Ok(mut upstream) => {
                heartbeat.start();
                state.send_replace(SessionState::Active);
                info!(session_id = %id, "Session active");

                let ending = forward(
                    id,
                    &control,
                    &mut heartbeat,
                    &mut downstream,
                    &mut upstream,
                    &counters,
                )
                .await;
                finish(id, &mut heartbeat, &mut downstream, Some(&mut upstream), ending).await
            }
        };

        let report = SessionReport {
            id,
            termination,
            frames_to_upstream: counters.to_upstream.load(Ordering::Relaxed),
            frames_to_downstream: counters.to_downstream.load(Ordering::Relaxed),
            dropped_while_connecting: counters.dropped.load(Ordering::Relaxed),
        };

        state.send_replace(SessionState::Closed(termination));
        info!(
            session_id = %id,
            termination = %termination,
            to_upstream = report.frames_to_upstream,
            to_downstream = report.frames_to_downstream,
            dropped = report.dropped_while_connecting,
            "Session closed"
        );
        report
    }
}

/// Fetch a credential and open the upstream leg.
async fn establish_upstream(
    id: SessionId,
    credentials: &dyn CredentialSource,
    dialer: &dyn UpstreamDialer,
    settings: &SessionSettings,
) -> Result<Leg, Ending> {
    let credential = credentials.fetch().await.map_err(|e| {
        warn!(session_id = %id, error = %e, "Credential exchange failed");
        Ending::unconnected(
            Termination::FailedAuth,
            Farewell::Close(CloseReason::policy(format!("Authentication failed: {}", e))),
        )
    })?;

    let url = UpstreamUrl::build(
        &settings.upstream_url,
        &credential,
        settings.config_id.as_deref(),
    )
    .map_err(|e| {
        error!(session_id = %id, error = %e, "Cannot build upstream URL");
        connect_failed()
    })?;

    debug!(session_id = %id, url = %url, "Dialing upstream");
    dialer.dial(&url).await.map_err(|e| {
        let message = e.to_string();
        if is_quota_exhausted(&message) {
            log_quota_exhausted(id, &message);
            Ending::unconnected(
                Termination::FailedQuota,
                Farewell::Close(CloseReason::policy(&message)),
            )
        } else {
            warn!(session_id = %id, error = %message, "Upstream connect failed");
            connect_failed()
        }
    })
}

fn connect_failed() -> Ending {
    Ending::unconnected(
        Termination::FailedConnect,
        Farewell::Close(CloseReason::internal("Upstream connect failed")),
    )
}

/// Relay both directions until either leg ends or stop is requested.
async fn forward(
    id: SessionId,
    control: &SessionControl,
    heartbeat: &mut Heartbeat,
    downstream: &mut Leg,
    upstream: &mut Leg,
    counters: &Counters,
) -> Ending {
    let (to_upstream, upstream_queue) = mpsc::channel(OUTBOUND_QUEUE);
    let (to_downstream, downstream_queue) = mpsc::channel(OUTBOUND_QUEUE);
    let (client_frames, client_sink) = downstream.halves();
    let (provider_frames, provider_sink) = upstream.halves();

    let client_to_provider = pump(client_frames, to_upstream.clone(), &counters.to_upstream);
    let provider_to_client = pump(provider_frames, to_downstream.clone(), &counters.to_downstream);
    let write_upstream = write_queued(upstream_queue, provider_sink);
    let write_downstream = write_queued(downstream_queue, client_sink);
    tokio::pin!(client_to_provider, provider_to_client, write_upstream, write_downstream);

    loop {
        tokio::select! {
            biased;

            _ = control.stopped() => return Ending::stopped(),

            _ = heartbeat.tick() => queue_pings(id, &to_downstream, &to_upstream),

            end = &mut client_to_provider => {
                // Last sender for the upstream queue goes away, so the writer
                // finishes once everything already read is written.
                drop(to_upstream);
                flush(id, LegSide::Upstream, write_upstream).await;
                return client_ended(id, end);
            }

            end = &mut provider_to_client => {
                drop(to_downstream);
                flush(id, LegSide::Downstream, write_downstream).await;
                return provider_ended(id, end);
            }

            result = &mut write_upstream => {
                if let Err(e) = result {
                    warn!(session_id = %id, error = %e, "Upstream send failed");
                }
                return Ending::upstream_lost();
            }

            result = &mut write_downstream => {
                if let Err(e) = result {
                    debug!(session_id = %id, error = %e, "Client send failed");
                }
                return Ending::new(
                    Termination::DownstreamError,
                    Farewell::Gone,
                    Farewell::Close(CloseReason::normal()),
                );
            }
        }
    }
}

/// Read data frames from `source` and queue them for the opposite leg.
async fn pump(
    source: &mut FrameStream,
    queue: mpsc::Sender<Frame>,
    relayed: &AtomicU64,
) -> PumpEnd {
    loop {
        match source.next().await {
            Some(Ok(frame)) if frame.is_data() => {
                if queue.send(frame).await.is_err() {
                    // The writer failed and reports that itself.
                    return std::future::pending().await;
                }
                relayed.fetch_add(1, Ordering::Relaxed);
            }
            Some(Ok(Frame::Close(reason))) => return PumpEnd::Closed(reason),
            Some(Ok(_)) => {}
            Some(Err(e)) => return PumpEnd::Failed(e),
            None => return PumpEnd::Gone,
        }
    }
}

/// Write queued frames in order until every sender is dropped.
async fn write_queued(
    mut queue: mpsc::Receiver<Frame>,
    sink: &mut FrameSink,
) -> Result<(), LegError> {
    while let Some(frame) = queue.recv().await {
        sink.send(frame).await?;
    }
    Ok(())
}

/// Give a writer a bounded chance to finish its queue.
async fn flush<F>(id: SessionId, side: LegSide, writer: Pin<&mut F>)
where
    F: Future<Output = Result<(), LegError>>,
{
    match tokio::time::timeout(FLUSH_TIMEOUT, writer).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(session_id = %id, leg = %side, error = %e, "Flush failed"),
        Err(_) => debug!(session_id = %id, leg = %side, "Flush timed out"),
    }
}

fn client_ended(id: SessionId, end: PumpEnd) -> Ending {
    let (termination, farewell) = match end {
        PumpEnd::Closed(reason) => {
            debug!(session_id = %id, reason = ?reason, "Client closed");
            (Termination::DownstreamClosed, Farewell::Acknowledge)
        }
        PumpEnd::Gone => {
            debug!(session_id = %id, "Client went away");
            (Termination::DownstreamClosed, Farewell::Gone)
        }
        PumpEnd::Failed(e) => {
            warn!(session_id = %id, error = %e, "Client socket error");
            (Termination::DownstreamError, Farewell::Gone)
        }
    };
    Ending::new(termination, farewell, Farewell::Close(CloseReason::normal()))
}

fn provider_ended(id: SessionId, end: PumpEnd) -> Ending {
    match end {
        PumpEnd::Closed(reason) => upstream_closed(id, reason),
        PumpEnd::Gone => {
            debug!(session_id = %id, "Upstream went away");
            Ending::new(
                Termination::UpstreamClosed,
                Farewell::Close(CloseReason::normal()),
                Farewell::Gone,
            )
        }
        PumpEnd::Failed(e) => {
            warn!(session_id = %id, error = %e, "Upstream socket error");
            Ending::upstream_lost()
        }
    }
}

fn upstream_closed(id: SessionId, reason: Option<CloseReason>) -> Ending {
    let reason = reason.unwrap_or_else(CloseReason::normal);
    if is_quota_exhausted(&reason.reason) {
        log_quota_exhausted(id, &reason.reason);
        return Ending::new(
            Termination::FailedQuota,
            Farewell::Close(CloseReason::policy(&reason.reason)),
            Farewell::Acknowledge,
        );
    }
    info!(session_id = %id, code = reason.code, reason = %reason.reason, "Upstream closed");
    Ending::new(
        Termination::UpstreamClosed,
        Farewell::Close(reason.sanitized()),
        Farewell::Acknowledge,
    )
}

fn log_quota_exhausted(id: SessionId, reason: &str) {
    error!(
        session_id = %id,
        reason = %reason,
        billing = BILLING_URL,
        "Provider credit exhausted; add credit at {} before reconnecting",
        BILLING_URL
    );
}

/// Queue one liveness ping for each leg. A full or closed queue skips the
/// ping; it is never fatal.
fn queue_pings(
    id: SessionId,
    to_downstream: &mpsc::Sender<Frame>,
    to_upstream: &mpsc::Sender<Frame>,
) {
    if let Err(e) = to_downstream.try_send(Frame::Ping(Bytes::new())) {
        debug!(session_id = %id, error = %e, "Client ping skipped");
    }
    match ping_message(Utc::now()) {
        Ok(ping) => {
            if let Err(e) = to_upstream.try_send(Frame::Text(ping)) {
                debug!(session_id = %id, error = %e, "Upstream ping skipped");
            }
        }
        Err(e) => debug!(session_id = %id, error = %e, "Cannot encode upstream ping"),
    }
}

async fn bid_farewell(leg: &mut Leg, farewell: Farewell) {
    match farewell {
        Farewell::Close(reason) => {
            leg.close(Some(reason)).await;
        }
        Farewell::Acknowledge => {
            leg.close(None).await;
        }
        Farewell::Gone => leg.mark_closed(),
    }
}

/// Tear down: cancel the heartbeat, then close both legs concurrently.
async fn finish(
    id: SessionId,
    heartbeat: &mut Heartbeat,
    downstream: &mut Leg,
    upstream: Option<&mut Leg>,
    ending: Ending,
) -> Termination {
    if heartbeat.stop() {
        debug!(session_id = %id, "Heartbeat cancelled");
    }
    let Ending {
        termination,
        downstream: to_client,
        upstream: to_provider,
    } = ending;
    match upstream {
        Some(upstream) => {
            tokio::join!(
                bid_farewell(upstream, to_provider),
                bid_farewell(downstream, to_client)
            );
        }
        None => bid_farewell(downstream, to_client).await,
    }
    termination
}
