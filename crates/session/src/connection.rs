// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The session task: owns the transport and all session state.
//!
//! One tokio task runs [`SessionConnection::run`]. Handles talk to it over
//! a command channel; connect and probe attempts run as short-lived child
//! tasks that report back over a link channel. Each child carries the
//! generation it was started under, so a result that arrives after a newer
//! connect or a disconnect is recognised as stale and dropped.
//!
//! The loop waits on:
//! 1. Commands from handles (connect, disconnect, send, handler registration)
//! 2. Probe/connect results from child tasks
//! 3. Inbound frames from the live transport
//! 4. Timers: retry, flush, ack timeout, heartbeat

use std::sync::Arc;
use std::time::Duration;

use ml_core::identity::{Identification, Identity};
use ml_core::protocol::{AckReply, ClientMessage, ServerMessage};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::ack::{AckTracker, Dispatch};
use crate::buffer::{Completion, Outbound};
use crate::config::SessionConfig;
use crate::dispatch::{Dispatcher, EventHandler, InboundEvent, StatusHandler};
use crate::error::{Error, Result};
use crate::reconnect::{ReconnectScheduler, RetryDecision};
use crate::status::{SessionState, SharedStatus, StatusEvent};
use crate::transport::{
    PeerClose, Received, Transport, TransportError, TransportFactory, TransportResult,
};

/// Upper bound on a graceful close before the transport is simply dropped.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Requests from session handles.
pub(crate) enum Command {
    Connect {
        host: String,
        identity: Identity,
        reply: oneshot::Sender<Result<()>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    Send {
        kind: Outbound,
        max_attempts: Option<u32>,
        completion: Option<Completion>,
    },
    OnEvent {
        name: String,
        handler: EventHandler,
    },
    OnStatus {
        handler: StatusHandler,
    },
}

/// Results reported by connect and probe tasks.
enum LinkEvent<T> {
    Probed {
        generation: u64,
        result: TransportResult<()>,
    },
    Opened {
        generation: u64,
        result: TransportResult<T>,
    },
}

/// Why a live transport went away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Closed by this side (disconnect or switching hosts).
    LocalClose,
    /// The peer closed the connection, with its close frame if it sent one.
    PeerClosed(Option<PeerClose>),
    /// A send or receive failed.
    TransportError(String),
    /// No inbound frame within the heartbeat timeout.
    HeartbeatTimeout,
}

impl DisconnectReason {
    /// Only drops this side did not ask for lead to automatic reconnection.
    pub fn retries(&self) -> bool {
        !matches!(self, DisconnectReason::LocalClose)
    }
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisconnectReason::LocalClose => f.write_str("local close"),
            DisconnectReason::PeerClosed(None) => f.write_str("closed by peer"),
            DisconnectReason::PeerClosed(Some(close)) => write!(f, "closed by peer ({close})"),
            DisconnectReason::TransportError(e) => write!(f, "transport error: {e}"),
            DisconnectReason::HeartbeatTimeout => f.write_str("heartbeat timeout"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Beat {
    Idle,
    Ping(u64),
    TimedOut,
}

/// Ping/pong liveness tracking for the live transport.
#[derive(Debug)]
struct Heartbeat {
    interval: Duration,
    timeout: Duration,
    next_ping: Option<Instant>,
    /// Id and send time of the ping awaiting a reply.
    awaiting: Option<(u64, Instant)>,
    next_id: u64,
}

impl Heartbeat {
    fn new(interval: Duration, timeout: Duration) -> Self {
        Heartbeat {
            interval,
            timeout,
            next_ping: None,
            awaiting: None,
            next_id: 1,
        }
    }

    fn start(&mut self, now: Instant) {
        self.awaiting = None;
        self.next_ping = (!self.interval.is_zero()).then(|| now + self.interval);
    }

    fn stop(&mut self) {
        self.next_ping = None;
        self.awaiting = None;
    }

    fn deadline(&self) -> Option<Instant> {
        match self.awaiting {
            Some((_, sent)) => Some(sent + self.timeout),
            None => self.next_ping,
        }
    }

    /// Any inbound frame proves the link is alive.
    fn on_frame(&mut self, now: Instant) {
        if self.awaiting.take().is_some() {
            self.next_ping = Some(now + self.interval);
        }
    }

    fn poll(&mut self, now: Instant) -> Beat {
        if let Some((_, sent)) = self.awaiting {
            if now >= sent + self.timeout {
                self.stop();
                return Beat::TimedOut;
            }
            return Beat::Idle;
        }
        match self.next_ping {
            Some(at) if at <= now => {
                let id = self.next_id;
                self.next_id += 1;
                self.awaiting = Some((id, now));
                self.next_ping = None;
                Beat::Ping(id)
            }
            _ => Beat::Idle,
        }
    }
}

/// State owned by the session task.
pub(crate) struct SessionConnection<T: Transport> {
    config: SessionConfig,
    factory: TransportFactory<T>,
    status: Arc<SharedStatus>,
    notices: broadcast::Sender<StatusEvent>,
    commands: mpsc::UnboundedReceiver<Command>,
    link_tx: mpsc::UnboundedSender<LinkEvent<T>>,
    link_rx: mpsc::UnboundedReceiver<LinkEvent<T>>,

    /// Live transport; present exactly while Connected.
    transport: Option<T>,
    /// Last-known endpoint, used by automatic retries.
    url: Option<String>,
    host: Option<String>,
    identity: Option<Identity>,
    manual: bool,
    /// Whether the one-time established notice was sent.
    established: bool,

    generation: u64,
    cancel: CancellationToken,
    pending_connect: Option<oneshot::Sender<Result<()>>>,

    tracker: AckTracker,
    scheduler: ReconnectScheduler,
    dispatcher: Dispatcher,
    heartbeat: Heartbeat,
    flush_at: Option<Instant>,
}

impl<T: Transport + 'static> SessionConnection<T> {
    pub(crate) fn new(
        config: SessionConfig,
        factory: TransportFactory<T>,
        status: Arc<SharedStatus>,
        notices: broadcast::Sender<StatusEvent>,
        commands: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        let (link_tx, link_rx) = mpsc::unbounded_channel();
        SessionConnection {
            tracker: AckTracker::new(config.ack_timeout),
            scheduler: ReconnectScheduler::new(config.backoff),
            heartbeat: Heartbeat::new(config.heartbeat_interval, config.heartbeat_timeout),
            config,
            factory,
            status,
            notices,
            commands,
            link_tx,
            link_rx,
            transport: None,
            url: None,
            host: None,
            identity: None,
            manual: false,
            established: false,
            generation: 0,
            cancel: CancellationToken::new(),
            pending_connect: None,
            dispatcher: Dispatcher::new(),
            flush_at: None,
        }
    }

    /// Runs until every handle is dropped.
    pub(crate) async fn run(mut self) {
        loop {
            let now = Instant::now();
            let live = self.transport.is_some();
            let retry_at = self.scheduler.deadline();
            let flush_at = self.flush_at;
            let ack_at = self.tracker.next_deadline();
            let beat_at = self.heartbeat.deadline();

            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },

                Some(event) = self.link_rx.recv() => self.handle_link(event).await,

                frame = recv_frame(&mut self.transport), if live => {
                    self.handle_frame(frame).await;
                }

                _ = tokio::time::sleep_until(retry_at.unwrap_or(now)), if retry_at.is_some() => {
                    self.retry_due();
                }

                _ = tokio::time::sleep_until(flush_at.unwrap_or(now)), if flush_at.is_some() => {
                    self.flush_due().await;
                }

                _ = tokio::time::sleep_until(ack_at.unwrap_or(now)), if ack_at.is_some() => {
                    self.ack_due();
                }

                _ = tokio::time::sleep_until(beat_at.unwrap_or(now)), if live && beat_at.is_some() => {
                    self.heartbeat_due().await;
                }
            }

            self.publish_counts();
        }

        self.shutdown().await;
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect {
                host,
                identity,
                reply,
            } => self.connect(host, identity, reply).await,
            Command::Disconnect { reply } => {
                self.disconnect().await;
                let _ = reply.send(());
            }
            Command::Send {
                kind,
                max_attempts,
                completion,
            } => {
                let live = self.transport.is_some();
                let now = Instant::now();
                if let Some(dispatch) = self.tracker.submit(kind, max_attempts, completion, live, now)
                {
                    self.write(dispatch).await;
                }
            }
            Command::OnEvent { name, handler } => self.dispatcher.on_event(name, handler),
            Command::OnStatus { handler } => self.dispatcher.on_status(handler),
        }
    }

    /// Explicit connect: probe the host, then open the persistent transport.
    async fn connect(
        &mut self,
        host: String,
        identity: Identity,
        reply: oneshot::Sender<Result<()>>,
    ) {
        let url = match self.config.endpoint(&host) {
            Ok(url) => url,
            Err(e) => {
                let _ = reply.send(Err(e));
                return;
            }
        };

        self.manual = false;
        self.status.set_manual(false);
        self.identity = Some(identity);

        let same_target = self.url.as_deref() == Some(url.as_str());
        let state = self.status.state();
        let opening = state == SessionState::Connecting && self.pending_connect.is_none();
        if same_target && (state == SessionState::Connected || opening) {
            tracing::debug!(url = %url, "already connected, ignoring connect");
            let _ = reply.send(Ok(()));
            return;
        }

        self.scheduler.reset();
        self.status.set_attempt(0);
        self.reset_tasks();
        if self.transport.is_some() {
            self.link_dropped(DisconnectReason::LocalClose).await;
        }
        self.set_state(SessionState::Disconnected);

        if let Some(previous) = self.pending_connect.replace(reply) {
            let _ = previous.send(Err(Error::Superseded));
        }

        tracing::info!(url = %url, "probing host");
        self.url = Some(url.clone());
        self.host = Some(host);
        self.spawn_probe(url);
    }

    async fn disconnect(&mut self) {
        self.manual = true;
        self.status.set_manual(true);
        self.scheduler.reset();
        self.status.set_attempt(0);
        self.reset_tasks();
        self.flush_at = None;
        self.heartbeat.stop();

        if let Some(reply) = self.pending_connect.take() {
            let _ = reply.send(Err(Error::Cancelled));
        }
        if let Some(transport) = self.transport.take() {
            close_transport(transport).await;
        }

        let discarded = self.tracker.discard_all();
        if discarded > 0 {
            tracing::info!(discarded, "disconnect discarded pending events");
        }
        self.identity = None;
        self.url = None;
        self.host = None;
        self.set_state(SessionState::Disconnected);
    }

    /// Invalidates every running child task.
    fn reset_tasks(&mut self) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
        self.generation += 1;
    }

    fn spawn_probe(&self, url: String) {
        let factory = Arc::clone(&self.factory);
        let link_tx = self.link_tx.clone();
        let cancel = self.cancel.clone();
        let generation = self.generation;
        let timeout = self.config.probe_timeout;

        tokio::spawn(async move {
            let result = tokio::select! {
                _ = cancel.cancelled() => return,
                result = probe(factory, &url, timeout) => result,
            };
            let _ = link_tx.send(LinkEvent::Probed { generation, result });
        });
    }

    /// Starts a persistent connect to the last-known endpoint.
    fn open(&mut self) {
        let Some(url) = self.url.clone() else {
            return;
        };
        self.set_state(SessionState::Connecting);

        let factory = Arc::clone(&self.factory);
        let link_tx = self.link_tx.clone();
        let cancel = self.cancel.clone();
        let generation = self.generation;
        let timeout = self.config.connect_timeout;

        tracing::info!(url = %url, attempt = self.scheduler.attempt(), "connecting");
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = cancel.cancelled() => return,
                result = open_transport(factory, &url, timeout) => result,
            };
            if let Err(mpsc::error::SendError(LinkEvent::Opened {
                result: Ok(transport),
                ..
            })) = link_tx.send(LinkEvent::Opened { generation, result })
            {
                close_transport(transport).await;
            }
        });
    }

    async fn handle_link(&mut self, event: LinkEvent<T>) {
        match event {
            LinkEvent::Probed { generation, result } if generation == self.generation => {
                let reply = self.pending_connect.take();
                match result {
                    Ok(()) => {
                        if let Some(reply) = reply {
                            let _ = reply.send(Ok(()));
                        }
                        self.open();
                    }
                    Err(e) => {
                        let host = self.host.take().unwrap_or_default();
                        tracing::warn!(host = %host, error = %e, "host unreachable");
                        self.url = None;
                        if let Some(reply) = reply {
                            let _ = reply.send(Err(Error::Unreachable {
                                host,
                                reason: e.to_string(),
                            }));
                        }
                    }
                }
            }
            LinkEvent::Opened { generation, result } if generation == self.generation => {
                match result {
                    Ok(transport) => self.established(transport).await,
                    Err(e) => {
                        tracing::warn!(error = %e, "connect failed");
                        self.set_state(SessionState::Disconnected);
                        self.schedule_retry();
                    }
                }
            }
            LinkEvent::Opened {
                result: Ok(transport),
                ..
            } => {
                tracing::debug!("closing transport from superseded connect");
                close_transport(transport).await;
            }
            LinkEvent::Probed { .. } | LinkEvent::Opened { .. } => {
                tracing::debug!("discarding stale link event");
            }
        }
    }

    /// Adopts a freshly opened transport and sends the identification.
    async fn established(&mut self, mut transport: T) {
        let Some(identity) = self.identity.as_ref() else {
            close_transport(transport).await;
            self.set_state(SessionState::Disconnected);
            return;
        };

        let identify = ClientMessage::identify(Identification::new(identity));
        if let Err(e) = transport.send(identify).await {
            tracing::warn!(error = %e, "identification failed");
            close_transport(transport).await;
            self.set_state(SessionState::Disconnected);
            self.schedule_retry();
            return;
        }

        let now = Instant::now();
        self.transport = Some(transport);
        self.scheduler.reset();
        self.status.set_attempt(0);
        self.set_state(SessionState::Connected);

        let host = self.host.clone().unwrap_or_default();
        tracing::info!(host = %host, "session established");
        if !self.established {
            self.established = true;
            self.notify(StatusEvent::Established { host });
        }

        self.flush_at = Some(now + self.config.settle_delay);
        self.heartbeat.start(now);
    }

    /// Tears down the live transport and, unless this side closed it, retries.
    async fn link_dropped(&mut self, reason: DisconnectReason) {
        if let Some(transport) = self.transport.take() {
            close_transport(transport).await;
        }
        self.heartbeat.stop();
        self.flush_at = None;

        let requeued = self.tracker.link_lost();
        if reason.retries() {
            tracing::warn!(%reason, requeued, "link lost");
        } else {
            tracing::info!(%reason, requeued, "link closed");
        }

        self.set_state(SessionState::Disconnected);
        if reason.retries() {
            self.schedule_retry();
        }
    }

    fn schedule_retry(&mut self) {
        match self.scheduler.schedule(self.manual, Instant::now()) {
            RetryDecision::Scheduled { attempt, delay } => {
                tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "reconnect scheduled");
                self.status.set_attempt(attempt);
                self.set_state(SessionState::Reconnecting);
            }
            RetryDecision::AlreadyPending => {}
            RetryDecision::Suppressed => {
                tracing::debug!("manually disconnected, not retrying");
            }
            RetryDecision::WindowExhausted { attempts, elapsed } => {
                tracing::warn!(
                    attempts,
                    elapsed_secs = elapsed.as_secs(),
                    "retry window exhausted, giving up until next connect"
                );
                self.notify(StatusEvent::RetryWindowExhausted { attempts, elapsed });
            }
        }
    }

    fn retry_due(&mut self) {
        if self.scheduler.poll_due(Instant::now()) {
            self.open();
        }
    }

    async fn flush_due(&mut self) {
        self.flush_at = None;
        if self.transport.is_none() {
            return;
        }
        if self.tracker.buffered() > 0 {
            tracing::debug!(buffered = self.tracker.buffered(), "flushing buffer");
        }
        self.tracker.start_flush();
        self.continue_flush().await;
    }

    /// Writes buffered events until one awaits its ack or the buffer is empty.
    async fn continue_flush(&mut self) {
        while let Some(dispatch) = self.tracker.next_flush(Instant::now()) {
            if !self.write(dispatch).await {
                break;
            }
        }
    }

    fn ack_due(&mut self) {
        let now = Instant::now();
        let expired = self.tracker.expire(now);
        if expired.discarded > 0 {
            tracing::debug!(discarded = expired.discarded, "dropped capped events");
        }
        // Expiry may end a flush; whatever is still buffered needs a new one
        if self.tracker.buffered() > 0
            && self.transport.is_some()
            && self.flush_at.is_none()
            && !self.tracker.is_flushing()
        {
            self.flush_at = Some(now + self.config.settle_delay);
        }
    }

    async fn heartbeat_due(&mut self) {
        match self.heartbeat.poll(Instant::now()) {
            Beat::Idle => {}
            Beat::Ping(id) => {
                self.write_raw(ClientMessage::ping(id)).await;
            }
            Beat::TimedOut => {
                self.link_dropped(DisconnectReason::HeartbeatTimeout).await;
            }
        }
    }

    async fn handle_frame(&mut self, frame: TransportResult<Received>) {
        match frame {
            Ok(Received::Frame(msg)) => {
                self.heartbeat.on_frame(Instant::now());
                self.handle_message(msg).await;
            }
            Ok(Received::Closed(close)) => {
                self.link_dropped(DisconnectReason::PeerClosed(close)).await;
            }
            Err(TransportError::Malformed(e)) => {
                tracing::warn!(error = %e, "ignoring malformed frame");
            }
            Err(e) => {
                self.link_dropped(DisconnectReason::TransportError(e.to_string()))
                    .await;
            }
        }
    }

    async fn handle_message(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::Ack { id, success, error } => {
                if self.tracker.acknowledge(id, AckReply { success, error }) {
                    self.continue_flush().await;
                }
            }
            ServerMessage::Event { name, payload, ack } => {
                let event = InboundEvent { name, payload };
                let handled = self.dispatcher.dispatch_event(&event);
                tracing::debug!(event = %event.name, handled, "inbound event");
                if let Some(id) = ack {
                    let reply = if handled > 0 {
                        AckReply::ok()
                    } else {
                        AckReply::failed(format!("no handler for {}", event.name))
                    };
                    self.write_raw(ClientMessage::ack(id, reply)).await;
                }
            }
            ServerMessage::Pong { id } => {
                tracing::trace!(id, "pong");
            }
        }
    }

    /// Writes one tracked event. Returns false if the link dropped.
    async fn write(&mut self, dispatch: Dispatch) -> bool {
        let Some(transport) = self.transport.as_mut() else {
            self.tracker.link_lost();
            return false;
        };
        let result = transport.send(dispatch.message).await;
        match result {
            Ok(()) => {
                self.tracker.written(dispatch.id);
                true
            }
            Err(e) => {
                self.link_dropped(DisconnectReason::TransportError(e.to_string()))
                    .await;
                false
            }
        }
    }

    /// Writes an untracked control frame (ack reply, ping).
    async fn write_raw(&mut self, msg: ClientMessage) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        let result = transport.send(msg).await;
        if let Err(e) = result {
            self.link_dropped(DisconnectReason::TransportError(e.to_string()))
                .await;
        }
    }

    fn set_state(&mut self, state: SessionState) {
        let previous = self.status.set_state(state);
        if previous != state {
            tracing::info!(from = %previous, to = %state, "session state");
            self.notify(StatusEvent::State { state });
        }
    }

    fn notify(&self, event: StatusEvent) {
        self.dispatcher.notify_status(&event);
        // No subscribers is fine
        let _ = self.notices.send(event);
    }

    fn publish_counts(&self) {
        self.status
            .set_counts(self.tracker.buffered(), self.tracker.in_flight());
    }

    async fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(reply) = self.pending_connect.take() {
            let _ = reply.send(Err(Error::Closed));
        }
        if let Some(transport) = self.transport.take() {
            close_transport(transport).await;
        }
        self.tracker.discard_all();
        self.status.set_state(SessionState::Disconnected);
        self.publish_counts();
        tracing::debug!("session task stopped");
    }
}

async fn recv_frame<T: Transport>(transport: &mut Option<T>) -> TransportResult<Received> {
    match transport {
        Some(transport) => transport.recv().await,
        None => std::future::pending().await,
    }
}

/// Short-lived reachability check; the connection is closed right away.
async fn probe<T: Transport>(
    factory: TransportFactory<T>,
    url: &str,
    timeout: Duration,
) -> TransportResult<()> {
    let transport = open_transport(factory, url, timeout).await?;
    close_transport(transport).await;
    Ok(())
}

async fn open_transport<T: Transport>(
    factory: TransportFactory<T>,
    url: &str,
    timeout: Duration,
) -> TransportResult<T> {
    let mut transport = factory();
    transport.open(url, timeout).await?;
    Ok(transport)
}

async fn close_transport<T: Transport>(mut transport: T) {
    let _ = tokio::time::timeout(CLOSE_TIMEOUT, transport.close()).await;
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
