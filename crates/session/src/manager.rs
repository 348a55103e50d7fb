// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Session manager: the public face of the session engine.
//!
//! A [`SessionManager`] is a cheap, cloneable handle to one session task.
//! The task lives until the last handle is dropped.

use std::path::Path;
use std::sync::Arc;

use ml_core::identity::Identity;
use ml_core::protocol::AckReply;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::ack::{require_success, DeliveryResult};
use crate::buffer::Outbound;
use crate::config::SessionConfig;
use crate::connection::{Command, SessionConnection};
use crate::dispatch::InboundEvent;
use crate::error::{Error, Result};
use crate::status::{SessionStatus, SharedStatus, StatusEvent};
use crate::transfer::{self, TransferReport};
use crate::transport::{Transport, TransportFactory, WebSocketTransport};

/// Capacity of the status notice broadcast.
const NOTICE_CAPACITY: usize = 64;

/// Handle to a session with one doctor application.
#[derive(Clone)]
pub struct SessionManager {
    commands: mpsc::UnboundedSender<Command>,
    status: Arc<SharedStatus>,
    notices: broadcast::Sender<StatusEvent>,
    config: Arc<SessionConfig>,
}

impl SessionManager {
    /// Starts a session task using WebSocket transports.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(config: SessionConfig) -> Self {
        let factory: TransportFactory<WebSocketTransport> = Arc::new(WebSocketTransport::new);
        Self::with_transport(config, factory)
    }

    /// Starts a session task creating transports with `factory`.
    pub fn with_transport<T: Transport + 'static>(
        config: SessionConfig,
        factory: TransportFactory<T>,
    ) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        let status = Arc::new(SharedStatus::new());

        let task = SessionConnection::new(
            config.clone(),
            factory,
            Arc::clone(&status),
            notices.clone(),
            command_rx,
        );
        tokio::spawn(task.run());

        SessionManager {
            commands,
            status,
            notices,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Connects to `host` after checking it is reachable.
    ///
    /// Resolves once the reachability probe succeeded and the persistent
    /// connection has been started; the handshake completes in the
    /// background and is reported through status notices. Connecting again
    /// to the host already connected is a no-op.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidHost`] for a malformed host, [`Error::Unreachable`] if
    /// the probe fails (no retry is scheduled), [`Error::Superseded`] or
    /// [`Error::Cancelled`] if a newer connect or a disconnect intervened.
    pub async fn connect(&self, host: &str, identity: Identity) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Connect {
            host: host.to_string(),
            identity,
            reply,
        })?;
        rx.await.map_err(|_| Error::Closed)?
    }

    /// Closes the session and suppresses automatic reconnection.
    ///
    /// Buffered and in-flight events are discarded; callers waiting on them
    /// receive [`DeliveryError::Discarded`](crate::DeliveryError::Discarded).
    pub async fn disconnect(&self) {
        let (reply, rx) = oneshot::channel();
        if self.command(Command::Disconnect { reply }).is_ok() {
            let _ = rx.await;
        }
    }

    /// Sends an acknowledged event, buffering it while offline.
    ///
    /// Returns as soon as the event is accepted; delivery is retried until
    /// acknowledged or the session is disconnected.
    pub fn send(&self, name: &str, payload: Value) -> Result<()> {
        self.submit_with(Outbound::event(name, payload), None, None)
    }

    /// Sends a fire-and-forget event that the peer does not acknowledge.
    pub fn send_unacked(&self, name: &str, payload: Value) -> Result<()> {
        let kind = Outbound::Event {
            name: name.to_string(),
            payload,
            expects_ack: false,
        };
        self.submit_with(kind, None, None)
    }

    /// Sends an event and waits for the peer's acknowledgment.
    pub async fn send_confirmed(&self, name: &str, payload: Value) -> Result<AckReply> {
        let rx = self.submit(Outbound::event(name, payload), None)?;
        let outcome = rx.await.map_err(|_| Error::Closed)?;
        Ok(outcome.and_then(require_success)?)
    }

    /// Sends a file in acknowledged chunks; see [`transfer::send_file`].
    pub async fn send_file(&self, path: &Path, owner_id: &str) -> Result<TransferReport> {
        transfer::send_file(self, path, owner_id).await
    }

    /// Current lifecycle state and counters.
    pub fn get_status(&self) -> SessionStatus {
        self.status.snapshot()
    }

    /// Registers a callback for status notices.
    pub fn on_status_change<F>(&self, handler: F)
    where
        F: Fn(&StatusEvent) + Send + Sync + 'static,
    {
        let _ = self.command(Command::OnStatus {
            handler: Arc::new(handler),
        });
    }

    /// Registers a handler for inbound events named `name` (`"*"` for all).
    pub fn on_event<F>(&self, name: &str, handler: F)
    where
        F: Fn(&InboundEvent) + Send + Sync + 'static,
    {
        let _ = self.command(Command::OnEvent {
            name: name.to_string(),
            handler: Arc::new(handler),
        });
    }

    /// Subscribes to status notices as a stream.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.notices.subscribe()
    }

    /// Submits an event and returns a receiver for its outcome.
    ///
    /// `max_attempts` overrides the configured per-event cap.
    pub(crate) fn submit(
        &self,
        kind: Outbound,
        max_attempts: Option<u32>,
    ) -> Result<oneshot::Receiver<DeliveryResult>> {
        let (tx, rx) = oneshot::channel();
        self.submit_with(kind, max_attempts, Some(tx))?;
        Ok(rx)
    }

    fn submit_with(
        &self,
        kind: Outbound,
        max_attempts: Option<u32>,
        completion: Option<oneshot::Sender<DeliveryResult>>,
    ) -> Result<()> {
        let max_attempts = max_attempts.or(self.config.max_delivery_attempts);
        self.command(Command::Send {
            kind,
            max_attempts,
            completion,
        })
    }

    fn command(&self, cmd: Command) -> Result<()> {
        self.commands.send(cmd).map_err(|_| Error::Closed)
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("status", &self.status.snapshot())
            .finish()
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
