// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for session tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ml_core::identity::Identity;
use ml_core::protocol::{AckReply, ClientMessage, ServerMessage};
use tokio::sync::mpsc;

use crate::config::SessionConfig;
use crate::manager::SessionManager;
use crate::status::SessionState;
use crate::transport::{
    BoxFuture, PeerClose, Received, Transport, TransportError, TransportFactory, TransportResult,
};

/// What a mock connection delivers to `recv`.
#[derive(Debug)]
pub enum Inbound {
    Frame(ServerMessage),
    Close(Option<PeerClose>),
    Error(String),
}

#[derive(Debug)]
struct NetState {
    reachable: bool,
    connects: Vec<String>,
    sent: Vec<ClientMessage>,
    auto_ack: bool,
    auto_pong: bool,
    ack_reply: AckReply,
    /// Inbound channel of the most recent connection.
    live: Option<mpsc::UnboundedSender<Inbound>>,
}

/// Simulated peer shared by every [`MockTransport`] it creates.
#[derive(Debug, Clone)]
pub struct MockNetwork {
    state: Arc<Mutex<NetState>>,
}

impl MockNetwork {
    /// A reachable peer that acks every frame and answers pings.
    pub fn new() -> Self {
        MockNetwork {
            state: Arc::new(Mutex::new(NetState {
                reachable: true,
                connects: Vec::new(),
                sent: Vec::new(),
                auto_ack: true,
                auto_pong: true,
                ack_reply: AckReply::ok(),
                live: None,
            })),
        }
    }

    pub fn factory(&self) -> TransportFactory<MockTransport> {
        let network = self.clone();
        Arc::new(move || MockTransport::new(network.clone()))
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.state.lock().unwrap().reachable = reachable;
    }

    pub fn set_auto_ack(&self, auto_ack: bool) {
        self.state.lock().unwrap().auto_ack = auto_ack;
    }

    pub fn set_auto_pong(&self, auto_pong: bool) {
        self.state.lock().unwrap().auto_pong = auto_pong;
    }

    pub fn set_ack_reply(&self, reply: AckReply) {
        self.state.lock().unwrap().ack_reply = reply;
    }

    /// Number of transport connects, probes included.
    pub fn connect_count(&self) -> usize {
        self.state.lock().unwrap().connects.len()
    }

    pub fn sent(&self) -> Vec<ClientMessage> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn clear_sent(&self) {
        self.state.lock().unwrap().sent.clear();
    }

    /// Payloads of sent application events, in send order.
    pub fn sent_events(&self) -> Vec<(String, serde_json::Value)> {
        self.sent()
            .into_iter()
            .filter_map(|msg| match msg {
                ClientMessage::Event { name, payload, .. } => Some((name, payload)),
                _ => None,
            })
            .collect()
    }

    pub fn identify_count(&self) -> usize {
        self.sent()
            .iter()
            .filter(|msg| matches!(msg, ClientMessage::Identify(_)))
            .count()
    }

    /// Ack id of the last sent frame that expects one.
    pub fn last_ack_id(&self) -> Option<u64> {
        self.sent().iter().rev().find_map(ClientMessage::ack_id)
    }

    /// Delivers a frame to the current connection.
    pub fn push(&self, msg: ServerMessage) {
        self.inject(Inbound::Frame(msg));
    }

    /// Simulates the peer closing the connection.
    pub fn close_link(&self) {
        self.inject(Inbound::Close(None));
    }

    /// Simulates the peer closing with a close frame.
    pub fn close_link_with(&self, code: u16, reason: &str) {
        self.inject(Inbound::Close(Some(PeerClose {
            code,
            reason: reason.to_string(),
        })));
    }

    /// Simulates a transport error on the current connection.
    pub fn fail_link(&self, reason: &str) {
        self.inject(Inbound::Error(reason.to_string()));
    }

    fn inject(&self, inbound: Inbound) {
        if let Some(tx) = &self.state.lock().unwrap().live {
            let _ = tx.send(inbound);
        }
    }
}

impl Default for MockNetwork {
    fn default() -> Self {
        Self::new()
    }
}

/// Mock transport for testing without real sockets.
pub struct MockTransport {
    network: MockNetwork,
    tx: Option<mpsc::UnboundedSender<Inbound>>,
    rx: Option<mpsc::UnboundedReceiver<Inbound>>,
}

impl MockTransport {
    fn new(network: MockNetwork) -> Self {
        MockTransport {
            network,
            tx: None,
            rx: None,
        }
    }
}

impl Transport for MockTransport {
    fn open(&mut self, url: &str, _timeout: Duration) -> BoxFuture<'_, TransportResult<()>> {
        let url = url.to_string();
        Box::pin(async move {
            let mut state = self.network.state.lock().unwrap();
            state.connects.push(url);
            if !state.reachable {
                return Err(TransportError::Connect("mock unreachable".into()));
            }
            let (tx, rx) = mpsc::unbounded_channel();
            state.live = Some(tx.clone());
            self.tx = Some(tx);
            self.rx = Some(rx);
            Ok(())
        })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.tx = None;
            self.rx = None;
        })
    }

    fn send(&mut self, msg: ClientMessage) -> BoxFuture<'_, TransportResult<()>> {
        Box::pin(async move {
            let Some(tx) = &self.tx else {
                return Err(TransportError::NotOpen);
            };
            let mut state = self.network.state.lock().unwrap();
            let reply = match &msg {
                ClientMessage::Ping { id } if state.auto_pong => Some(ServerMessage::pong(*id)),
                _ if state.auto_ack => msg
                    .ack_id()
                    .map(|id| ServerMessage::ack(id, state.ack_reply.clone())),
                _ => None,
            };
            state.sent.push(msg);
            if let Some(reply) = reply {
                let _ = tx.send(Inbound::Frame(reply));
            }
            Ok(())
        })
    }

    fn recv(&mut self) -> BoxFuture<'_, TransportResult<Received>> {
        Box::pin(async move {
            let Some(rx) = self.rx.as_mut() else {
                return Err(TransportError::NotOpen);
            };
            let ended = match rx.recv().await {
                Some(Inbound::Frame(msg)) => return Ok(Received::Frame(msg)),
                Some(Inbound::Error(reason)) => Err(TransportError::Receive(reason)),
                Some(Inbound::Close(close)) => Ok(Received::Closed(close)),
                None => Ok(Received::Closed(None)),
            };
            self.tx = None;
            self.rx = None;
            ended
        })
    }
}

/// Default timings; the tests run on a paused clock.
pub fn test_config() -> SessionConfig {
    SessionConfig::default()
}

pub fn identity() -> Identity {
    Identity::new("asst-test").unwrap()
}

/// A session over a fresh mock network.
pub fn session() -> (SessionManager, MockNetwork) {
    session_with(test_config())
}

pub fn session_with(config: SessionConfig) -> (SessionManager, MockNetwork) {
    let network = MockNetwork::new();
    let session = SessionManager::with_transport(config, network.factory());
    (session, network)
}

/// Polls `cond` every 10ms of (usually paused) time, panicking after `limit`.
pub async fn wait_until(limit: Duration, mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + limit;
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within {limit:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Connects and waits until the handshake completed.
pub async fn connect(session: &SessionManager) {
    session.connect("10.0.0.5", identity()).await.unwrap();
    wait_until(Duration::from_secs(5), || {
        session.get_status().state == SessionState::Connected
    })
    .await;
}
