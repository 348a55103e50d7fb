// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The link to the doctor application.
//!
//! A [`TransportFactory`] hands the session task a fresh, unopened
//! transport for every probe and every connect attempt. A transport is
//! opened once and discarded when the link ends; it is never reopened.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use ml_core::protocol::{ClientMessage, ServerMessage};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// Failures of a single link.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("connect timed out after {0:?}")]
    Timeout(Duration),

    #[error("link is not open")]
    NotOpen,

    #[error("send failed: {0}")]
    Send(String),

    #[error("receive failed: {0}")]
    Receive(String),

    /// An inbound frame that is not a valid server message. The link stays up.
    #[error("malformed frame: {0}")]
    Malformed(String),
}

pub type TransportResult<T> = Result<T, TransportError>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Creates an unopened transport for each probe or connect attempt.
pub type TransportFactory<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// Close code and reason sent by the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerClose {
    pub code: u16,
    pub reason: String,
}

impl fmt::Display for PeerClose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "code {}", self.code)
        } else {
            write!(f, "code {}: {}", self.code, self.reason)
        }
    }
}

impl From<CloseFrame> for PeerClose {
    fn from(frame: CloseFrame) -> Self {
        PeerClose {
            code: frame.code.into(),
            reason: frame.reason.as_str().to_string(),
        }
    }
}

/// What one `recv` produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Received {
    Frame(ServerMessage),
    /// The link ended without an error. Carries the close frame if the peer sent one.
    Closed(Option<PeerClose>),
}

/// One link to the doctor application.
///
/// `recv` must be cancel-safe: the session task drops a pending `recv`
/// whenever a command or timer wins its select.
pub trait Transport: Send + Sync {
    /// Opens the link, giving up after `timeout`.
    fn open(&mut self, url: &str, timeout: Duration) -> BoxFuture<'_, TransportResult<()>>;

    /// Best-effort close handshake.
    fn close(&mut self) -> BoxFuture<'_, ()>;

    fn send(&mut self, msg: ClientMessage) -> BoxFuture<'_, TransportResult<()>>;

    /// Waits for the next frame. After `Closed` or an error other than
    /// `Malformed` the link is gone.
    fn recv(&mut self) -> BoxFuture<'_, TransportResult<Received>>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Link {
    sink: SplitSink<WsStream, Message>,
    source: SplitStream<WsStream>,
}

/// WebSocket link using tokio-tungstenite; frames are JSON text messages.
#[derive(Default)]
pub struct WebSocketTransport {
    link: Option<Link>,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for WebSocketTransport {
    fn open(&mut self, url: &str, timeout: Duration) -> BoxFuture<'_, TransportResult<()>> {
        let url = url.to_string();
        Box::pin(async move {
            let connecting = tokio_tungstenite::connect_async(url.as_str());
            let (stream, _) = match tokio::time::timeout(timeout, connecting).await {
                Ok(result) => result.map_err(|e| TransportError::Connect(e.to_string()))?,
                Err(_) => return Err(TransportError::Timeout(timeout)),
            };
            let (sink, source) = stream.split();
            self.link = Some(Link { sink, source });
            Ok(())
        })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if let Some(mut link) = self.link.take() {
                let _ = link.sink.close().await;
            }
        })
    }

    fn send(&mut self, msg: ClientMessage) -> BoxFuture<'_, TransportResult<()>> {
        Box::pin(async move {
            let link = self.link.as_mut().ok_or(TransportError::NotOpen)?;
            let text = msg
                .to_json()
                .map_err(|e| TransportError::Send(e.to_string()))?;

            // SinkExt::send flushes, so a dead socket shows up here
            let result = link.sink.send(Message::Text(text.into())).await;
            if let Err(e) = result {
                self.link = None;
                return Err(TransportError::Send(e.to_string()));
            }
            Ok(())
        })
    }

    fn recv(&mut self) -> BoxFuture<'_, TransportResult<Received>> {
        Box::pin(async move {
            let link = self.link.as_mut().ok_or(TransportError::NotOpen)?;
            let ended = loop {
                match link.source.next().await {
                    Some(Ok(Message::Text(text))) => {
                        return ServerMessage::from_json(&text)
                            .map(Received::Frame)
                            .map_err(|e| TransportError::Malformed(e.to_string()));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break Ok(Received::Closed(frame.map(PeerClose::from)))
                    }
                    // Ping/pong is answered by tungstenite; binary is not part of the protocol
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => break Err(TransportError::Receive(e.to_string())),
                    None => break Ok(Received::Closed(None)),
                }
            };
            self.link = None;
            ended
        })
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
