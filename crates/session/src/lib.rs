// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! ml-session: the assistant-to-doctor session engine
//!
//! Keeps one persistent WebSocket session to the doctor application:
//!
//! - [`SessionManager`]: the facade collaborators call (connect, disconnect,
//!   send, send_file, status, handler registration)
//! - [`connection`]: the task that owns the transport and the state machine
//! - [`ack`] and [`buffer`]: at-least-once delivery across disconnects
//! - [`reconnect`]: exponential backoff within a bounded retry window
//! - [`transfer`]: ordered, per-chunk acknowledged file transfer

pub mod ack;
pub mod buffer;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod manager;
pub mod reconnect;
pub mod status;
pub mod transfer;
pub mod transport;

#[cfg(test)]
mod test_helpers;

pub use ack::{AckTracker, DeliveryError, DeliveryResult};
pub use buffer::{DeliveryBuffer, Outbound, OutboundEvent};
pub use config::{endpoint_url, SessionConfig, DEFAULT_CHUNK_SIZE, DEFAULT_PORT};
pub use connection::DisconnectReason;
pub use dispatch::{InboundEvent, ANY_EVENT};
pub use error::{Error, Result};
pub use manager::SessionManager;
pub use reconnect::{BackoffPolicy, ReconnectScheduler, RetryDecision};
pub use status::{SessionState, SessionStatus, StatusEvent};
pub use transfer::{FileTransferJob, TransferReport};
pub use transport::{
    PeerClose, Received, Transport, TransportError, TransportFactory, WebSocketTransport,
};
