// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Ordered buffer of outbound events awaiting delivery.
//!
//! Events are kept in enqueue order. An event that comes back from flight
//! (ack timeout, dropped link) is re-inserted at its original position, so
//! the buffer always drains oldest first. The buffer lives in memory for the
//! lifetime of a session; explicit disconnect empties it.

use std::collections::VecDeque;

use ml_core::protocol::{ClientMessage, FileChunk};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::ack::{DeliveryError, DeliveryResult};

/// What an outbound event carries.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// A named application event.
    Event {
        name: String,
        payload: Value,
        /// Whether the peer is asked to acknowledge it.
        expects_ack: bool,
    },
    /// One file chunk. Chunks are always acknowledged.
    Chunk(FileChunk),
}

impl Outbound {
    /// An application event that expects an acknowledgment.
    pub fn event(name: impl Into<String>, payload: Value) -> Self {
        Outbound::Event {
            name: name.into(),
            payload,
            expects_ack: true,
        }
    }

    /// Event name used in logs.
    pub fn name(&self) -> &str {
        match self {
            Outbound::Event { name, .. } => name,
            Outbound::Chunk(_) => "file_chunk",
        }
    }

    pub fn expects_ack(&self) -> bool {
        match self {
            Outbound::Event { expects_ack, .. } => *expects_ack,
            Outbound::Chunk(_) => true,
        }
    }

    /// Builds the wire frame for one send attempt.
    pub fn to_message(&self, id: u64) -> ClientMessage {
        match self {
            Outbound::Event {
                name,
                payload,
                expects_ack,
            } => ClientMessage::event(name.clone(), payload.clone(), expects_ack.then_some(id)),
            Outbound::Chunk(chunk) => ClientMessage::file_chunk(id, chunk.clone()),
        }
    }
}

/// Receives the final outcome of one outbound event.
pub type Completion = oneshot::Sender<DeliveryResult>;

/// One unit of application data on its way to the peer.
#[derive(Debug)]
pub struct OutboundEvent {
    /// Enqueue order, unique within a session.
    pub seq: u64,
    pub kind: Outbound,
    pub enqueued_at: Instant,
    /// Number of times the event was written to a live transport.
    pub attempts: u32,
    /// Attempt cap after which an unacknowledged event is given up.
    pub max_attempts: Option<u32>,
    completion: Option<Completion>,
}

impl OutboundEvent {
    pub fn new(
        seq: u64,
        kind: Outbound,
        max_attempts: Option<u32>,
        completion: Option<Completion>,
        now: Instant,
    ) -> Self {
        OutboundEvent {
            seq,
            kind,
            enqueued_at: now,
            attempts: 0,
            max_attempts,
            completion,
        }
    }

    /// True once the attempt cap (if any) has been reached.
    pub fn attempts_exhausted(&self) -> bool {
        self.max_attempts.is_some_and(|max| self.attempts >= max)
    }

    /// Resolves the caller's completion, if one is still waiting.
    pub fn complete(mut self, result: DeliveryResult) {
        if let Some(tx) = self.completion.take() {
            // Receiver may have given up waiting
            let _ = tx.send(result);
        }
    }

    /// Resolves the completion with [`DeliveryError::Discarded`].
    pub fn discard(self) {
        self.complete(Err(DeliveryError::Discarded));
    }
}

/// Enqueue-ordered buffer of events not currently in flight.
#[derive(Debug, Default)]
pub struct DeliveryBuffer {
    events: VecDeque<OutboundEvent>,
}

impl DeliveryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a newly submitted event.
    pub fn push(&mut self, event: OutboundEvent) {
        self.events.push_back(event);
    }

    /// Puts an event back at the position its sequence number dictates.
    pub fn requeue(&mut self, event: OutboundEvent) {
        let at = self.events.partition_point(|e| e.seq < event.seq);
        self.events.insert(at, event);
    }

    /// Removes the oldest event.
    pub fn pop_front(&mut self) -> Option<OutboundEvent> {
        self.events.pop_front()
    }

    pub fn front(&self) -> Option<&OutboundEvent> {
        self.events.front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Empties the buffer, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = OutboundEvent> + '_ {
        self.events.drain(..)
    }

    /// Names of buffered events in delivery order.
    pub fn names(&self) -> Vec<&str> {
        self.events.iter().map(|e| e.kind.name()).collect()
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
