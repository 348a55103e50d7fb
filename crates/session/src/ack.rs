// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Acknowledgment tracking for outbound events.
//!
//! The tracker owns every event between submission and final outcome.
//! An event is either buffered (in the [`DeliveryBuffer`]) or in flight
//! (written, waiting for an ack), never both. All transitions take the
//! current time as an argument so the tracker can be driven by a fake
//! clock in tests.
//!
//! State transitions:
//! - submit: buffered, or in flight when the link is live and nothing older waits
//! - ack: in flight -> done (first ack wins, duplicates ignored)
//! - ack timeout: in flight -> buffered, or discarded once the attempt cap is hit
//! - link lost: all in flight -> buffered
//! - discard: everything -> dropped, completions told so

use std::collections::BTreeMap;
use std::time::Duration;

use ml_core::protocol::{AckReply, ClientMessage};
use tokio::time::Instant;

use crate::buffer::{Completion, DeliveryBuffer, Outbound, OutboundEvent};

/// Why an event was not delivered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// Dropped by an explicit disconnect.
    #[error("event discarded by disconnect")]
    Discarded,

    /// No acknowledgment after the per-event attempt cap.
    #[error("no acknowledgment after {attempts} attempt(s)")]
    Unacknowledged { attempts: u32 },

    /// The peer acknowledged with `success: false`.
    #[error("rejected by peer: {0}")]
    Rejected(String),
}

/// Final outcome of one outbound event: the peer's reply, or why there is none.
pub type DeliveryResult = Result<AckReply, DeliveryError>;

/// Maps a negative reply to [`DeliveryError::Rejected`].
pub fn require_success(reply: AckReply) -> Result<AckReply, DeliveryError> {
    if reply.success {
        Ok(reply)
    } else {
        Err(DeliveryError::Rejected(
            reply.error.unwrap_or_else(|| "unspecified error".to_string()),
        ))
    }
}

/// A frame the session should write now.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    /// Tracker id of the event; also the wire ack id when one is expected.
    pub id: u64,
    pub message: ClientMessage,
}

/// Result of an expiry sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Expired {
    /// Events put back in the buffer.
    pub requeued: usize,
    /// Events given up after reaching their attempt cap.
    pub discarded: usize,
}

#[derive(Debug)]
struct InFlight {
    event: OutboundEvent,
    deadline: Instant,
}

/// Tracks buffered and in-flight events for one session.
#[derive(Debug)]
pub struct AckTracker {
    buffer: DeliveryBuffer,
    in_flight: BTreeMap<u64, InFlight>,
    ack_timeout: Duration,
    next_seq: u64,
    next_id: u64,
    flushing: bool,
    flush_head: Option<u64>,
}

impl AckTracker {
    pub fn new(ack_timeout: Duration) -> Self {
        AckTracker {
            buffer: DeliveryBuffer::new(),
            in_flight: BTreeMap::new(),
            ack_timeout,
            next_seq: 0,
            next_id: 1,
            flushing: false,
            flush_head: None,
        }
    }

    /// Accepts a new event.
    ///
    /// Returns the frame to write when the event can go out immediately:
    /// the link is live, no flush is running and nothing older is buffered.
    /// Otherwise the event is buffered and `None` is returned.
    pub fn submit(
        &mut self,
        kind: Outbound,
        max_attempts: Option<u32>,
        completion: Option<Completion>,
        live: bool,
        now: Instant,
    ) -> Option<Dispatch> {
        let seq = self.next_seq;
        self.next_seq += 1;
        let event = OutboundEvent::new(seq, kind, max_attempts, completion, now);

        if !live || self.flushing || !self.buffer.is_empty() {
            tracing::debug!(event = event.kind.name(), seq, "buffered");
            self.buffer.push(event);
            return None;
        }
        Some(self.dispatch(event, now))
    }

    /// Moves an event in flight and builds its frame.
    fn dispatch(&mut self, mut event: OutboundEvent, now: Instant) -> Dispatch {
        let id = self.next_id;
        self.next_id += 1;
        event.attempts = event.attempts.saturating_add(1);
        let message = event.kind.to_message(id);
        self.in_flight.insert(
            id,
            InFlight {
                event,
                deadline: now + self.ack_timeout,
            },
        );
        Dispatch { id, message }
    }

    /// Records a successful write.
    ///
    /// Events that do not expect an acknowledgment are complete once written.
    pub fn written(&mut self, id: u64) {
        let expects_ack = match self.in_flight.get(&id) {
            Some(entry) => entry.event.kind.expects_ack(),
            None => return,
        };
        if expects_ack {
            return;
        }
        if let Some(entry) = self.in_flight.remove(&id) {
            entry.event.complete(Ok(AckReply::ok()));
        }
        self.release_flush_head(id);
    }

    /// Applies an acknowledgment from the peer.
    ///
    /// Returns false for unknown or duplicate ids; only the first ack counts.
    pub fn acknowledge(&mut self, id: u64, reply: AckReply) -> bool {
        let Some(entry) = self.in_flight.remove(&id) else {
            tracing::debug!(id, "ignoring ack for unknown or settled event");
            return false;
        };
        if !reply.success {
            tracing::warn!(
                event = entry.event.kind.name(),
                error = reply.error.as_deref().unwrap_or(""),
                "peer rejected event"
            );
        }
        entry.event.complete(Ok(reply));
        self.release_flush_head(id);
        true
    }

    /// Re-buffers (or gives up on) every in-flight event whose ack deadline passed.
    ///
    /// A slow ack is not treated as a dead link; the event simply goes back
    /// to the buffer. Expiry of the event a flush is waiting on ends that flush.
    pub fn expire(&mut self, now: Instant) -> Expired {
        let due: Vec<u64> = self
            .in_flight
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .map(|(id, _)| *id)
            .collect();

        let mut expired = Expired::default();
        for id in due {
            let Some(InFlight { event, .. }) = self.in_flight.remove(&id) else {
                continue;
            };
            if self.flush_head == Some(id) {
                self.flush_head = None;
                self.flushing = false;
            }
            if event.attempts_exhausted() {
                tracing::warn!(
                    event = event.kind.name(),
                    attempts = event.attempts,
                    "giving up on unacknowledged event"
                );
                let attempts = event.attempts;
                event.complete(Err(DeliveryError::Unacknowledged { attempts }));
                expired.discarded += 1;
            } else {
                tracing::warn!(
                    event = event.kind.name(),
                    attempts = event.attempts,
                    "ack timeout, re-buffering"
                );
                self.buffer.requeue(event);
                expired.requeued += 1;
            }
        }
        expired
    }

    /// Earliest ack deadline among in-flight events.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.in_flight.values().map(|entry| entry.deadline).min()
    }

    /// Begins draining the buffer one event at a time.
    pub fn start_flush(&mut self) {
        self.flushing = true;
    }

    pub fn is_flushing(&self) -> bool {
        self.flushing
    }

    /// Next buffered event to write during a flush.
    ///
    /// Returns `None` while the previous flushed event is still unresolved,
    /// and ends the flush once the buffer is empty.
    pub fn next_flush(&mut self, now: Instant) -> Option<Dispatch> {
        if !self.flushing || self.flush_head.is_some() {
            return None;
        }
        let Some(event) = self.buffer.pop_front() else {
            self.flushing = false;
            return None;
        };
        let dispatch = self.dispatch(event, now);
        self.flush_head = Some(dispatch.id);
        Some(dispatch)
    }

    fn release_flush_head(&mut self, id: u64) {
        if self.flush_head == Some(id) {
            self.flush_head = None;
        }
    }

    /// Puts every in-flight event back in the buffer after a transport drop.
    pub fn link_lost(&mut self) -> usize {
        let count = self.in_flight.len();
        for (_, entry) in std::mem::take(&mut self.in_flight) {
            self.buffer.requeue(entry.event);
        }
        self.flushing = false;
        self.flush_head = None;
        count
    }

    /// Drops everything, telling waiting callers their events were discarded.
    pub fn discard_all(&mut self) -> usize {
        let mut count = 0;
        for (_, entry) in std::mem::take(&mut self.in_flight) {
            entry.event.discard();
            count += 1;
        }
        for event in self.buffer.drain() {
            event.discard();
            count += 1;
        }
        self.flushing = false;
        self.flush_head = None;
        count
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Buffered event names in delivery order.
    pub fn buffered_names(&self) -> Vec<&str> {
        self.buffer.names()
    }
}

#[cfg(test)]
#[path = "ack_tests.rs"]
mod tests;
