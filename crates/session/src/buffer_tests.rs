// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;
use ml_core::protocol::AckReply;
use serde_json::json;

fn event(seq: u64, name: &str) -> OutboundEvent {
    OutboundEvent::new(
        seq,
        Outbound::event(name, json!({ "seq": seq })),
        None,
        None,
        Instant::now(),
    )
}

#[test]
fn push_keeps_enqueue_order() {
    let mut buffer = DeliveryBuffer::new();
    buffer.push(event(0, "a"));
    buffer.push(event(1, "b"));
    buffer.push(event(2, "c"));

    assert_eq!(buffer.len(), 3);
    assert_eq!(buffer.names(), vec!["a", "b", "c"]);
    assert_eq!(buffer.pop_front().unwrap().seq, 0);
}

#[test]
fn requeue_restores_original_position() {
    let mut buffer = DeliveryBuffer::new();
    buffer.push(event(1, "b"));
    buffer.push(event(3, "d"));

    buffer.requeue(event(2, "c"));
    buffer.requeue(event(0, "a"));
    buffer.requeue(event(4, "e"));

    assert_eq!(buffer.names(), vec!["a", "b", "c", "d", "e"]);
}

#[test]
fn drain_empties_oldest_first() {
    let mut buffer = DeliveryBuffer::new();
    buffer.push(event(0, "a"));
    buffer.push(event(1, "b"));

    let seqs: Vec<u64> = buffer.drain().map(|e| e.seq).collect();

    assert_eq!(seqs, vec![0, 1]);
    assert!(buffer.is_empty());
    assert!(buffer.front().is_none());
}

#[test]
fn event_frame_carries_ack_id_only_when_expected() {
    let acked = Outbound::event("patient:data", json!({ "id": "p1" }));
    let unacked = Outbound::Event {
        name: "presence:update".into(),
        payload: json!(null),
        expects_ack: false,
    };

    assert_eq!(acked.to_message(7).ack_id(), Some(7));
    assert_eq!(unacked.to_message(7).ack_id(), None);
}

#[test]
fn chunk_always_expects_ack() {
    let chunk = Outbound::Chunk(FileChunk {
        owner_id: "p1".into(),
        file_name: "scan.pdf".into(),
        file_size: 3,
        chunk_index: 0,
        total_chunks: 1,
        data: "AAAA".into(),
    });

    assert!(chunk.expects_ack());
    assert_eq!(chunk.name(), "file_chunk");
    assert_eq!(chunk.to_message(9).ack_id(), Some(9));
}

#[test]
fn attempts_exhausted_respects_cap() {
    let mut capped = OutboundEvent::new(0, Outbound::event("a", json!(1)), Some(2), None, Instant::now());
    assert!(!capped.attempts_exhausted());
    capped.attempts = 2;
    assert!(capped.attempts_exhausted());

    let mut unlimited = event(1, "b");
    unlimited.attempts = u32::MAX;
    assert!(!unlimited.attempts_exhausted());
}

#[test]
fn complete_resolves_waiting_caller() {
    let (tx, mut rx) = oneshot::channel();
    let event = OutboundEvent::new(0, Outbound::event("a", json!(1)), None, Some(tx), Instant::now());

    event.complete(Ok(AckReply::ok()));

    assert_eq!(rx.try_recv().unwrap(), Ok(AckReply::ok()));
}

#[test]
fn discard_reports_discarded() {
    let (tx, mut rx) = oneshot::channel();
    let event = OutboundEvent::new(0, Outbound::event("a", json!(1)), None, Some(tx), Instant::now());

    event.discard();

    assert_eq!(rx.try_recv().unwrap(), Err(DeliveryError::Discarded));
}

#[test]
fn complete_tolerates_dropped_receiver() {
    let (tx, rx) = oneshot::channel();
    drop(rx);
    let event = OutboundEvent::new(0, Outbound::event("a", json!(1)), None, Some(tx), Instant::now());

    event.complete(Ok(AckReply::ok()));
}
