// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;
use base64::Engine as _;
use crate::config::SessionConfig;
use crate::test_helpers::{connect, session_with, test_config, wait_until};
use ml_core::protocol::{AckReply, ClientMessage, ServerMessage};
use std::time::Duration;
use tempfile::tempdir;
use yare::parameterized;

const WAIT: Duration = Duration::from_secs(5);

#[parameterized(
    empty = { 0, 4, 1 },
    exact = { 8, 4, 2 },
    remainder = { 10, 4, 3 },
    smaller_than_chunk = { 3, 4, 1 },
    default_size = { 1_048_577, 512 * 1024, 3 },
)]
fn chunk_count_rounds_up(size: u64, chunk_size: usize, expected: u64) {
    assert_eq!(chunk_count(size, chunk_size), expected);
}

#[tokio::test]
async fn job_reads_file_in_order() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("scan.bin");
    std::fs::write(&path, b"0123456789").unwrap();

    let mut job = FileTransferJob::open(&path, "p1", 4).await.unwrap();
    assert_eq!(job.total_chunks(), 3);
    assert_eq!(job.file_size(), 10);
    assert_eq!(job.file_name(), "scan.bin");

    let mut data = Vec::new();
    let mut indexes = Vec::new();
    while let Some(chunk) = job.next_chunk().await.unwrap() {
        assert_eq!(chunk.owner_id, "p1");
        assert_eq!(chunk.total_chunks, 3);
        indexes.push(chunk.chunk_index);
        data.extend(STANDARD.decode(&chunk.data).unwrap());
    }

    assert_eq!(indexes, vec![0, 1, 2]);
    assert_eq!(data, b"0123456789");
}

#[tokio::test]
async fn empty_file_is_one_empty_chunk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.txt");
    std::fs::write(&path, b"").unwrap();

    let mut job = FileTransferJob::open(&path, "p1", 4).await.unwrap();
    let chunk = job.next_chunk().await.unwrap().unwrap();

    assert_eq!(chunk.total_chunks, 1);
    assert_eq!(chunk.data, "");
    assert!(job.next_chunk().await.unwrap().is_none());
}

#[tokio::test]
async fn missing_file_is_an_error() {
    let dir = tempdir().unwrap();

    let err = FileTransferJob::open(&dir.path().join("nope.pdf"), "p1", 4)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::File { .. }));
}

#[tokio::test]
async fn directory_is_rejected() {
    let dir = tempdir().unwrap();

    let err = FileTransferJob::open(dir.path(), "p1", 4).await.unwrap_err();

    assert!(matches!(err, Error::NotAFile(_)));
}

#[tokio::test]
async fn owner_is_required() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("scan.bin");
    std::fs::write(&path, b"x").unwrap();

    let err = FileTransferJob::open(&path, "  ", 4).await.unwrap_err();

    assert!(matches!(err, Error::OwnerRequired));
}

fn small_chunks() -> SessionConfig {
    SessionConfig {
        chunk_size: 4,
        ..test_config()
    }
}

fn sent_chunks(sent: &[ClientMessage]) -> Vec<(u64, u32)> {
    sent.iter()
        .filter_map(|msg| match msg {
            ClientMessage::FileChunk { ack, chunk } => Some((*ack, chunk.chunk_index)),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn next_chunk_waits_for_previous_ack() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("scan.bin");
    std::fs::write(&path, b"0123456789").unwrap();
    let (session, network) = session_with(small_chunks());
    connect(&session).await;
    network.set_auto_ack(false);

    let transfer = {
        let session = session.clone();
        let path = path.clone();
        tokio::spawn(async move { session.send_file(&path, "p1").await })
    };

    for expected in 0..3u32 {
        wait_until(WAIT, || sent_chunks(&network.sent()).len() == expected as usize + 1).await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        // Nothing beyond the unacknowledged chunk has gone out
        let chunks = sent_chunks(&network.sent());
        assert_eq!(chunks.len(), expected as usize + 1);
        let (ack, index) = *chunks.last().unwrap();
        assert_eq!(index, expected);

        network.push(ServerMessage::ack(ack, AckReply::ok()));
    }

    let report = transfer.await.unwrap().unwrap();
    assert_eq!(
        report,
        TransferReport {
            file_name: "scan.bin".into(),
            file_size: 10,
            total_chunks: 3,
        }
    );
}

#[tokio::test(start_paused = true)]
async fn negative_chunk_ack_aborts_transfer() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("scan.bin");
    std::fs::write(&path, b"0123456789").unwrap();
    let (session, network) = session_with(small_chunks());
    network.set_ack_reply(AckReply::failed("disk full"));
    connect(&session).await;

    let err = session.send_file(&path, "p1").await.unwrap_err();

    assert!(matches!(
        err,
        Error::TransferAborted { chunk_index: 0, ref reason, .. } if reason.contains("disk full")
    ));
    assert_eq!(sent_chunks(&network.sent()).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn silent_peer_aborts_transfer_after_timeout() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("scan.bin");
    std::fs::write(&path, b"0123456789").unwrap();
    let (session, network) = session_with(small_chunks());
    connect(&session).await;
    network.set_auto_ack(false);

    let err = session.send_file(&path, "p1").await.unwrap_err();

    assert!(matches!(err, Error::TransferAborted { chunk_index: 0, .. }));
    // Not resent: one attempt per chunk
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(sent_chunks(&network.sent()).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn aborted_transfer_does_not_strand_queued_events() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("scan.bin");
    std::fs::write(&path, b"0123").unwrap();
    let (session, network) = session_with(test_config());
    network.set_auto_ack(false);

    let transfer = {
        let session = session.clone();
        let path = path.clone();
        tokio::spawn(async move { session.send_file(&path, "p1").await })
    };
    wait_until(WAIT, || session.get_status().buffered == 1).await;
    session
        .send("patient:data", serde_json::json!({ "id": "p1" }))
        .unwrap();

    connect(&session).await;
    let err = transfer.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::TransferAborted { chunk_index: 0, .. }));

    // The event queued behind the dropped chunk still goes out on the live link
    wait_until(WAIT, || network.sent_events().len() == 1).await;
    assert_eq!(network.sent_events()[0].0, "patient:data");
}

#[tokio::test(start_paused = true)]
async fn link_drop_resends_pending_chunk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("scan.bin");
    std::fs::write(&path, b"0123456789").unwrap();
    let (session, network) = session_with(small_chunks());
    connect(&session).await;
    network.set_auto_ack(false);

    let transfer = {
        let session = session.clone();
        let path = path.clone();
        tokio::spawn(async move { session.send_file(&path, "p1").await })
    };
    wait_until(WAIT, || sent_chunks(&network.sent()).len() == 1).await;

    network.close_link();
    network.set_auto_ack(true);
    let report = tokio::time::timeout(Duration::from_secs(60), transfer)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    let indexes: Vec<u32> = sent_chunks(&network.sent()).iter().map(|(_, i)| *i).collect();
    assert_eq!(indexes, vec![0, 0, 1, 2]);
    assert_eq!(report.total_chunks, 3);
    assert_eq!(network.identify_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn resending_starts_from_first_chunk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("scan.bin");
    std::fs::write(&path, b"0123456789").unwrap();
    let (session, network) = session_with(small_chunks());
    network.set_ack_reply(AckReply::failed("busy"));
    connect(&session).await;
    session.send_file(&path, "p1").await.unwrap_err();

    network.set_ack_reply(AckReply::ok());
    network.clear_sent();
    let report = session.send_file(&path, "p1").await.unwrap();

    let indexes: Vec<u32> = sent_chunks(&network.sent()).iter().map(|(_, i)| *i).collect();
    assert_eq!(indexes, vec![0, 1, 2]);
    assert_eq!(report.total_chunks, 3);
}
