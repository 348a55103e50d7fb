// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use thiserror::Error;

use crate::ack::DeliveryError;

/// All possible errors surfaced by the session engine.
///
/// Transport drops and ack timeouts are recovered internally and never show
/// up here; only explicit-action failures do.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid host: '{0}'\n  hint: use an IP address, host name, host:port, or ws:// URL")]
    InvalidHost(String),

    #[error("host unreachable: {host}: {reason}")]
    Unreachable { host: String, reason: String },

    #[error("connect request superseded by a newer connect")]
    Superseded,

    #[error("connect request cancelled by disconnect")]
    Cancelled,

    #[error("session is closed")]
    Closed,

    #[error("delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("file error for {path}: {source}")]
    File {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("not a regular file: {0}")]
    NotAFile(PathBuf),

    #[error("file too large: would need {0} chunks")]
    FileTooLarge(u64),

    #[error("file changed while reading: {path} ended at byte {offset}")]
    FileTruncated { path: PathBuf, offset: u64 },

    #[error("owner id is required for file transfers")]
    OwnerRequired,

    #[error("transfer of '{file_name}' aborted at chunk {chunk_index}: {reason}")]
    TransferAborted {
        file_name: String,
        chunk_index: u32,
        reason: String,
    },
}

/// A specialized Result type for session operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
