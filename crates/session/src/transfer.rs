// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Chunked file transfer.
//!
//! A file is read as a stream of fixed-size chunks. Each chunk goes through
//! the acknowledgment path and the next one is not read until the previous
//! one is acknowledged, so the peer always sees chunks in index order. Any
//! failure aborts the job; sending the file again starts from chunk 0.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use ml_core::protocol::FileChunk;
use serde::Serialize;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::ack::require_success;
use crate::buffer::Outbound;
use crate::error::{Error, Result};
use crate::manager::SessionManager;

/// Summary of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    pub file_name: String,
    pub file_size: u64,
    pub total_chunks: u32,
}

/// Number of chunks needed for `file_size` bytes; an empty file is one empty chunk.
pub fn chunk_count(file_size: u64, chunk_size: usize) -> u64 {
    let chunk_size = chunk_size.max(1) as u64;
    file_size.div_ceil(chunk_size).max(1)
}

/// A file being read chunk by chunk.
#[derive(Debug)]
pub struct FileTransferJob {
    path: PathBuf,
    file: File,
    owner_id: String,
    file_name: String,
    file_size: u64,
    chunk_size: usize,
    total_chunks: u32,
    next_index: u32,
    offset: u64,
}

impl FileTransferJob {
    /// Opens `path` for transfer on behalf of `owner_id`.
    pub async fn open(path: &Path, owner_id: &str, chunk_size: usize) -> Result<Self> {
        if owner_id.trim().is_empty() {
            return Err(Error::OwnerRequired);
        }
        let file_error = |source| Error::File {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).await.map_err(file_error)?;
        let metadata = file.metadata().await.map_err(file_error)?;
        if !metadata.is_file() {
            return Err(Error::NotAFile(path.to_path_buf()));
        }

        let chunk_size = chunk_size.max(1);
        let file_size = metadata.len();
        let chunks = chunk_count(file_size, chunk_size);
        let total_chunks = u32::try_from(chunks).map_err(|_| Error::FileTooLarge(chunks))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(FileTransferJob {
            path: path.to_path_buf(),
            file,
            owner_id: owner_id.to_string(),
            file_name,
            file_size,
            chunk_size,
            total_chunks,
            next_index: 0,
            offset: 0,
        })
    }

    /// Reads the next chunk, or `None` once every chunk has been produced.
    pub async fn next_chunk(&mut self) -> Result<Option<FileChunk>> {
        if self.next_index >= self.total_chunks {
            return Ok(None);
        }

        let remaining = self.file_size - self.offset;
        let want = remaining.min(self.chunk_size as u64) as usize;
        let mut buf = vec![0u8; want];
        let mut filled = 0;
        while filled < want {
            let n = self
                .file
                .read(&mut buf[filled..])
                .await
                .map_err(|source| Error::File {
                    path: self.path.clone(),
                    source,
                })?;
            if n == 0 {
                return Err(Error::FileTruncated {
                    path: self.path.clone(),
                    offset: self.offset + filled as u64,
                });
            }
            filled += n;
        }

        let chunk = FileChunk {
            owner_id: self.owner_id.clone(),
            file_name: self.file_name.clone(),
            file_size: self.file_size,
            chunk_index: self.next_index,
            total_chunks: self.total_chunks,
            data: STANDARD.encode(&buf),
        };
        self.offset += want as u64;
        self.next_index += 1;
        Ok(Some(chunk))
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn total_chunks(&self) -> u32 {
        self.total_chunks
    }

    fn report(&self) -> TransferReport {
        TransferReport {
            file_name: self.file_name.clone(),
            file_size: self.file_size,
            total_chunks: self.total_chunks,
        }
    }
}

/// Sends `path` through `session`, one acknowledged chunk at a time.
///
/// Chunks are buffered like any other event while the session is offline.
/// Each chunk gets a single delivery attempt: an ack timeout, a negative ack
/// or an explicit [`SessionManager::disconnect`] aborts the transfer with
/// [`Error::TransferAborted`]. A transport drop does not: the pending chunk
/// is re-buffered and resent once the link is back.
pub async fn send_file(
    session: &SessionManager,
    path: &Path,
    owner_id: &str,
) -> Result<TransferReport> {
    let mut job = FileTransferJob::open(path, owner_id, session.config().chunk_size).await?;
    tracing::info!(
        file = job.file_name(),
        size = job.file_size(),
        chunks = job.total_chunks(),
        "starting file transfer"
    );

    while let Some(chunk) = job.next_chunk().await? {
        let index = chunk.chunk_index;
        let rx = session.submit(Outbound::Chunk(chunk), Some(1))?;
        let outcome = rx.await.map_err(|_| Error::Closed)?;

        if let Err(e) = outcome.and_then(require_success) {
            tracing::warn!(file = job.file_name(), chunk = index, error = %e, "file transfer aborted");
            return Err(Error::TransferAborted {
                file_name: job.file_name().to_string(),
                chunk_index: index,
                reason: e.to_string(),
            });
        }
        tracing::debug!(
            file = job.file_name(),
            chunk = index + 1,
            of = job.total_chunks(),
            "chunk acknowledged"
        );
    }

    tracing::info!(file = job.file_name(), "file transfer complete");
    Ok(job.report())
}

#[cfg(test)]
#[path = "transfer_tests.rs"]
mod tests;
