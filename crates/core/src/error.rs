// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for ml-core operations.

use thiserror::Error;

/// All possible errors that can occur in ml-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid client id: '{0}'\n  hint: client ids are 1-128 characters without whitespace")]
    InvalidClientId(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for ml-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
