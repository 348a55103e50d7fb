// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use thiserror::Error;

/// All possible errors that can occur in the medlink CLI.
///
/// Errors provide user-friendly messages with hints for common issues.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no doctor host configured\n  hint: pass --host, set MEDLINK_HOST, or set 'host' in config.toml")]
    NoHost,

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid payload: {0}\n  hint: --payload must be a JSON value, e.g. '{{\"text\":\"hi\"}}'")]
    InvalidPayload(String),

    #[error("no acknowledgment for '{event}' within {}s", .waited.as_secs())]
    AckTimeout { event: String, waited: Duration },

    #[error("cannot determine state directory\n  hint: set MEDLINK_STATE_DIR")]
    NoStateDir,

    #[error(transparent)]
    Session(#[from] ml_session::Error),

    #[error(transparent)]
    Core(#[from] ml_core::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
