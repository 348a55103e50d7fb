// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Session timing and addressing configuration.
//!
//! The defaults are the recommended constants for the doctor link; callers
//! (the CLI, tests) override individual fields.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::reconnect::BackoffPolicy;

/// Default port of the doctor application.
pub const DEFAULT_PORT: u16 = 3001;

/// Default chunk size for file transfers (512 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 512 * 1024;

/// Configuration for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Port used when the host does not name one.
    pub port: u16,
    /// WebSocket path on the doctor application.
    pub path: String,
    /// Timeout of the reachability probe made by an explicit connect.
    pub probe_timeout: Duration,
    /// Timeout of each persistent transport connect.
    pub connect_timeout: Duration,
    /// Time to wait for an acknowledgment before re-buffering an event.
    pub ack_timeout: Duration,
    /// Delay between the identification handshake and the first flush.
    pub settle_delay: Duration,
    /// Reconnection backoff and retry window.
    pub backoff: BackoffPolicy,
    /// File transfer chunk size in bytes.
    pub chunk_size: usize,
    /// Interval between heartbeat pings (zero disables heartbeat).
    pub heartbeat_interval: Duration,
    /// Max time to wait for any inbound frame after a ping.
    pub heartbeat_timeout: Duration,
    /// Per-event cap on unacknowledged send attempts (`None` = unlimited).
    pub max_delivery_attempts: Option<u32>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            port: DEFAULT_PORT,
            path: "/".to_string(),
            probe_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
            ack_timeout: Duration::from_secs(5),
            settle_delay: Duration::from_secs(1),
            backoff: BackoffPolicy::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            heartbeat_interval: Duration::from_secs(25),
            heartbeat_timeout: Duration::from_secs(10),
            max_delivery_attempts: None,
        }
    }
}

impl SessionConfig {
    /// Resolves `host` to the WebSocket URL of the doctor application.
    pub fn endpoint(&self, host: &str) -> Result<String> {
        endpoint_url(host, self.port, &self.path)
    }
}

/// Builds a WebSocket URL from a host specification.
///
/// Accepted forms:
/// - `ws://...` or `wss://...` - used verbatim
/// - `host:port` or `[v6]:port` - port kept
/// - bare host, IPv4 or IPv6 address - `default_port` applied
pub fn endpoint_url(host: &str, default_port: u16, path: &str) -> Result<String> {
    let host = host.trim();
    if host.is_empty() || host.chars().any(char::is_whitespace) {
        return Err(Error::InvalidHost(host.to_string()));
    }

    if host.starts_with("ws://") || host.starts_with("wss://") {
        return Ok(host.to_string());
    }
    if host.contains("://") || host.contains('/') {
        return Err(Error::InvalidHost(host.to_string()));
    }

    let authority = if let Some(rest) = host.strip_prefix('[') {
        // Bracketed IPv6, with or without port
        match rest.split_once(']') {
            Some((_, "")) => format!("{}:{}", host, default_port),
            Some((_, port)) if is_port_suffix(port) => host.to_string(),
            _ => return Err(Error::InvalidHost(host.to_string())),
        }
    } else {
        match host.matches(':').count() {
            0 => format!("{}:{}", host, default_port),
            1 => {
                let (name, port) = host.split_once(':').unwrap_or((host, ""));
                if name.is_empty() || port.parse::<u16>().is_err() {
                    return Err(Error::InvalidHost(host.to_string()));
                }
                host.to_string()
            }
            // Bare IPv6 address
            _ => format!("[{}]:{}", host, default_port),
        }
    };

    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    Ok(format!("ws://{}{}", authority, path))
}

fn is_port_suffix(s: &str) -> bool {
    s.strip_prefix(':')
        .is_some_and(|p| p.parse::<u16>().is_ok())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
