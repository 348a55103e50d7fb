// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Session lifecycle state and status reporting.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, AtomicUsize, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Lifecycle state of a session.
///
/// ```text
/// Disconnected --connect/retry--> Connecting --open--> Connected
/// Connecting   --error/timeout--> Disconnected
/// Connected    --drop-----------> Disconnected --retry scheduled--> Reconnecting
/// Reconnecting --timer fires----> Connecting
/// any          --disconnect()---> Disconnected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl SessionState {
    fn as_u8(self) -> u8 {
        match self {
            SessionState::Disconnected => 0,
            SessionState::Connecting => 1,
            SessionState::Connected => 2,
            SessionState::Reconnecting => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => SessionState::Connecting,
            2 => SessionState::Connected,
            3 => SessionState::Reconnecting,
            _ => SessionState::Disconnected,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Reconnecting => "reconnecting",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot returned by `get_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub state: SessionState,
    pub manually_disconnected: bool,
    /// Retries scheduled since the last successful connection.
    pub attempt: u32,
    /// Events waiting in the delivery buffer.
    pub buffered: usize,
    /// Events written and awaiting acknowledgment.
    pub in_flight: usize,
}

/// Notices delivered to the status sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatusEvent {
    /// The session moved to a new lifecycle state.
    State { state: SessionState },
    /// First successful connection of this session instance.
    Established { host: String },
    /// Automatic reconnection gave up; an explicit connect is required.
    RetryWindowExhausted {
        attempts: u32,
        #[serde(with = "duration_secs")]
        elapsed: Duration,
    },
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
}

/// Status shared between the session task and its handles.
///
/// Uses atomics for lock-free reads from any thread.
#[derive(Debug)]
pub struct SharedStatus {
    state: AtomicU8,
    manual: AtomicBool,
    attempt: AtomicU32,
    buffered: AtomicUsize,
    in_flight: AtomicUsize,
}

impl SharedStatus {
    /// Create a new shared status initialized to disconnected.
    pub fn new() -> Self {
        SharedStatus {
            state: AtomicU8::new(SessionState::Disconnected.as_u8()),
            manual: AtomicBool::new(false),
            attempt: AtomicU32::new(0),
            buffered: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Stores the state, returning the previous one.
    pub fn set_state(&self, state: SessionState) -> SessionState {
        SessionState::from_u8(self.state.swap(state.as_u8(), Ordering::AcqRel))
    }

    pub fn set_manual(&self, manual: bool) {
        self.manual.store(manual, Ordering::Release);
    }

    pub fn set_attempt(&self, attempt: u32) {
        self.attempt.store(attempt, Ordering::Release);
    }

    pub fn set_counts(&self, buffered: usize, in_flight: usize) {
        self.buffered.store(buffered, Ordering::Release);
        self.in_flight.store(in_flight, Ordering::Release);
    }

    pub fn snapshot(&self) -> SessionStatus {
        SessionStatus {
            state: self.state(),
            manually_disconnected: self.manual.load(Ordering::Acquire),
            attempt: self.attempt.load(Ordering::Acquire),
            buffered: self.buffered.load(Ordering::Acquire),
            in_flight: self.in_flight.load(Ordering::Acquire),
        }
    }
}

impl Default for SharedStatus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
