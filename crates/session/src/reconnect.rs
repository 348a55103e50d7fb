// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Reconnection scheduling with exponential backoff.
//!
//! The scheduler is a plain state machine driven by the session task:
//! it decides whether a retry may be scheduled, how long to wait, and
//! when the overall retry window has run out. It never sleeps itself.

use std::time::Duration;

use tokio::time::Instant;

/// Backoff parameters for reconnection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub base: Duration,
    /// Upper bound on any single delay.
    pub max: Duration,
    /// Total time after the first failure during which retries continue.
    pub window: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy {
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
            window: Duration::from_secs(600),
        }
    }
}

impl BackoffPolicy {
    /// Delay for the given zero-based attempt: `base * 2^attempt`, capped at `max`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .map_or(self.max, |d| d.min(self.max))
    }
}

/// Outcome of asking the scheduler for a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// A retry is due after `delay`.
    Scheduled { attempt: u32, delay: Duration },
    /// A retry is already pending; nothing changed.
    AlreadyPending,
    /// The user disconnected on purpose; no retry.
    Suppressed,
    /// The retry window has elapsed; retries stop until the next explicit connect.
    WindowExhausted { attempts: u32, elapsed: Duration },
}

/// Tracks retry attempts and the single pending retry deadline.
#[derive(Debug)]
pub struct ReconnectScheduler {
    policy: BackoffPolicy,
    attempt: u32,
    window_started: Option<Instant>,
    pending: Option<Instant>,
    exhausted: bool,
}

impl ReconnectScheduler {
    pub fn new(policy: BackoffPolicy) -> Self {
        ReconnectScheduler {
            policy,
            attempt: 0,
            window_started: None,
            pending: None,
            exhausted: false,
        }
    }

    /// Requests a retry after a failure observed at `now`.
    ///
    /// The retry window starts at the first request after a reset.
    pub fn schedule(&mut self, manually_disconnected: bool, now: Instant) -> RetryDecision {
        if manually_disconnected {
            return RetryDecision::Suppressed;
        }
        if self.pending.is_some() {
            return RetryDecision::AlreadyPending;
        }
        let started = *self.window_started.get_or_insert(now);
        let elapsed = now.saturating_duration_since(started);
        if self.exhausted || elapsed > self.policy.window {
            self.exhausted = true;
            return RetryDecision::WindowExhausted {
                attempts: self.attempt,
                elapsed,
            };
        }

        let delay = self.policy.delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        self.pending = Some(now + delay);
        RetryDecision::Scheduled {
            attempt: self.attempt,
            delay,
        }
    }

    /// Consumes the pending retry if its deadline has passed.
    pub fn poll_due(&mut self, now: Instant) -> bool {
        match self.pending {
            Some(at) if at <= now => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    /// Deadline of the pending retry, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending
    }

    /// Drops the pending retry but keeps the attempt count and window.
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Forgets all retry state; used after a successful connection or an
    /// explicit connect.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.window_started = None;
        self.pending = None;
        self.exhausted = false;
    }

    /// Number of retries scheduled since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

#[cfg(test)]
#[path = "reconnect_tests.rs"]
mod tests;
