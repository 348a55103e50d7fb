// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Typed handler table for inbound events and status notices.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::status::StatusEvent;

/// Handler name that receives every inbound event.
pub const ANY_EVENT: &str = "*";

/// A named event pushed by the peer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InboundEvent {
    pub name: String,
    pub payload: Value,
}

pub type EventHandler = Arc<dyn Fn(&InboundEvent) + Send + Sync>;
pub type StatusHandler = Arc<dyn Fn(&StatusEvent) + Send + Sync>;

/// Event name -> ordered handlers, plus status callbacks.
///
/// Multiple handlers per name are allowed and run in registration order.
#[derive(Default)]
pub struct Dispatcher {
    events: HashMap<String, Vec<EventHandler>>,
    status: Vec<StatusHandler>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for `name`, or for every event when `name` is `"*"`.
    pub fn on_event(&mut self, name: impl Into<String>, handler: EventHandler) {
        self.events.entry(name.into()).or_default().push(handler);
    }

    pub fn on_status(&mut self, handler: StatusHandler) {
        self.status.push(handler);
    }

    /// Runs the handlers for an inbound event; returns how many ran.
    ///
    /// Wildcard handlers run after the named ones.
    pub fn dispatch_event(&self, event: &InboundEvent) -> usize {
        let named = self.events.get(&event.name).into_iter().flatten();
        let wildcard = self
            .events
            .get(ANY_EVENT)
            .filter(|_| event.name != ANY_EVENT)
            .into_iter()
            .flatten();

        let mut count = 0;
        for handler in named.chain(wildcard) {
            handler(event);
            count += 1;
        }
        count
    }

    pub fn notify_status(&self, event: &StatusEvent) {
        for handler in &self.status {
            handler(event);
        }
    }

    /// Number of handlers registered for exactly `name`.
    pub fn handler_count(&self, name: &str) -> usize {
        self.events.get(name).map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.events.keys().collect();
        names.sort();
        f.debug_struct("Dispatcher")
            .field("events", &names)
            .field("status_handlers", &self.status.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
