// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket protocol messages for the assistant-to-doctor link.
//!
//! The protocol is simple:
//! - The assistant identifies itself, then sends named events and file
//!   chunks, each optionally tagged with an acknowledgment id
//! - The doctor application acknowledges by id and pushes its own named
//!   events, some of which demand an acknowledgment in return

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identity::Identification;

/// Well-known event names exchanged with the doctor application.
///
/// Any name is legal on the wire; these are the ones both sides agree on.
pub mod events {
    /// A patient record pushed to the doctor.
    pub const PATIENT_DATA: &str = "patient:data";
    /// A chat-style message in either direction.
    pub const CHAT_MESSAGE: &str = "chat:message";
    /// Presence/status broadcast from the doctor.
    pub const PRESENCE: &str = "presence:update";
    /// Free-form debug notice.
    pub const DEBUG: &str = "debug";
    /// User-facing alert notice.
    pub const ALERT: &str = "alert";
}

/// Reply carried by an acknowledgment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AckReply {
    /// Whether the receiver accepted the event.
    pub success: bool,
    /// Receiver-side error description when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AckReply {
    /// A successful reply.
    pub fn ok() -> Self {
        AckReply {
            success: true,
            error: None,
        }
    }

    /// A failed reply with a reason.
    pub fn failed(error: impl Into<String>) -> Self {
        AckReply {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// One fixed-size slice of a file, associated with a business entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileChunk {
    /// Business entity the file belongs to (e.g. a patient id).
    pub owner_id: String,
    /// File name without directories.
    pub file_name: String,
    /// Total file size in bytes.
    pub file_size: u64,
    /// Zero-based index of this chunk.
    pub chunk_index: u32,
    /// Number of chunks in the whole file.
    pub total_chunks: u32,
    /// Chunk bytes, standard base64.
    pub data: String,
}

/// Messages sent from the assistant to the doctor application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Identification handshake, sent immediately after connecting.
    Identify(Identification),

    /// A named application event.
    Event {
        /// Event name, e.g. `patient:data`.
        name: String,
        /// Opaque JSON payload.
        payload: Value,
        /// Acknowledgment id, present when the sender expects an ack.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ack: Option<u64>,
    },

    /// One chunk of a file transfer. Always acknowledged.
    FileChunk {
        /// Acknowledgment id for this chunk.
        ack: u64,
        /// The chunk itself.
        chunk: FileChunk,
    },

    /// Reply to an inbound event that demanded an acknowledgment.
    Ack {
        /// The id from the inbound event.
        id: u64,
        /// Outcome of handling the event.
        reply: AckReply,
    },

    /// Heartbeat ping.
    Ping {
        /// Client-chosen ID echoed in Pong.
        id: u64,
    },
}

/// Messages sent from the doctor application to the assistant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A named event pushed by the doctor.
    ///
    /// Presence broadcasts, chat messages and debug/alert notices all
    /// arrive this way.
    Event {
        /// Event name.
        name: String,
        /// Opaque JSON payload.
        #[serde(default)]
        payload: Value,
        /// When present the doctor expects an `Ack` with this id.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ack: Option<u64>,
    },

    /// Acknowledgment of an outbound event or file chunk.
    Ack {
        /// Acknowledgment id from the outbound frame.
        id: u64,
        /// Whether the doctor accepted the frame.
        success: bool,
        /// Error description when `success` is false.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// Pong response to client Ping.
    Pong {
        /// Echoed from the Ping message.
        id: u64,
    },
}

impl ClientMessage {
    /// Creates an Identify message.
    pub fn identify(identification: Identification) -> Self {
        ClientMessage::Identify(identification)
    }

    /// Creates an Event message.
    pub fn event(name: impl Into<String>, payload: Value, ack: Option<u64>) -> Self {
        ClientMessage::Event {
            name: name.into(),
            payload,
            ack,
        }
    }

    /// Creates a FileChunk message.
    pub fn file_chunk(ack: u64, chunk: FileChunk) -> Self {
        ClientMessage::FileChunk { ack, chunk }
    }

    /// Creates an Ack message.
    pub fn ack(id: u64, reply: AckReply) -> Self {
        ClientMessage::Ack { id, reply }
    }

    /// Creates a Ping message.
    pub fn ping(id: u64) -> Self {
        ClientMessage::Ping { id }
    }

    /// Returns the acknowledgment id this frame expects, if any.
    pub fn ack_id(&self) -> Option<u64> {
        match self {
            ClientMessage::Event { ack, .. } => *ack,
            ClientMessage::FileChunk { ack, .. } => Some(*ack),
            _ => None,
        }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Creates an Event message.
    pub fn event(name: impl Into<String>, payload: Value, ack: Option<u64>) -> Self {
        ServerMessage::Event {
            name: name.into(),
            payload,
            ack,
        }
    }

    /// Creates an Ack message from a reply.
    pub fn ack(id: u64, reply: AckReply) -> Self {
        ServerMessage::Ack {
            id,
            success: reply.success,
            error: reply.error,
        }
    }

    /// Creates a Pong message.
    pub fn pong(id: u64) -> Self {
        ServerMessage::Pong { id }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
