// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! ml-core: Shared types for the medlink assistant-to-doctor link
//!
//! This crate provides the wire protocol spoken with the doctor application
//! and the identity data sent during the identification handshake. It has no
//! async code; the session engine lives in `ml-session`.

pub mod error;
pub mod identity;
pub mod protocol;

pub use error::{Error, Result};
pub use identity::{Identification, Identity, CLIENT_TYPE, PROTOCOL_VERSION};
pub use protocol::{AckReply, ClientMessage, FileChunk, ServerMessage};
