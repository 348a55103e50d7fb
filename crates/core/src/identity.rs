// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client identity for the identification handshake.
//!
//! The caller supplies an [`Identity`] (stable client id, optional machine
//! id). The session turns it into an [`Identification`] payload stamped with
//! the client type, protocol version and current time on every connect.

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Client type announced to the doctor application.
pub const CLIENT_TYPE: &str = "assistant";

/// Protocol version announced during identification.
pub const PROTOCOL_VERSION: &str = "1.0";

/// File holding the persisted per-install client id.
const CLIENT_ID_FILE: &str = "client_id";

const MAX_CLIENT_ID_LEN: usize = 128;

const MACHINE_ID_PATHS: [&str; 2] = ["/etc/machine-id", "/var/lib/dbus/machine-id"];

/// Caller-supplied identity of this assistant install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable per-install client id.
    pub client_id: String,
    /// Optional machine id.
    pub machine_id: Option<String>,
}

impl Identity {
    /// Creates an identity, validating the client id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidClientId`] if the id is empty, too long, or
    /// contains whitespace.
    pub fn new(client_id: impl Into<String>) -> Result<Self> {
        let client_id = client_id.into();
        if !validate_client_id(&client_id) {
            return Err(Error::InvalidClientId(client_id));
        }
        Ok(Identity {
            client_id,
            machine_id: None,
        })
    }

    /// Attaches a machine id.
    pub fn with_machine_id(mut self, machine_id: Option<String>) -> Self {
        self.machine_id = machine_id.filter(|m| !m.is_empty());
        self
    }
}

/// Identification payload sent immediately after the transport opens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Identification {
    /// Always [`CLIENT_TYPE`].
    pub client_type: String,
    /// Stable per-install client id.
    pub client_id: String,
    /// Machine id, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_id: Option<String>,
    /// Protocol version.
    pub version: String,
    /// ISO-8601 UTC timestamp of the handshake.
    pub timestamp: String,
}

impl Identification {
    /// Builds the handshake payload for `identity`, stamped with the current time.
    pub fn new(identity: &Identity) -> Self {
        Self::at(identity, Utc::now())
    }

    /// Builds the handshake payload stamped with `now`.
    pub fn at(identity: &Identity, now: DateTime<Utc>) -> Self {
        Identification {
            client_type: CLIENT_TYPE.to_string(),
            client_id: identity.client_id.clone(),
            machine_id: identity.machine_id.clone(),
            version: PROTOCOL_VERSION.to_string(),
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Returns true if `id` is usable as a client id.
pub fn validate_client_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= MAX_CLIENT_ID_LEN && !id.chars().any(char::is_whitespace)
}

/// Generate a client id from a host name and timestamp.
/// Format: asst-{hash} where hash is the first 16 hex chars of
/// SHA256(host + pid + timestamp)
pub fn generate_client_id(host: &str, created_at: &DateTime<Utc>) -> String {
    let input = format!(
        "{}{}{}",
        host,
        std::process::id(),
        created_at.to_rfc3339_opts(SecondsFormat::Nanos, true)
    );
    let hash = Sha256::digest(input.as_bytes());
    format!("asst-{}", hex::encode(&hash[..8]))
}

/// Reads the persisted client id from `dir`, creating one on first use.
///
/// The id is stable for the lifetime of the install: once written it is
/// never regenerated unless the file is removed.
pub fn load_or_create_client_id(dir: &Path) -> Result<String> {
    let path = client_id_path(dir);
    match fs::read_to_string(&path) {
        Ok(content) => {
            let id = content.trim().to_string();
            if validate_client_id(&id) {
                return Ok(id);
            }
            // Corrupt file: fall through and rewrite it
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    fs::create_dir_all(dir)?;
    let id = generate_client_id(&host_name(), &Utc::now());
    fs::write(&path, format!("{}\n", id))?;
    Ok(id)
}

/// Path of the client id file inside `dir`.
pub fn client_id_path(dir: &Path) -> PathBuf {
    dir.join(CLIENT_ID_FILE)
}

/// Reads the OS machine id, if one is available.
pub fn read_machine_id() -> Option<String> {
    let paths: Vec<&Path> = MACHINE_ID_PATHS.iter().map(Path::new).collect();
    machine_id_from(&paths)
}

fn machine_id_from(paths: &[&Path]) -> Option<String> {
    paths.iter().find_map(|p| {
        fs::read_to_string(p)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

fn host_name() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|s| !s.is_empty())
        .or_else(|| {
            fs::read_to_string("/etc/hostname")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_else(|| "localhost".to_string())
}
