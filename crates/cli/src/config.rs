// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! CLI configuration file handling.
//!
//! `config.toml` names the doctor host and optionally overrides the link
//! timings. Every field has a default so a missing or partial file is valid.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ml_session::{BackoffPolicy, SessionConfig, DEFAULT_CHUNK_SIZE, DEFAULT_PORT};
use serde::{Deserialize, Serialize};

use crate::env;
use crate::error::{Error, Result};

/// Name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Directory name used under the platform config and state dirs.
pub const APP_DIR_NAME: &str = "medlink";

/// Top-level CLI configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Doctor application host (IP, host name, host:port or ws:// URL).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Port applied when `host` does not name one.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Machine id sent in the handshake; read from the OS when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_id: Option<String>,
    /// Link timing overrides.
    #[serde(default)]
    pub link: LinkConfig,
}

/// Link timing overrides, in milliseconds unless named otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    #[serde(default = "default_retry_window_secs")]
    pub retry_window_secs: u64,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Zero disables the heartbeat.
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_heartbeat_timeout_secs")]
    pub heartbeat_timeout_secs: u64,
    /// Unset means events are retried until acknowledged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delivery_attempts: Option<u32>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_path() -> String {
    "/".to_string()
}

fn default_probe_timeout_ms() -> u64 {
    5_000
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_ack_timeout_ms() -> u64 {
    5_000
}

fn default_settle_delay_ms() -> u64 {
    1_000
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_max_ms() -> u64 {
    30_000
}

fn default_retry_window_secs() -> u64 {
    600
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_heartbeat_interval_secs() -> u64 {
    25
}

fn default_heartbeat_timeout_secs() -> u64 {
    10
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            path: default_path(),
            probe_timeout_ms: default_probe_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            ack_timeout_ms: default_ack_timeout_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            retry_window_secs: default_retry_window_secs(),
            chunk_size: default_chunk_size(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            heartbeat_timeout_secs: default_heartbeat_timeout_secs(),
            max_delivery_attempts: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: None,
            port: default_port(),
            machine_id: None,
            link: LinkConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from `path`.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
            Err(e) => {
                return Err(Error::Config(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))
    }

    /// Saves configuration to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Resolves the host to use: the override first, then the file.
    pub fn resolve_host(&self, host_override: Option<&str>) -> Result<String> {
        host_override
            .map(str::to_string)
            .or_else(|| self.host.clone())
            .filter(|h| !h.trim().is_empty())
            .ok_or(Error::NoHost)
    }

    /// Builds the session engine configuration.
    pub fn session_config(&self) -> SessionConfig {
        let link = &self.link;
        SessionConfig {
            port: self.port,
            path: link.path.clone(),
            probe_timeout: Duration::from_millis(link.probe_timeout_ms),
            connect_timeout: Duration::from_millis(link.connect_timeout_ms),
            ack_timeout: Duration::from_millis(link.ack_timeout_ms),
            settle_delay: Duration::from_millis(link.settle_delay_ms),
            backoff: BackoffPolicy {
                base: Duration::from_millis(link.backoff_base_ms),
                max: Duration::from_millis(link.backoff_max_ms),
                window: Duration::from_secs(link.retry_window_secs),
            },
            chunk_size: link.chunk_size.max(1),
            heartbeat_interval: Duration::from_secs(link.heartbeat_interval_secs),
            heartbeat_timeout: Duration::from_secs(link.heartbeat_timeout_secs),
            max_delivery_attempts: link.max_delivery_attempts,
        }
    }
}

/// Returns the config file path: `--config`, then `MEDLINK_CONFIG`, then the
/// platform config directory.
pub fn config_path(flag: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = flag {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = env::config_path() {
        return Ok(path);
    }
    dirs::config_dir()
        .map(|d| d.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
        .ok_or_else(|| Error::Config("cannot determine config directory".to_string()))
}

/// Returns the state directory holding the persisted client id.
///
/// Uses `MEDLINK_STATE_DIR` if set, otherwise `$XDG_STATE_HOME/medlink` or
/// `~/.local/state/medlink`.
pub fn state_dir() -> Result<PathBuf> {
    if let Some(dir) = env::state_dir() {
        return Ok(dir);
    }
    if let Some(xdg) = env::xdg_state_home() {
        return Ok(xdg.join(APP_DIR_NAME));
    }
    dirs::home_dir()
        .map(|home| home.join(".local/state").join(APP_DIR_NAME))
        .ok_or(Error::NoStateDir)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
