// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Command implementations.
//!
//! Each command that talks to the doctor application opens its own session,
//! does its work and disconnects before returning.

use std::path::Path;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use ml_core::identity::{load_or_create_client_id, read_machine_id};
use ml_core::Identity;
use ml_session::{SessionManager, ANY_EVENT};
use serde_json::{json, Value};

use crate::cli::{Cli, Command};
use crate::config::{self, Config};
use crate::env;
use crate::error::{Error, Result};

/// Runs a parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    let config_path = config::config_path(cli.config.as_deref())?;
    let config = Config::load(&config_path)?;
    let host_override = cli.host.or_else(env::host);
    let host = host_override.as_deref();

    match cli.command {
        Command::Send {
            event,
            payload,
            wait,
        } => send(&config, host, &event, payload.as_deref(), wait).await,
        Command::SendFile { path, owner } => send_file(&config, host, &path, &owner).await,
        Command::Watch => watch(&config, host).await,
        Command::Status => status(&config, &config_path, host),
    }
}

/// Builds the handshake identity, persisting the client id in `state_dir`.
pub fn identity(config: &Config, state_dir: &Path) -> Result<Identity> {
    let client_id = load_or_create_client_id(state_dir)?;
    let machine_id = config.machine_id.clone().or_else(read_machine_id);
    Ok(Identity::new(client_id)?.with_machine_id(machine_id))
}

/// Parses a `--payload` argument; no argument means an empty object.
pub fn parse_payload(payload: Option<&str>) -> Result<Value> {
    match payload {
        None => Ok(json!({})),
        Some(raw) => serde_json::from_str(raw).map_err(|e| Error::InvalidPayload(e.to_string())),
    }
}

async fn open_session(config: &Config, host: Option<&str>) -> Result<SessionManager> {
    let host = config.resolve_host(host)?;
    let identity = identity(config, &config::state_dir()?)?;
    let session = SessionManager::spawn(config.session_config());
    session.connect(&host, identity).await?;
    tracing::info!("session opened to {}", host);
    Ok(session)
}

async fn send(
    config: &Config,
    host: Option<&str>,
    event: &str,
    payload: Option<&str>,
    wait_secs: u64,
) -> Result<()> {
    let payload = parse_payload(payload)?;
    let session = open_session(config, host).await?;

    let waited = Duration::from_secs(wait_secs);
    let outcome = tokio::time::timeout(waited, session.send_confirmed(event, payload)).await;
    session.disconnect().await;

    match outcome {
        Ok(result) => {
            result?;
            println!("{}", json!({ "event": event, "acknowledged": true }));
            Ok(())
        }
        Err(_) => Err(Error::AckTimeout {
            event: event.to_string(),
            waited,
        }),
    }
}

async fn send_file(config: &Config, host: Option<&str>, path: &Path, owner: &str) -> Result<()> {
    let session = open_session(config, host).await?;
    let result = session.send_file(path, owner).await;
    session.disconnect().await;

    let report = result?;
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

async fn watch(config: &Config, host: Option<&str>) -> Result<()> {
    let host = config.resolve_host(host)?;
    let identity = identity(config, &config::state_dir()?)?;
    let session = SessionManager::spawn(config.session_config());

    // Handlers go in before connecting so the first notices are printed
    session.on_event(ANY_EVENT, |event| {
        println!("{}", json!({ "at": timestamp(), "event": event }));
    });
    session.on_status_change(|notice| {
        println!("{}", json!({ "at": timestamp(), "status": notice }));
    });

    session.connect(&host, identity).await?;
    tracing::info!("watching {}, press Ctrl-C to stop", host);

    tokio::signal::ctrl_c().await?;
    session.disconnect().await;
    Ok(())
}

fn status(config: &Config, config_path: &Path, host: Option<&str>) -> Result<()> {
    let state_dir = config::state_dir()?;
    let identity = identity(config, &state_dir)?;
    print!("{}", format_status(config, config_path, host, &state_dir, &identity)?);
    Ok(())
}

/// Renders the `status` report.
pub fn format_status(
    config: &Config,
    config_path: &Path,
    host: Option<&str>,
    state_dir: &Path,
    identity: &Identity,
) -> Result<String> {
    let session = config.session_config();
    let (host_line, endpoint_line) = match config.resolve_host(host) {
        Ok(host) => {
            let endpoint = session.endpoint(&host)?;
            (host, endpoint)
        }
        Err(_) => ("(none)".to_string(), "(none)".to_string()),
    };

    let mut out = String::new();
    out.push_str(&format!("config:     {}\n", config_path.display()));
    out.push_str(&format!("state dir:  {}\n", state_dir.display()));
    out.push_str(&format!("host:       {}\n", host_line));
    out.push_str(&format!("endpoint:   {}\n", endpoint_line));
    out.push_str(&format!("client id:  {}\n", identity.client_id));
    out.push_str(&format!(
        "machine id: {}\n",
        identity.machine_id.as_deref().unwrap_or("(none)")
    ));
    out.push_str(&format!(
        "ack timeout: {}ms, retry window: {}s, chunk size: {} bytes\n",
        session.ack_timeout.as_millis(),
        session.backoff.window.as_secs(),
        session.chunk_size
    ));
    Ok(out)
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
