// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use tempfile::TempDir;
use yare::parameterized;

#[parameterized(
    object = { Some(r#"{"text":"hi"}"#), json!({"text": "hi"}) },
    array = { Some("[1,2]"), json!([1, 2]) },
    string = { Some(r#""plain""#), json!("plain") },
    missing = { None, json!({}) },
)]
fn test_parse_payload(raw: Option<&str>, expected: Value) {
    assert_eq!(parse_payload(raw).unwrap(), expected);
}

#[test]
fn test_parse_payload_rejects_invalid_json() {
    let err = parse_payload(Some("{text: hi}")).unwrap_err();
    assert!(matches!(err, Error::InvalidPayload(_)));
}

#[test]
fn test_identity_is_stable_across_calls() {
    let temp = TempDir::new().unwrap();
    let config = Config::default();

    let first = identity(&config, temp.path()).unwrap();
    let second = identity(&config, temp.path()).unwrap();
    assert_eq!(first.client_id, second.client_id);
    assert!(first.client_id.starts_with("asst-"));
}

#[test]
fn test_identity_prefers_configured_machine_id() {
    let temp = TempDir::new().unwrap();
    let config = Config {
        machine_id: Some("clinic-pc-3".to_string()),
        ..Config::default()
    };

    let identity = identity(&config, temp.path()).unwrap();
    assert_eq!(identity.machine_id.as_deref(), Some("clinic-pc-3"));
}

#[test]
fn test_format_status_with_host() {
    let config = Config::default();
    let identity = Identity::new("asst-0123456789abcdef").unwrap();

    let out = format_status(
        &config,
        Path::new("/etc/medlink/config.toml"),
        Some("192.168.1.20"),
        Path::new("/var/lib/medlink"),
        &identity,
    )
    .unwrap();

    assert!(out.contains("config:     /etc/medlink/config.toml"));
    assert!(out.contains("host:       192.168.1.20"));
    assert!(out.contains("endpoint:   ws://192.168.1.20:3001/"));
    assert!(out.contains("client id:  asst-0123456789abcdef"));
    assert!(out.contains("machine id: (none)"));
}

#[test]
fn test_format_status_without_host() {
    let config = Config::default();
    let identity = Identity::new("asst-0123456789abcdef").unwrap();

    let out = format_status(
        &config,
        Path::new("config.toml"),
        None,
        Path::new("state"),
        &identity,
    )
    .unwrap();
    assert!(out.contains("host:       (none)"));
    assert!(out.contains("endpoint:   (none)"));
}

#[test]
fn test_format_status_rejects_invalid_host() {
    let config = Config::default();
    let identity = Identity::new("asst-0123456789abcdef").unwrap();

    let err = format_status(
        &config,
        Path::new("config.toml"),
        Some("not a host"),
        Path::new("state"),
        &identity,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        Error::Session(ml_session::Error::InvalidHost(_))
    ));
}
