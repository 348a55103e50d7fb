// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access.
//!
//! The variable names are listed once in `env_vars.txt`; `build.rs` turns
//! them into the constants of the [`vars`] submodule.

use std::path::PathBuf;

/// Generated environment variable name constants.
pub mod vars {
    include!(concat!(env!("OUT_DIR"), "/env_vars.rs"));
}

/// Returns the value of `MEDLINK_CONFIG` if set.
pub fn config_path() -> Option<PathBuf> {
    std::env::var(vars::MEDLINK_CONFIG).ok().map(PathBuf::from)
}

/// Returns the value of `MEDLINK_STATE_DIR` if set.
pub fn state_dir() -> Option<PathBuf> {
    std::env::var(vars::MEDLINK_STATE_DIR).ok().map(PathBuf::from)
}

/// Returns the value of `MEDLINK_HOST` if set and non-empty.
pub fn host() -> Option<String> {
    std::env::var(vars::MEDLINK_HOST)
        .ok()
        .filter(|h| !h.trim().is_empty())
}

/// Returns the value of `XDG_STATE_HOME` if set.
pub fn xdg_state_home() -> Option<PathBuf> {
    std::env::var(vars::XDG_STATE_HOME).ok().map(PathBuf::from)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
