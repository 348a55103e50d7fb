// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! medlink: command-line front end for the assistant-to-doctor link
//!
//! A thin layer over [`ml_session::SessionManager`] used to operate and
//! smoke-test a link: send an event, send a file, watch inbound traffic, or
//! show the effective setup.

pub mod cli;
pub mod commands;
pub mod config;
pub mod env;
pub mod error;
pub mod logging;

pub use cli::{Cli, Command};
pub use commands::run;
pub use config::Config;
pub use error::{Error, Result};
