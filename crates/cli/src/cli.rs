// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Parser, Subcommand};

const QUICKSTART_HELP: &str = "\
Get started:
  medlink --host 192.168.1.20 status           Show the effective setup
  medlink --host 192.168.1.20 send chat:message --payload '{\"text\":\"hi\"}'
  medlink --host 192.168.1.20 send-file scan.pdf --owner patient-17
  medlink --host 192.168.1.20 watch            Print doctor events";

#[derive(Parser)]
#[command(name = "medlink")]
#[command(version)]
#[command(about = "Assistant-side link to the doctor application")]
#[command(after_help = QUICKSTART_HELP)]
pub struct Cli {
    /// Path to config.toml (default: platform config dir)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Doctor host: IP, host name, host:port or ws:// URL
    #[arg(long, global = true, value_name = "HOST")]
    pub host: Option<String>,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Send one event and wait for its acknowledgment
    Send {
        /// Event name, e.g. chat:message
        event: String,

        /// JSON payload (default: {})
        #[arg(long, short)]
        payload: Option<String>,

        /// Seconds to wait for the acknowledgment
        #[arg(long, short, default_value_t = 30)]
        wait: u64,
    },

    /// Send a file in acknowledged chunks
    SendFile {
        /// File to send
        path: PathBuf,

        /// Patient or record the file belongs to
        #[arg(long, short)]
        owner: String,
    },

    /// Print inbound events and status changes as JSON lines until Ctrl-C
    Watch,

    /// Show the effective configuration and client id
    Status,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
