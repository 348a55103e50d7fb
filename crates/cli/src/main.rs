// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use clap::Parser;
use medlink::logging::setup_logging;
use medlink::Cli;

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.log_file.as_deref());

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(medlink::run(cli)) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
