// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt::Write as _;

const VARS_FILE: &str = "env_vars.txt";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed={VARS_FILE}");

    let names: Vec<String> = std::fs::read_to_string(VARS_FILE)?
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect();

    let mut out = String::new();
    for name in &names {
        if !name.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_') {
            return Err(format!("{VARS_FILE}: invalid variable name '{name}'").into());
        }
        writeln!(out, "pub const {name}: &str = \"{name}\";")?;
    }
    writeln!(out, "/// Every variable listed in `{VARS_FILE}`.")?;
    writeln!(out, "pub const ALL: &[&str] = &[{}];", names.join(", "))?;

    let out_dir = std::env::var("OUT_DIR")?;
    std::fs::write(std::path::Path::new(&out_dir).join("env_vars.rs"), out)?;
    Ok(())
}
