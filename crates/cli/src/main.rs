// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! logcapctl - operator CLI for the log-capture agent.
//!
//! Talks only to the filesystem (config files, state directories); there is
//! no admin socket to a running `logcapd` to query.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "logcapctl", version, about = "Operator CLI for logcapd")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a config file, reporting every problem found
    ValidateConfig {
        /// Path to the agent's YAML config
        path: PathBuf,
    },
    /// Print the agent's default configuration as YAML
    ShowDefaults,
    /// Summarize position-store state for an instance's state directory
    Positions {
        /// Path to the agent's state directory (the one holding positions/)
        state_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::ValidateConfig { path } => commands::validate_config(&path),
        Commands::ShowDefaults => commands::show_defaults(),
        Commands::Positions { state_dir } => commands::positions(&state_dir),
    }
}
