// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! logcapd
//!
//! Container and file log capture agent: tails container stdout/stderr and
//! local log files, batches and deduplicates records, and ships them to a
//! Loki-compatible push endpoint (and optionally a local rotated file).

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use logcap_config::AgentConfig;
use logcap_daemon::lifecycle::{self, LifecycleError};
use std::path::PathBuf;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

fn config_path() -> PathBuf {
    std::env::var("LOGCAPD_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/etc/logcap/agent.yaml"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("logcapd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("logcapd {}", env!("CARGO_PKG_VERSION"));
                println!("Container and file log capture agent");
                println!();
                println!("USAGE:");
                println!("    logcapd");
                println!();
                println!("Configuration is read from the path in LOGCAPD_CONFIG");
                println!("(default /etc/logcap/agent.yaml) and overridden by OJLC_* env vars.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: logcapd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = AgentConfig::load(&config_path())?;

    let lock_path = config.global.state_dir.join("logcapd.lock");
    let _lock = match lifecycle::acquire_instance_lock(&lock_path) {
        Ok(lock) => lock,
        Err(LifecycleError::AlreadyRunning(path)) => {
            eprintln!("logcapd is already running (lock held at {})", path.display());
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    let log_guard = logcap_daemon::logging::init(&config.global.state_dir, &config.global.log_level)?;

    info!(instance_id = %config.global.instance_id, "starting logcapd");

    let daemon = match lifecycle::startup(config).await {
        Ok(daemon) => daemon,
        Err(e) => {
            error!(error = %e, "failed to start daemon");
            drop(log_guard);
            return Err(e.into());
        }
    };

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!("logcapd ready");
    println!("READY");

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    daemon.shutdown().await;
    info!("logcapd stopped");
    drop(log_guard);
    Ok(())
}
