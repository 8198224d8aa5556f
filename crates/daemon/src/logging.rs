// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing setup: a rolling file under the agent's state directory, plus
//! the `global.log_level` env-filter directive. Logging to a file rather
//! than stdout keeps the agent's own operational log out of band from
//! whatever it's tailing, so an operator who points file discovery at a
//! broad glob doesn't accidentally have the agent ingest its own output.

use std::path::Path;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init(state_dir: &Path, log_level: &str) -> std::io::Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_dir = state_dir.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "agent.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
