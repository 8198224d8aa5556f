// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Sink` trait: the seam between the dispatcher and a concrete delivery
//! target (Loki, a local file, ...). Kept in `logcap-core` so both the
//! `logcap-dispatcher` and `logcap-sinks` crates can depend on it without
//! creating a cycle between them.

use crate::batch::Batch;
use async_trait::async_trait;
use thiserror::Error;

/// Failure classification a sink reports back to the dispatcher, used to
/// decide whether to retry, route to the DLQ, or drop (spec §4.4 taxonomy).
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink timed out: {0}")]
    Timeout(String),
    #[error("sink rejected batch: {0}")]
    Rejected(String),
    #[error("sink rejected batch for timestamp window: {0}")]
    TimestampWindow(String),
    #[error("network error reaching sink: {0}")]
    Network(String),
    #[error("sink authentication/authorization failed: {0}")]
    Auth(String),
    #[error("local sink io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A delivery target the dispatcher can push batches to.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Stable name used in metrics, logs, and DLQ entries.
    fn name(&self) -> &str;

    /// Deliver `batch`. Implementations must not partially apply a batch:
    /// either the whole batch is accepted or an error is returned.
    async fn send(&self, batch: Batch) -> Result<(), SinkError>;
}
