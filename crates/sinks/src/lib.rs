// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Concrete [`logcap_core::Sink`] implementations: a Loki-compatible HTTP
//! push sink and a local append-only file sink.

mod adaptive;
mod file_sink;
mod label_grouping;
mod loki;
mod timestamp_clamp;

pub use adaptive::AdaptiveFlushDelay;
pub use file_sink::{FileSink, FileSinkConfig};
pub use loki::{LokiSink, LokiSinkConfig};
