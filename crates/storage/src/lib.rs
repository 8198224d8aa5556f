// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Durable on-disk state for the log-capture agent: file/container
//! positions and the dead-letter queue.

mod atomic_write;
mod dlq_store;
mod error;
mod position_store;

pub use dlq_store::DlqStore;
pub use error::{DlqError, PositionError};
pub use position_store::PositionStore;
