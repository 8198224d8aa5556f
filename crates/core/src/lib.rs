// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! logcap-core: shared record, position, and batch types for the log-capture agent.

#[macro_use]
mod id;
mod batch;
mod clock;
mod dlq_entry;
mod position;
mod record;
mod sink;
mod stream_handle;

pub use batch::Batch;
pub use clock::{Clock, FakeClock, SystemClock};
pub use dlq_entry::{DlqEntry, FailureReason};
pub use id::ShortId;
pub use position::{ContainerPosition, ContainerStatus, FilePosition, FileStatus};
pub use record::{Labels, Record, SourceId, SourceType, StreamKind, TraceId};
pub use sink::{Sink, SinkError};
pub use stream_handle::StreamHandleMeta;
