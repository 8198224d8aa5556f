// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! File tailing ingestor: discovers configured paths/globs and follows each
//! matched file, emitting [`logcap_core::Record`]s for newly-appended lines.

mod discovery;
mod seek;
mod supervisor;
mod tailer;
mod timestamp;

pub use discovery::discover;
pub use supervisor::{FileIngestor, FileIngestorConfig};
pub use tailer::TailerConfig;
