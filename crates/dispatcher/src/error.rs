// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatcher queue is closed")]
    QueueClosed,
    #[error("dlq write failed: {0}")]
    Dlq(#[from] logcap_storage::DlqError),
}
