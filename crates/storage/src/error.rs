// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PositionError {
    #[error("position store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("position store serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum DlqError {
    #[error("dlq io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("dlq serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
