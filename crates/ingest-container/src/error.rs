// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("connecting to container daemon socket: {0}")]
    Io(#[from] std::io::Error),
    #[error("decoding daemon response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("daemon returned http status {0}: {1}")]
    Http(u16, String),
    #[error("malformed daemon response: {0}")]
    Protocol(String),
}
