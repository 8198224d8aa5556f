// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent per-source read-cursor state (spec §3: `FilePosition`, `ContainerPosition`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lifecycle status of a monitored file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Active,
    Removed,
    Deleted,
}

/// Persistent per-monitored-file state.
///
/// Invariants (enforced by the position tracker, not by this struct alone):
/// `offset <= size`; an `(inode, device)` change means rotation and forces
/// `offset = 0`; `size` decreasing on the same `(inode, device)` means
/// truncation and also forces `offset = 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilePosition {
    pub path: PathBuf,
    pub offset: u64,
    pub size: u64,
    pub mtime: DateTime<Utc>,
    /// 0 when unavailable (e.g. non-Unix filesystem).
    pub inode: u64,
    /// 0 when unavailable.
    pub device: u64,
    pub last_read: DateTime<Utc>,
    pub status: FileStatus,
}

impl FilePosition {
    pub fn new(path: PathBuf, now: DateTime<Utc>) -> Self {
        Self {
            path,
            offset: 0,
            size: 0,
            mtime: now,
            inode: 0,
            device: 0,
            last_read: now,
            status: FileStatus::Active,
        }
    }

    /// Whether an `(inode, device)` pair read from the filesystem signals a
    /// rotation relative to this stored position (spec §3, §4.3).
    pub fn is_rotated(&self, new_inode: u64, new_device: u64) -> bool {
        (new_inode, new_device) != (self.inode, self.device)
            && (self.inode != 0 || self.device != 0)
    }

    /// Whether a new size read from the filesystem signals truncation
    /// relative to this stored position, assuming identity is unchanged.
    pub fn is_truncated(&self, new_size: u64) -> bool {
        new_size < self.size
    }
}

/// Lifecycle status of a monitored container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerStatus {
    Active,
    Stopped,
    Removed,
    Restarted,
}

/// Persistent per-container state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerPosition {
    pub container_id: String,
    /// Instant to resume streaming from (`since=` query parameter).
    pub since: DateTime<Utc>,
    pub last_log_time: DateTime<Utc>,
    pub restart_count: u32,
    pub status: ContainerStatus,
}

impl ContainerPosition {
    pub fn new(container_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            container_id: container_id.into(),
            since: now,
            last_log_time: now,
            restart_count: 0,
            status: ContainerStatus::Active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn fresh_position_is_not_rotated_for_zero_identity() {
        let pos = FilePosition::new(PathBuf::from("/var/log/app.log"), ts());
        // Both components zero (identity never observed) must not look like a rotation.
        assert!(!pos.is_rotated(0, 0));
    }

    #[test]
    fn identity_change_is_rotation() {
        let mut pos = FilePosition::new(PathBuf::from("/var/log/app.log"), ts());
        pos.inode = 42;
        pos.device = 1;
        assert!(pos.is_rotated(43, 1));
        assert!(pos.is_rotated(42, 2));
        assert!(!pos.is_rotated(42, 1));
    }

    #[test]
    fn size_regression_is_truncation() {
        let mut pos = FilePosition::new(PathBuf::from("/var/log/app.log"), ts());
        pos.size = 1000;
        assert!(pos.is_truncated(500));
        assert!(!pos.is_truncated(1000));
        assert!(!pos.is_truncated(2000));
    }
}
