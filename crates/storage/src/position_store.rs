// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable position tracking for files and containers.
//!
//! Two JSON files under `directory`: `file_positions.json` and
//! `container_positions.json`. Both are written with [`write_atomic`] and
//! rotated into `.1`/`.2`/`.3` backups before each flush.
//! A corrupt live file is quarantined to `.corrupted` rather than crashing
//! startup, and load falls back through `.1`, `.2`, ... restoring the first
//! generation that decodes. Only once every generation is unreadable does
//! the store start empty for that file, at which point ingestion
//! re-discovers every source from its configured seek strategy.

use crate::atomic_write::{quarantine, rotate_backups, write_atomic};
use crate::error::PositionError;
use chrono::{DateTime, Duration, Utc};
use logcap_core::{ContainerPosition, FilePosition, FileStatus};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::warn;

const FILE_POSITIONS_NAME: &str = "file_positions.json";
const CONTAINER_POSITIONS_NAME: &str = "container_positions.json";

fn decode<T>(path: &Path) -> Result<HashMap<String, T>, PositionError>
where
    T: serde::de::DeserializeOwned,
{
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Load `path`, falling back through its `.1`, `.2`, ... backup generations
/// on the first decode failure. The live file is quarantined to
/// `.corrupted` so a later backup generation is never mistaken for it; an
/// unreadable backup generation is skipped, not touched.
fn load_with_recovery<T>(
    path: &Path,
    backup_generations: u32,
) -> Result<HashMap<String, T>, PositionError>
where
    T: serde::de::DeserializeOwned,
{
    if path.exists() {
        match decode(path) {
            Ok(map) => return Ok(map),
            Err(e) => {
                let quarantined = quarantine(path)?;
                warn!(
                    error = %e,
                    path = %path.display(),
                    quarantined = %quarantined.display(),
                    "corrupt position file, quarantined, falling back to backup generations",
                );
            }
        }
    }

    let path_str = path.to_string_lossy().into_owned();
    for generation in 1..=backup_generations {
        let backup = PathBuf::from(format!("{path_str}.{generation}"));
        if !backup.exists() {
            continue;
        }
        match decode(&backup) {
            Ok(map) => {
                warn!(backup = %backup.display(), "recovered position state from backup generation");
                return Ok(map);
            }
            Err(e) => {
                warn!(error = %e, backup = %backup.display(), "backup generation unreadable, trying next");
            }
        }
    }

    Ok(HashMap::new())
}

/// In-memory position cache backed by two JSON files on disk.
pub struct PositionStore {
    directory: PathBuf,
    backup_generations: u32,
    flush_after_updates: u32,
    file_positions: RwLock<HashMap<String, FilePosition>>,
    container_positions: RwLock<HashMap<String, ContainerPosition>>,
    updates_since_flush: AtomicU32,
}

impl PositionStore {
    pub fn load(
        directory: PathBuf,
        backup_generations: u32,
        flush_after_updates: u32,
    ) -> Result<Self, PositionError> {
        let file_positions =
            load_with_recovery(&directory.join(FILE_POSITIONS_NAME), backup_generations)?;
        let container_positions =
            load_with_recovery(&directory.join(CONTAINER_POSITIONS_NAME), backup_generations)?;
        Ok(Self {
            directory,
            backup_generations,
            flush_after_updates,
            file_positions: RwLock::new(file_positions),
            container_positions: RwLock::new(container_positions),
            updates_since_flush: AtomicU32::new(0),
        })
    }

    pub fn file_position(&self, path: &str) -> Option<FilePosition> {
        self.file_positions.read().get(path).cloned()
    }

    pub fn container_position(&self, container_id: &str) -> Option<ContainerPosition> {
        self.container_positions.read().get(container_id).cloned()
    }

    /// Record an updated file position. Returns `true` if the caller should
    /// flush now under the update-count half of the hybrid flush policy.
    pub fn update_file_position(&self, key: impl Into<String>, position: FilePosition) -> bool {
        self.file_positions.write().insert(key.into(), position);
        self.note_update()
    }

    pub fn update_container_position(
        &self,
        key: impl Into<String>,
        position: ContainerPosition,
    ) -> bool {
        self.container_positions
            .write()
            .insert(key.into(), position);
        self.note_update()
    }

    pub fn remove_file_position(&self, key: &str) {
        self.file_positions.write().remove(key);
    }

    fn note_update(&self) -> bool {
        let count = self.updates_since_flush.fetch_add(1, Ordering::Relaxed) + 1;
        count >= self.flush_after_updates
    }

    /// Persist both position maps, rotating prior generations first.
    pub fn flush(&self) -> Result<(), PositionError> {
        let file_positions_path = self.directory.join(FILE_POSITIONS_NAME);
        let container_positions_path = self.directory.join(CONTAINER_POSITIONS_NAME);

        rotate_backups(&file_positions_path, self.backup_generations)?;
        rotate_backups(&container_positions_path, self.backup_generations)?;

        let file_positions = self.file_positions.read();
        write_atomic(
            &file_positions_path,
            serde_json::to_string(&*file_positions)?.as_bytes(),
        )?;
        drop(file_positions);

        let container_positions = self.container_positions.read();
        write_atomic(
            &container_positions_path,
            serde_json::to_string(&*container_positions)?.as_bytes(),
        )?;
        drop(container_positions);

        self.updates_since_flush.store(0, Ordering::Relaxed);
        Ok(())
    }

    /// Drop file positions that are `Removed`/`Deleted` and whose
    /// `last_read` predates `retention`. `Active` entries are never removed
    /// regardless of age — doing so would force a re-seek (data loss or
    /// duplication) on a file that is simply quiet. Container positions are
    /// retained regardless, since they're keyed by a short-lived container
    /// ID and naturally stop growing once the container is gone and
    /// rediscovery no longer touches them.
    pub fn cleanup_stale_files(&self, retention: Duration, now: DateTime<Utc>) -> usize {
        let cutoff = now - retention;
        let mut positions = self.file_positions.write();
        let before = positions.len();
        positions.retain(|_, pos| {
            let removable = matches!(pos.status, FileStatus::Removed | FileStatus::Deleted);
            !removable || pos.last_read >= cutoff
        });
        before - positions.len()
    }

    pub fn file_position_count(&self) -> usize {
        self.file_positions.read().len()
    }

    pub fn container_position_count(&self) -> usize {
        self.container_positions.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logcap_core::FileStatus;
    use std::path::PathBuf as StdPathBuf;

    fn file_position(now: DateTime<Utc>) -> FilePosition {
        FilePosition::new(StdPathBuf::from("/var/log/app.log"), now)
    }

    #[test]
    fn round_trips_through_flush_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();
        let store = PositionStore::load(dir.path().to_path_buf(), 3, 100).unwrap();
        store.update_file_position("/var/log/app.log", file_position(now));
        store.flush().unwrap();

        let reloaded = PositionStore::load(dir.path().to_path_buf(), 3, 100).unwrap();
        let pos = reloaded.file_position("/var/log/app.log").unwrap();
        assert_eq!(pos.path, StdPathBuf::from("/var/log/app.log"));
        assert_eq!(pos.status, FileStatus::Active);
    }

    #[test]
    fn quarantines_corrupt_file_instead_of_failing_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(FILE_POSITIONS_NAME), b"not valid json").unwrap();

        let store = PositionStore::load(dir.path().to_path_buf(), 3, 100).unwrap();
        assert_eq!(store.file_position_count(), 0);
        assert!(dir.path().join("file_positions.json.corrupted").exists());
        assert!(!dir.path().join("file_positions.json.1").exists());
    }

    #[test]
    fn recovers_from_backup_generation_when_live_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();
        let store = PositionStore::load(dir.path().to_path_buf(), 3, 100).unwrap();
        store.update_file_position("/var/log/app.log", file_position(now));
        store.flush().unwrap();
        // One more good flush rotates the first flush's file into `.1`.
        store.flush().unwrap();

        std::fs::write(dir.path().join(FILE_POSITIONS_NAME), b"not valid json").unwrap();

        let recovered = PositionStore::load(dir.path().to_path_buf(), 3, 100).unwrap();
        assert_eq!(recovered.file_position_count(), 1);
        assert!(recovered.file_position("/var/log/app.log").is_some());
        assert!(dir.path().join("file_positions.json.corrupted").exists());
    }

    #[test]
    fn note_update_signals_flush_after_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let store = PositionStore::load(dir.path().to_path_buf(), 3, 3).unwrap();
        let now = Utc::now();
        assert!(!store.update_file_position("a", file_position(now)));
        assert!(!store.update_file_position("b", file_position(now)));
        assert!(store.update_file_position("c", file_position(now)));
    }

    #[test]
    fn cleanup_removes_only_stale_removed_or_deleted_file_positions() {
        let dir = tempfile::tempdir().unwrap();
        let store = PositionStore::load(dir.path().to_path_buf(), 3, 100).unwrap();
        let now = Utc::now();

        let mut removed = file_position(now - Duration::hours(48));
        removed.last_read = now - Duration::hours(48);
        removed.status = FileStatus::Removed;
        store.update_file_position("removed", removed);

        let mut deleted = file_position(now - Duration::hours(48));
        deleted.last_read = now - Duration::hours(48);
        deleted.status = FileStatus::Deleted;
        store.update_file_position("deleted", deleted);

        store.update_file_position("fresh", file_position(now));

        let removed_count = store.cleanup_stale_files(Duration::hours(24), now);
        assert_eq!(removed_count, 2);
        assert!(store.file_position("fresh").is_some());
        assert!(store.file_position("removed").is_none());
        assert!(store.file_position("deleted").is_none());
    }

    #[test]
    fn cleanup_never_removes_active_file_positions_regardless_of_age() {
        let dir = tempfile::tempdir().unwrap();
        let store = PositionStore::load(dir.path().to_path_buf(), 3, 100).unwrap();
        let now = Utc::now();

        let mut stale_active = file_position(now - Duration::hours(48));
        stale_active.last_read = now - Duration::hours(48);
        stale_active.status = FileStatus::Active;
        store.update_file_position("stale-active", stale_active);

        let removed = store.cleanup_stale_files(Duration::hours(24), now);
        assert_eq!(removed, 0);
        assert!(store.file_position("stale-active").is_some());
    }
}
