// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-file tail-and-follow task: a `notify` watcher wakes the loop
//! immediately on append, a poll tick is the backstop if the watcher
//! couldn't be created (permissions, inotify exhaustion, non-local fs).

use crate::seek::resolve_offset;
use crate::timestamp::parse_leading_timestamp;
use chrono::{DateTime, Utc};
use logcap_config::SeekStrategy;
use logcap_core::{Clock, FilePosition, FileStatus, Labels, Record, SourceId, SourceType, StreamKind, TraceId};
use logcap_storage::PositionStore;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct TailerConfig {
    pub path: PathBuf,
    pub poll_interval: Duration,
    pub seek_strategy: SeekStrategy,
    pub recent_tail_bytes: u64,
    pub labels: Labels,
}

#[cfg(unix)]
fn file_identity(meta: &std::fs::Metadata) -> (u64, u64) {
    use std::os::unix::fs::MetadataExt;
    (meta.ino(), meta.dev())
}

#[cfg(not(unix))]
fn file_identity(_meta: &std::fs::Metadata) -> (u64, u64) {
    (0, 0)
}

fn create_file_watcher(path: &Path, tx: mpsc::Sender<()>) -> Result<RecommendedWatcher, notify::Error> {
    let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
        if res.is_ok() {
            let _ = tx.blocking_send(());
        }
    })?;
    watcher.watch(path, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

fn mark_removed(positions: &PositionStore, key: &str, position: &mut FilePosition, now: DateTime<Utc>) {
    position.status = FileStatus::Removed;
    position.last_read = now;
    positions.update_file_position(key.to_string(), position.clone());
}

/// Tail `config.path` until `cancel` fires or the file becomes permanently
/// unreadable. Emitted records are pushed onto `records_tx`; the caller
/// (the supervisor, ultimately the daemon) forwards them to the dispatcher.
pub async fn run(
    config: TailerConfig,
    positions: Arc<PositionStore>,
    records_tx: mpsc::Sender<Record>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
) {
    let key = config.path.to_string_lossy().into_owned();
    let now = clock.now();

    let meta = match std::fs::metadata(&config.path) {
        Ok(m) => m,
        Err(e) => {
            warn!(path = %config.path.display(), error = %e, "file vanished before tailing could start");
            return;
        }
    };
    let (inode, device) = file_identity(&meta);
    let size = meta.len();
    let persisted = positions.file_position(&key);
    let offset = resolve_offset(
        persisted.as_ref(),
        config.seek_strategy,
        config.recent_tail_bytes,
        size,
        &config.path,
    );

    let mut position = persisted.unwrap_or_else(|| FilePosition::new(config.path.clone(), now));
    position.offset = offset;
    position.size = size;
    position.inode = inode;
    position.device = device;
    position.status = FileStatus::Active;

    let mut file = match File::open(&config.path) {
        Ok(f) => f,
        Err(e) => {
            warn!(path = %config.path.display(), error = %e, "failed to open file for tailing");
            mark_removed(&positions, &key, &mut position, now);
            return;
        }
    };
    if let Err(e) = file.seek(SeekFrom::Start(position.offset)) {
        warn!(path = %config.path.display(), error = %e, "failed to seek to initial offset");
        mark_removed(&positions, &key, &mut position, now);
        return;
    }

    let (watch_tx, mut watch_rx) = mpsc::channel(8);
    let watcher_guard = match create_file_watcher(&config.path, watch_tx) {
        Ok(w) => Some(w),
        Err(e) => {
            debug!(path = %config.path.display(), error = %e, "file watcher unavailable, using poll fallback");
            None
        }
    };

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            Some(()) = watch_rx.recv(), if watcher_guard.is_some() => {
                if !poll_once(&config, &mut file, &positions, &key, &mut position, &records_tx, clock.as_ref()).await {
                    break;
                }
            }
            _ = tokio::time::sleep(config.poll_interval) => {
                if !poll_once(&config, &mut file, &positions, &key, &mut position, &records_tx, clock.as_ref()).await {
                    break;
                }
            }
        }
    }
}

/// Read whatever has been appended since the last poll, applying rotation
/// and truncation detection first. Returns `false` when the tailer should
/// stop permanently (file gone, unreadable, or the record channel closed).
#[allow(clippy::too_many_arguments)]
async fn poll_once(
    config: &TailerConfig,
    file: &mut File,
    positions: &PositionStore,
    key: &str,
    position: &mut FilePosition,
    records_tx: &mpsc::Sender<Record>,
    clock: &dyn Clock,
) -> bool {
    let now = clock.now();
    let meta = match std::fs::metadata(&config.path) {
        Ok(m) => m,
        Err(e) => {
            warn!(path = %config.path.display(), error = %e, "file vanished, removing from active set");
            mark_removed(positions, key, position, now);
            return false;
        }
    };
    let (inode, device) = file_identity(&meta);
    let size = meta.len();

    if position.is_rotated(inode, device) {
        debug!(path = %config.path.display(), "rotation detected, reopening at offset 0");
        *file = match File::open(&config.path) {
            Ok(f) => f,
            Err(e) => {
                warn!(path = %config.path.display(), error = %e, "failed to reopen rotated file");
                mark_removed(positions, key, position, now);
                return false;
            }
        };
        position.offset = 0;
        position.inode = inode;
        position.device = device;
    } else if position.is_truncated(size) {
        debug!(path = %config.path.display(), "truncation detected, seeking to 0");
        position.offset = 0;
    }
    position.size = size;
    position.mtime = meta
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or(now);

    if position.offset > size {
        warn!(path = %config.path.display(), offset = position.offset, size, "offset beyond file size, clamping");
        position.offset = size;
    }

    if let Err(e) = file.seek(SeekFrom::Start(position.offset)) {
        warn!(path = %config.path.display(), error = %e, "seek failed, removing from active set");
        mark_removed(positions, key, position, now);
        return false;
    }

    let mut reader = BufReader::new(&mut *file);
    let mut consumed: u64 = 0;
    loop {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(n) => {
                if !line.ends_with('\n') {
                    break; // partial line: wait for the rest on the next poll
                }
                consumed += n as u64;
                let timestamp = parse_leading_timestamp(&line).unwrap_or(now);
                let record = Record::new(
                    TraceId::new(uuid::Uuid::new_v4().to_string()),
                    timestamp,
                    SourceType::File,
                    SourceId::new(key.to_string()),
                    line,
                    config.labels.clone(),
                    StreamKind::Unknown,
                );
                if records_tx.send(record).await.is_err() {
                    return false;
                }
            }
            Err(e) => {
                warn!(path = %config.path.display(), error = %e, "read error, removing from active set");
                mark_removed(positions, key, position, now);
                return false;
            }
        }
    }

    position.offset += consumed;
    position.last_read = now;
    position.status = FileStatus::Active;
    let should_flush = positions.update_file_position(key.to_string(), position.clone());
    if should_flush {
        if let Err(e) = positions.flush() {
            warn!(error = %e, "failed to flush position store");
        }
    }
    true
}
