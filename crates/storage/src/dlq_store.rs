// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dead-letter-queue persistence: an append-only JSONL log of [`DlqEntry`]
//! records, compacted on demand when entries are resolved or expired.
//!
//! Appends are cheap (one `write` + `sync_all`). Because the log is
//! append-only, removing or aging out entries requires a rewrite-compact
//! pass; callers should batch removals rather than call it per entry.

use crate::atomic_write::{rotate_backups, write_atomic};
use crate::error::DlqError;
use chrono::{DateTime, Duration, Utc};
use logcap_core::DlqEntry;
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

const ENTRIES_FILE: &str = "entries.jsonl";
const MAX_ROTATED_GENERATIONS: u32 = 3;

pub struct DlqStore {
    directory: PathBuf,
    max_bytes: u64,
}

impl DlqStore {
    pub fn new(directory: PathBuf, max_bytes: u64) -> Self {
        Self {
            directory,
            max_bytes,
        }
    }

    fn entries_path(&self) -> PathBuf {
        self.directory.join(ENTRIES_FILE)
    }

    pub fn append(&self, entry: &DlqEntry) -> Result<(), DlqError> {
        std::fs::create_dir_all(&self.directory)?;
        self.rotate_if_over_cap()?;

        let path = self.entries_path();
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        let line = serde_json::to_string(entry)?;
        writeln!(file, "{line}")?;
        file.sync_all()?;
        Ok(())
    }

    fn rotate_if_over_cap(&self) -> Result<(), DlqError> {
        let path = self.entries_path();
        let size = match std::fs::metadata(&path) {
            Ok(m) => m.len(),
            Err(_) => return Ok(()),
        };
        if size < self.max_bytes {
            return Ok(());
        }
        rotate_backups(&path, MAX_ROTATED_GENERATIONS)?;
        Ok(())
    }

    /// Read every entry currently on disk. Entries already removed by a
    /// prior compaction never reappear.
    pub fn load_all(&self) -> Result<Vec<DlqEntry>, DlqError> {
        let path = self.entries_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = std::fs::File::open(&path)?;
        let reader = BufReader::new(file);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(&line)?);
        }
        Ok(entries)
    }

    /// Entries eligible for reprocessing: older than `min_age` and under the
    /// retry cap. Dispatching reprocessed sub-batches is the dispatcher
    /// crate's job; this only surfaces candidates.
    pub fn reprocessable(
        &self,
        min_age: Duration,
        max_retries: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<DlqEntry>, DlqError> {
        let cutoff = now - min_age;
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|e| e.failure_time <= cutoff && e.retry_count < max_retries)
            .collect())
    }

    /// Rewrite the log, dropping entries whose id is in `resolved` and any
    /// older than `retention`.
    pub fn compact(
        &self,
        resolved: &HashSet<String>,
        retention: Duration,
        now: DateTime<Utc>,
    ) -> Result<usize, DlqError> {
        let cutoff = now - retention;
        let all = self.load_all()?;
        let before = all.len();
        let kept: Vec<_> = all
            .into_iter()
            .filter(|e| !resolved.contains(&e.entry_id) && e.failure_time >= cutoff)
            .collect();

        let mut buf = String::new();
        for entry in &kept {
            buf.push_str(&serde_json::to_string(entry)?);
            buf.push('\n');
        }
        write_atomic(&self.entries_path(), buf.as_bytes())?;

        Ok(before - kept.len())
    }

    /// Rewrite the log bumping `retry_count`/`last_attempt_time` on every
    /// entry whose id is in `attempted`. Used after a reprocessing pass so
    /// entries that keep failing eventually age out via `max_retries`.
    pub fn record_attempts(&self, attempted: &HashSet<String>, now: DateTime<Utc>) -> Result<(), DlqError> {
        if attempted.is_empty() {
            return Ok(());
        }
        let mut all = self.load_all()?;
        for entry in &mut all {
            if attempted.contains(&entry.entry_id) {
                entry.record_attempt(now);
            }
        }

        let mut buf = String::new();
        for entry in &all {
            buf.push_str(&serde_json::to_string(entry)?);
            buf.push('\n');
        }
        write_atomic(&self.entries_path(), buf.as_bytes())?;
        Ok(())
    }

    pub fn total_bytes(&self) -> u64 {
        std::fs::metadata(self.entries_path())
            .map(|m| m.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logcap_core::{Batch, FailureReason};

    fn entry(id: &str, failure_time: DateTime<Utc>) -> DlqEntry {
        DlqEntry::new(id, Batch::new(vec![]), FailureReason::SinkTimeout, "loki", failure_time)
    }

    #[test]
    fn append_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = DlqStore::new(dir.path().to_path_buf(), 1024 * 1024);
        let now = Utc::now();
        store.append(&entry("a", now)).unwrap();
        store.append(&entry("b", now)).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].entry_id, "a");
        assert_eq!(loaded[1].entry_id, "b");
    }

    #[test]
    fn reprocessable_filters_by_age_and_retry_count() {
        let dir = tempfile::tempdir().unwrap();
        let store = DlqStore::new(dir.path().to_path_buf(), 1024 * 1024);
        let now = Utc::now();
        store.append(&entry("old", now - Duration::minutes(10))).unwrap();
        store.append(&entry("new", now)).unwrap();

        let ready = store
            .reprocessable(Duration::minutes(2), 3, now)
            .unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].entry_id, "old");
    }

    #[test]
    fn compact_drops_resolved_and_expired_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = DlqStore::new(dir.path().to_path_buf(), 1024 * 1024);
        let now = Utc::now();
        store.append(&entry("resolved", now)).unwrap();
        store.append(&entry("expired", now - Duration::days(8))).unwrap();
        store.append(&entry("keep", now)).unwrap();

        let mut resolved = HashSet::new();
        resolved.insert("resolved".to_string());
        let removed = store.compact(&resolved, Duration::days(7), now).unwrap();

        assert_eq!(removed, 2);
        let remaining = store.load_all().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].entry_id, "keep");
    }

    #[test]
    fn record_attempts_bumps_retry_count_for_matching_ids_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = DlqStore::new(dir.path().to_path_buf(), 1024 * 1024);
        let now = Utc::now();
        store.append(&entry("retried", now)).unwrap();
        store.append(&entry("untouched", now)).unwrap();

        let mut attempted = HashSet::new();
        attempted.insert("retried".to_string());
        store.record_attempts(&attempted, now).unwrap();

        let all = store.load_all().unwrap();
        let retried = all.iter().find(|e| e.entry_id == "retried").unwrap();
        let untouched = all.iter().find(|e| e.entry_id == "untouched").unwrap();
        assert_eq!(retried.retry_count, 1);
        assert!(retried.last_attempt_time.is_some());
        assert_eq!(untouched.retry_count, 0);
    }

    #[test]
    fn record_attempts_eventually_exceeds_max_retries_and_drops_out_of_reprocessable() {
        let dir = tempfile::tempdir().unwrap();
        let store = DlqStore::new(dir.path().to_path_buf(), 1024 * 1024);
        let now = Utc::now();
        store.append(&entry("flaky", now - Duration::minutes(10))).unwrap();

        let mut attempted = HashSet::new();
        attempted.insert("flaky".to_string());
        for _ in 0..3 {
            store.record_attempts(&attempted, now).unwrap();
        }

        let ready = store.reprocessable(Duration::minutes(2), 3, now).unwrap();
        assert!(ready.is_empty());
    }
}
