// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Batch`: an ordered group of records handed atomically to one sink (spec §3).

use crate::record::Record;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An ordered sequence of records destined for one sink.
///
/// Invariant: every record's timestamp falls within `[min, max]` as computed
/// by [`Batch::new`]; callers must not mutate `records` after construction
/// without recomputing the window via [`Batch::window`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub records: Vec<Record>,
}

impl Batch {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// `[min, max]` timestamp window spanned by this batch, or `None` if empty.
    pub fn window(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let mut iter = self.records.iter().map(|r| r.timestamp);
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(min, max), ts| {
            (min.min(ts), max.max(ts))
        });
        Some((min, max))
    }

    /// Approximate serialized size in bytes (sum of per-record approximations).
    pub fn approx_size(&self) -> usize {
        self.records.iter().map(Record::approx_size).sum()
    }

    /// Split into chunks whose approximate size each stay under `max_bytes`.
    ///
    /// Used by sinks to satisfy a `max_request_size` bound (spec §4.5). A
    /// single record larger than `max_bytes` still forms its own
    /// single-record batch rather than being dropped.
    pub fn split_by_size(self, max_bytes: usize) -> Vec<Batch> {
        let mut out = Vec::new();
        let mut current = Vec::new();
        let mut current_size = 0usize;

        for record in self.records {
            let size = record.approx_size();
            if !current.is_empty() && current_size + size > max_bytes {
                out.push(Batch::new(std::mem::take(&mut current)));
                current_size = 0;
            }
            current_size += size;
            current.push(record);
        }
        if !current.is_empty() {
            out.push(Batch::new(current));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Labels, SourceId, SourceType, StreamKind, TraceId};

    fn record(ts: &str, message: &str) -> Record {
        Record::new(
            TraceId::new("t"),
            DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc),
            SourceType::File,
            SourceId::new("/var/log/app.log"),
            message,
            Labels::new(),
            StreamKind::Unknown,
        )
    }

    #[test]
    fn window_spans_min_max() {
        let batch = Batch::new(vec![
            record("2026-01-01T00:00:05Z", "b"),
            record("2026-01-01T00:00:00Z", "a"),
            record("2026-01-01T00:00:10Z", "c"),
        ]);
        let (min, max) = batch.window().unwrap();
        assert_eq!(min, DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap());
        assert_eq!(max, DateTime::parse_from_rfc3339("2026-01-01T00:00:10Z").unwrap());
    }

    #[test]
    fn empty_batch_has_no_window() {
        assert!(Batch::new(vec![]).window().is_none());
    }

    #[test]
    fn split_by_size_respects_bound() {
        let long_message = "x".repeat(100);
        let batch = Batch::new(vec![
            record("2026-01-01T00:00:00Z", &long_message),
            record("2026-01-01T00:00:01Z", &long_message),
            record("2026-01-01T00:00:02Z", &long_message),
        ]);
        let per_record = batch.records[0].approx_size();
        let chunks = batch.split_by_size(per_record * 2 - 1);
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(!chunk.is_empty());
        }
        let total: usize = chunks.iter().map(Batch::len).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn split_by_size_keeps_oversized_single_record_alone() {
        let huge = "x".repeat(1000);
        let batch = Batch::new(vec![record("2026-01-01T00:00:00Z", &huge)]);
        let chunks = batch.split_by_size(10);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 1);
    }
}
