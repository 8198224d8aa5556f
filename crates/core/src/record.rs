// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Record`: the unit flowing through the ingest -> dispatch -> sink pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

define_id! {
    /// Opaque trace id assigned at ingest, carried through dispatch and into DLQ entries.
    pub struct TraceId;
}

define_id! {
    /// Container id short-hash, or absolute file path — identifies the record's source.
    pub struct SourceId;
}

/// Small string->string mapping. `BTreeMap` keeps serialized label sets in a
/// stable order, which matters for grouping records into Loki streams by
/// identical label set (spec §4.5).
pub type Labels = BTreeMap<String, String>;

/// Which live source produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Container,
    File,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::Container => write!(f, "container"),
            SourceType::File => write!(f, "file"),
        }
    }
}

/// Which stream a container log line arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Stdout,
    Stderr,
    Unknown,
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamKind::Stdout => write!(f, "stdout"),
            StreamKind::Stderr => write!(f, "stderr"),
            StreamKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// A single normalized log line, ready for the dispatcher.
///
/// Invariant: `timestamp` is always UTC (§3) — `Record::new` takes a
/// `DateTime<Utc>` so the invariant is enforced by the type, not by
/// convention. Invariant: `message` never contains a trailing newline; the
/// ingestors strip it before constructing the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub trace_id: TraceId,
    pub timestamp: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub source_type: SourceType,
    pub source_id: SourceId,
    pub message: String,
    pub labels: Labels,
    pub stream_kind: StreamKind,
}

impl Record {
    /// Build a new record. `message` is stripped of a single trailing `\n`
    /// (and `\r\n`) if present, so callers don't need to pre-trim.
    pub fn new(
        trace_id: TraceId,
        timestamp: DateTime<Utc>,
        source_type: SourceType,
        source_id: SourceId,
        message: impl Into<String>,
        labels: Labels,
        stream_kind: StreamKind,
    ) -> Self {
        let mut message = message.into();
        if message.ends_with('\n') {
            message.pop();
            if message.ends_with('\r') {
                message.pop();
            }
        }
        Self {
            trace_id,
            timestamp,
            processed_at: None,
            source_type,
            source_id,
            message,
            labels,
            stream_kind,
        }
    }

    /// Mark the record as processed at `now` (set by the dispatcher, §3).
    pub fn mark_processed(&mut self, now: DateTime<Utc>) {
        self.processed_at = Some(now);
    }

    /// Approximate serialized size in bytes, used by sinks to bound batch
    /// payload size against `max_request_size` (§4.5).
    pub fn approx_size(&self) -> usize {
        self.message.len()
            + self
                .labels
                .iter()
                .map(|(k, v)| k.len() + v.len())
                .sum::<usize>()
            + self.source_id.as_str().len()
            + 64 // fixed overhead: timestamps, JSON punctuation, trace id
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
    fn strips_trailing_newline() {
        let r = Record::new(
            TraceId::new("t1"),
            ts(),
            SourceType::File,
            SourceId::new("/var/log/app.log"),
            "hello world\n",
            Labels::new(),
            StreamKind::Unknown,
        );
        assert_eq!(r.message, "hello world");
    }

    #[test]
    fn strips_crlf() {
        let r = Record::new(
            TraceId::new("t1"),
            ts(),
            SourceType::File,
            SourceId::new("/var/log/app.log"),
            "hello\r\n",
            Labels::new(),
            StreamKind::Unknown,
        );
        assert_eq!(r.message, "hello");
    }

    #[test]
    fn leaves_message_without_newline_untouched() {
        let r = Record::new(
            TraceId::new("t1"),
            ts(),
            SourceType::Container,
            SourceId::new("abc123"),
            "no newline here",
            Labels::new(),
            StreamKind::Stdout,
        );
        assert_eq!(r.message, "no newline here");
    }

    #[test]
    fn processed_at_starts_unset() {
        let r = Record::new(
            TraceId::new("t1"),
            ts(),
            SourceType::Container,
            SourceId::new("abc123"),
            "line",
            Labels::new(),
            StreamKind::Stdout,
        );
        assert!(r.processed_at.is_none());
        let mut r = r;
        r.mark_processed(ts());
        assert_eq!(r.processed_at, Some(ts()));
    }
}
