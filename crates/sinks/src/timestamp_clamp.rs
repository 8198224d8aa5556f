// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Loki rejects entries older than its configured retention window, and
//! rejects entries timestamped too far in the future. Clamp (or drop)
//! records outside the acceptable window before they're sent, and learn a
//! tighter backward window when the store keeps rejecting us.

use chrono::{DateTime, Duration, Utc};
use logcap_core::Record;
use parking_lot::RwLock;

/// Never narrow the learned window past this; a target that rejects
/// everything within a minute of "now" is misconfigured, not transiently busy.
fn learned_age_floor() -> Duration {
    Duration::minutes(1)
}

/// Timestamps more than this far ahead of "now" are treated as clock skew
/// rather than legitimate future data and clamped back to "now".
fn max_future_skew() -> Duration {
    Duration::seconds(5)
}

/// A per-sink learned acceptable-age window (spec §4.5 adaptive clamping).
///
/// Starts at the configured `max_acceptable_age` and is halved, down to a
/// floor, each time the target rejects a batch for being too old. The
/// learned value only ever shrinks for the lifetime of the sink; an
/// operator restart is what resets it.
pub struct TimestampLearner {
    max_age: RwLock<Duration>,
}

impl TimestampLearner {
    pub fn new(initial: Duration) -> Self {
        Self {
            max_age: RwLock::new(initial),
        }
    }

    pub fn current_max_age(&self) -> Duration {
        *self.max_age.read()
    }

    /// Halve the learned window toward the floor, returning the new value.
    pub fn narrow(&self) -> Duration {
        let mut guard = self.max_age.write();
        let narrowed = (*guard / 2).max(learned_age_floor());
        *guard = narrowed;
        narrowed
    }
}

/// Clamp (or drop) records older than `max_acceptable_age`. Returns the
/// surviving records, the count dropped, and the count clamped.
pub fn enforce_max_age(
    records: Vec<Record>,
    max_acceptable_age: Duration,
    drop_instead_of_clamp: bool,
    now: DateTime<Utc>,
) -> (Vec<Record>, usize, usize) {
    let floor = now - max_acceptable_age;
    let mut dropped = 0;
    let mut clamped = 0;
    let mut out = Vec::with_capacity(records.len());

    for mut record in records {
        if record.timestamp < floor {
            if drop_instead_of_clamp {
                dropped += 1;
                continue;
            }
            record.timestamp = floor;
            clamped += 1;
        }
        out.push(record);
    }
    (out, dropped, clamped)
}

/// Clamp records timestamped further ahead of `now` than the allowed skew
/// back down to `now`. Used on the retry after a "timestamp too new"
/// rejection; a misconfigured non-UTC clock is the expected cause, and
/// ingest-side UTC enforcement should prevent recurrence.
pub fn clamp_future_skew(records: Vec<Record>, now: DateTime<Utc>) -> (Vec<Record>, usize) {
    let ceiling = now + max_future_skew();
    let mut clamped = 0;
    let out = records
        .into_iter()
        .map(|mut record| {
            if record.timestamp > ceiling {
                record.timestamp = now;
                clamped += 1;
            }
            record
        })
        .collect();
    (out, clamped)
}
