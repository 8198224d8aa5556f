// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::counter::Counter;
use crate::health::{
    HealthSnapshot, DLQ_GROWTH_WARNING_PER_MIN, QUEUE_UTILIZATION_SUSTAIN_SECS,
    QUEUE_UTILIZATION_WARNING, SINK_ERROR_RATE_SUSTAIN_SECS, SINK_ERROR_RATE_WARNING,
};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Bound on how long sink/DLQ event windows are kept; both degraded checks
/// look at most two minutes back, so three is a comfortable margin.
const EVENT_WINDOW: Duration = Duration::minutes(3);

struct Windows {
    sink_events: VecDeque<(DateTime<Utc>, bool)>,
    dlq_events: VecDeque<DateTime<Utc>>,
    queue_over_warning_since: Option<DateTime<Utc>>,
    sink_error_over_warning_since: Option<DateTime<Utc>>,
}

impl Windows {
    fn new() -> Self {
        Self {
            sink_events: VecDeque::new(),
            dlq_events: VecDeque::new(),
            queue_over_warning_since: None,
            sink_error_over_warning_since: None,
        }
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - EVENT_WINDOW;
        while self.sink_events.front().is_some_and(|(t, _)| *t < cutoff) {
            self.sink_events.pop_front();
        }
        while self.dlq_events.front().is_some_and(|t| *t < cutoff) {
            self.dlq_events.pop_front();
        }
    }
}

/// Shared counters and windowed state backing the agent's health summary.
///
/// Cheap to clone: wrap in `Arc` once at startup and hand clones to every
/// task that needs to record an event.
pub struct Registry {
    pub records_ingested: Counter,
    pub records_dispatched: Counter,
    pub records_deduped: Counter,
    pub records_dropped: Counter,
    pub sink_success: Counter,
    pub sink_failure: Counter,
    pub dlq_writes: Counter,
    /// Records whose timestamp was clamped to the learned acceptable-age
    /// floor before being sent to a sink (spec §4.5 adaptive clamping).
    pub timestamp_clamped: Counter,
    queue_depth: AtomicUsize,
    queue_capacity: usize,
    active_tasks: AtomicUsize,
    expected_tasks: AtomicUsize,
    corrupt_position_recovery: AtomicBool,
    start_time: DateTime<Utc>,
    windows: Mutex<Windows>,
}

impl Registry {
    pub fn new(queue_capacity: usize, start_time: DateTime<Utc>) -> Self {
        Self {
            records_ingested: Counter::new(),
            records_dispatched: Counter::new(),
            records_deduped: Counter::new(),
            records_dropped: Counter::new(),
            sink_success: Counter::new(),
            sink_failure: Counter::new(),
            dlq_writes: Counter::new(),
            timestamp_clamped: Counter::new(),
            queue_depth: AtomicUsize::new(0),
            queue_capacity,
            active_tasks: AtomicUsize::new(0),
            expected_tasks: AtomicUsize::new(0),
            corrupt_position_recovery: AtomicBool::new(false),
            start_time,
            windows: Mutex::new(Windows::new()),
        }
    }

    pub fn set_queue_depth(&self, depth: usize) {
        self.queue_depth.store(depth, Ordering::Relaxed);
    }

    pub fn queue_depth(&self) -> usize {
        self.queue_depth.load(Ordering::Relaxed)
    }

    pub fn set_task_counts(&self, active: usize, expected: usize) {
        self.active_tasks.store(active, Ordering::Relaxed);
        self.expected_tasks.store(expected, Ordering::Relaxed);
    }

    pub fn mark_corrupt_position_recovery(&self) {
        self.corrupt_position_recovery.store(true, Ordering::Relaxed);
    }

    pub fn record_sink_result(&self, success: bool, now: DateTime<Utc>) {
        if success {
            self.sink_success.incr();
        } else {
            self.sink_failure.incr();
        }
        let mut windows = self.windows.lock();
        windows.sink_events.push_back((now, success));
        windows.prune(now);
    }

    pub fn record_dlq_write(&self, now: DateTime<Utc>) {
        self.dlq_writes.incr();
        let mut windows = self.windows.lock();
        windows.dlq_events.push_back(now);
        windows.prune(now);
    }

    /// Compute the current health snapshot, updating sustained-threshold
    /// bookkeeping as a side effect.
    pub fn health_snapshot(&self, now: DateTime<Utc>) -> HealthSnapshot {
        let queue_depth = self.queue_depth();
        let queue_utilization = if self.queue_capacity == 0 {
            0.0
        } else {
            queue_depth as f64 / self.queue_capacity as f64
        };

        let mut windows = self.windows.lock();
        windows.prune(now);

        let (failures, total) = windows
            .sink_events
            .iter()
            .fold((0u64, 0u64), |(f, t), (_, success)| {
                (f + u64::from(!success), t + 1)
            });
        let sink_error_rate = if total == 0 {
            0.0
        } else {
            failures as f64 / total as f64
        };

        let one_minute_ago = now - Duration::minutes(1);
        let dlq_growth_per_min = windows
            .dlq_events
            .iter()
            .filter(|t| **t >= one_minute_ago)
            .count() as f64;

        let mut reasons = Vec::new();

        if queue_utilization > QUEUE_UTILIZATION_WARNING {
            let since = *windows.queue_over_warning_since.get_or_insert(now);
            if now - since >= Duration::seconds(QUEUE_UTILIZATION_SUSTAIN_SECS) {
                reasons.push(format!(
                    "queue utilization {queue_utilization:.2} above {QUEUE_UTILIZATION_WARNING:.2} for over {QUEUE_UTILIZATION_SUSTAIN_SECS}s"
                ));
            }
        } else {
            windows.queue_over_warning_since = None;
        }

        if sink_error_rate > SINK_ERROR_RATE_WARNING {
            let since = *windows.sink_error_over_warning_since.get_or_insert(now);
            if now - since >= Duration::seconds(SINK_ERROR_RATE_SUSTAIN_SECS) {
                reasons.push(format!(
                    "sink error rate {sink_error_rate:.2} above {SINK_ERROR_RATE_WARNING:.2} for over {SINK_ERROR_RATE_SUSTAIN_SECS}s"
                ));
            }
        } else {
            windows.sink_error_over_warning_since = None;
        }

        if dlq_growth_per_min > DLQ_GROWTH_WARNING_PER_MIN {
            reasons.push(format!(
                "dlq growth {dlq_growth_per_min:.0}/min above {DLQ_GROWTH_WARNING_PER_MIN:.0}/min"
            ));
        }

        let corrupt_position_recovery_since_start =
            self.corrupt_position_recovery.load(Ordering::Relaxed);
        if corrupt_position_recovery_since_start {
            reasons.push("position state recovered from a corrupt checkpoint".to_string());
        }

        let active = self.active_tasks.load(Ordering::Relaxed) as i64;
        let expected = self.expected_tasks.load(Ordering::Relaxed) as i64;
        let task_drift = expected - active;
        if task_drift > 0 {
            reasons.push(format!("{task_drift} expected task(s) not running"));
        }

        HealthSnapshot {
            queue_depth,
            queue_capacity: self.queue_capacity,
            queue_utilization,
            sink_error_rate,
            dlq_growth_per_min,
            records_ingested: self.records_ingested.get(),
            records_dispatched: self.records_dispatched.get(),
            records_deduped: self.records_deduped.get(),
            records_dropped: self.records_dropped.get(),
            dlq_total_writes: self.dlq_writes.get(),
            corrupt_position_recovery_since_start,
            task_drift,
            uptime_secs: (now - self.start_time).num_seconds(),
            degraded: !reasons.is_empty(),
            degraded_reasons: reasons,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
            + Duration::seconds(secs)
    }

    #[test]
    fn healthy_by_default() {
        let registry = Registry::new(100, at(0));
        let snapshot = registry.health_snapshot(at(0));
        assert!(!snapshot.degraded);
        assert!(snapshot.degraded_reasons.is_empty());
    }

    #[test]
    fn queue_pressure_only_degrades_after_sustain_window() {
        let registry = Registry::new(100, at(0));
        registry.set_queue_depth(90);
        assert!(!registry.health_snapshot(at(0)).degraded);
        assert!(!registry.health_snapshot(at(30)).degraded);
        assert!(registry.health_snapshot(at(61)).degraded);
    }

    #[test]
    fn queue_pressure_resets_once_it_drops() {
        let registry = Registry::new(100, at(0));
        registry.set_queue_depth(90);
        registry.health_snapshot(at(0));
        registry.set_queue_depth(10);
        registry.health_snapshot(at(30));
        registry.set_queue_depth(90);
        assert!(!registry.health_snapshot(at(61)).degraded);
    }

    #[test]
    fn sink_error_rate_degrades_after_sustain_window() {
        let registry = Registry::new(100, at(0));
        for i in 0..10 {
            registry.record_sink_result(i < 8, at(0));
        }
        assert!(!registry.health_snapshot(at(0)).degraded);
        assert!(registry.health_snapshot(at(121)).degraded);
    }

    #[test]
    fn dlq_growth_degrades_immediately_past_threshold() {
        let registry = Registry::new(100, at(0));
        for i in 0..150 {
            registry.record_dlq_write(at(i % 50));
        }
        let snapshot = registry.health_snapshot(at(55));
        assert!(snapshot.degraded);
        assert!(snapshot.dlq_growth_per_min > DLQ_GROWTH_WARNING_PER_MIN);
    }

    #[test]
    fn corrupt_position_recovery_flag_sticks() {
        let registry = Registry::new(100, at(0));
        registry.mark_corrupt_position_recovery();
        let snapshot = registry.health_snapshot(at(0));
        assert!(snapshot.corrupt_position_recovery_since_start);
        assert!(snapshot.degraded);
    }

    #[test]
    fn task_drift_reports_missing_tasks() {
        let registry = Registry::new(100, at(0));
        registry.set_task_counts(3, 5);
        let snapshot = registry.health_snapshot(at(0));
        assert_eq!(snapshot.task_drift, 2);
        assert!(snapshot.degraded);
    }
}
