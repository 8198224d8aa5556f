// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thresholds and snapshot shape for the degraded-health predicate.

use serde::{Deserialize, Serialize};

/// Queue utilization above which the agent is considered under pressure.
pub const QUEUE_UTILIZATION_WARNING: f64 = 0.85;
/// How long queue utilization must stay above [`QUEUE_UTILIZATION_WARNING`]
/// before it counts toward `degraded`.
pub const QUEUE_UTILIZATION_SUSTAIN_SECS: i64 = 60;

/// Sink error rate (failures / (failures + successes)) considered unhealthy.
pub const SINK_ERROR_RATE_WARNING: f64 = 0.10;
/// How long the elevated sink error rate must persist before it counts.
pub const SINK_ERROR_RATE_SUSTAIN_SECS: i64 = 120;

/// DLQ writes per minute considered a runaway failure mode.
pub const DLQ_GROWTH_WARNING_PER_MIN: f64 = 100.0;

/// A point-in-time health summary, computed on demand from [`crate::Registry`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub queue_depth: usize,
    pub queue_capacity: usize,
    pub queue_utilization: f64,
    pub sink_error_rate: f64,
    pub dlq_growth_per_min: f64,
    pub records_ingested: u64,
    pub records_dispatched: u64,
    pub records_deduped: u64,
    pub records_dropped: u64,
    pub dlq_total_writes: u64,
    pub corrupt_position_recovery_since_start: bool,
    /// `expected_tasks - active_tasks`; positive means tasks are missing.
    pub task_drift: i64,
    pub uptime_secs: i64,
    pub degraded: bool,
    pub degraded_reasons: Vec<String>,
}
