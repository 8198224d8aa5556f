// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `DlqEntry`: a failed batch parked for operator inspection or reprocessing (spec §3, §4.6).

use crate::batch::Batch;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a batch ended up in the dead letter queue (spec §4.4 failure taxonomy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Sink timed out and retries were exhausted.
    SinkTimeout,
    /// Sink rejected the batch with a non-auth 4xx.
    SinkRejected,
    /// Sink rejected the batch's timestamp window even after the one
    /// learning-triggered retry the dispatcher grants it.
    TimestampRejected,
    /// Network error to the sink, retries exhausted.
    NetworkError,
    /// Sink returned an authentication/authorization failure (terminal).
    AuthError,
    /// Dispatcher queue was at or above the emergency threshold.
    QueueEmergency,
    /// The retry semaphore was saturated.
    RetryQueueFull,
    /// Local file sink I/O error.
    SinkIo,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureReason::SinkTimeout => "sink_timeout",
            FailureReason::SinkRejected => "sink_rejected",
            FailureReason::TimestampRejected => "timestamp_rejected",
            FailureReason::NetworkError => "network_error",
            FailureReason::AuthError => "auth_error",
            FailureReason::QueueEmergency => "queue_emergency",
            FailureReason::RetryQueueFull => "retry_queue_full",
            FailureReason::SinkIo => "sink_io",
        };
        write!(f, "{s}")
    }
}

/// A batch the pipeline failed to deliver, staged on disk for operator
/// inspection or background reprocessing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqEntry {
    pub entry_id: String,
    pub original_batch: Batch,
    pub failure_reason: FailureReason,
    pub failure_time: DateTime<Utc>,
    pub retry_count: u32,
    pub sink_name: String,
    pub last_attempt_time: Option<DateTime<Utc>>,
}

impl DlqEntry {
    pub fn new(
        entry_id: impl Into<String>,
        original_batch: Batch,
        failure_reason: FailureReason,
        sink_name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            entry_id: entry_id.into(),
            original_batch,
            failure_reason,
            failure_time: now,
            retry_count: 0,
            sink_name: sink_name.into(),
            last_attempt_time: None,
        }
    }

    pub fn record_attempt(&mut self, now: DateTime<Utc>) {
        self.retry_count += 1;
        self.last_attempt_time = Some(now);
    }
}
