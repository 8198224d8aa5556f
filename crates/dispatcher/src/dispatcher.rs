// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::backpressure::{Thresholds, Zone};
use crate::dedup::DedupCache;
use crate::error::DispatchError;
use crate::processing_stage::ProcessingStage;
use crate::retry::BackoffConfig;
use crate::worker::{self, WorkerConfig, WorkerHandles};
use chrono::Duration as ChronoDuration;
use logcap_core::{Batch, Clock, DlqEntry, FailureReason, Record, Sink, SourceType};
use logcap_metrics::Registry;
use logcap_storage::DlqStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Plain settings the dispatcher needs, independent of the on-disk config
/// schema — `logcap-daemon` maps `logcap_config::DispatcherConfig` into this.
pub struct Settings {
    pub queue_capacity: usize,
    pub worker_count: usize,
    pub batch_size: usize,
    pub batch_timeout: Duration,
    pub backoff: BackoffConfig,
    pub retry_max_attempts: u32,
    pub retry_semaphore: usize,
    pub dedup_enabled: bool,
    pub dedup_include_source_id: bool,
    pub dedup_include_timestamp: bool,
    pub dedup_cache_capacity: usize,
    pub dedup_ttl: ChronoDuration,
    pub backpressure: Thresholds,
}

pub struct Dispatcher {
    sender: mpsc::Sender<Record>,
    capacity: usize,
    thresholds: Thresholds,
    dedup: Option<DedupCache>,
    dlq: Arc<DlqStore>,
    metrics: Arc<Registry>,
    clock: Arc<dyn Clock>,
}

impl Dispatcher {
    /// Build the dispatcher and spawn its worker pool. Workers keep running
    /// until `cancel` fires and the queue drains.
    pub fn spawn(
        settings: Settings,
        sinks: Vec<Arc<dyn Sink>>,
        stages: Vec<Box<dyn ProcessingStage>>,
        dlq: Arc<DlqStore>,
        metrics: Arc<Registry>,
        clock: Arc<dyn Clock>,
        cancel: CancellationToken,
    ) -> Arc<Dispatcher> {
        let (sender, receiver) = mpsc::channel(settings.queue_capacity);
        let receiver = Arc::new(Mutex::new(receiver));
        let sinks = Arc::new(sinks);
        let stages = Arc::new(stages);
        let retry_semaphore = Arc::new(Semaphore::new(settings.retry_semaphore));

        let dedup = settings.dedup_enabled.then(|| {
            DedupCache::new(
                settings.dedup_ttl,
                settings.dedup_cache_capacity,
                settings.dedup_include_source_id,
                settings.dedup_include_timestamp,
            )
        });

        let dispatcher = Arc::new(Dispatcher {
            sender,
            capacity: settings.queue_capacity,
            thresholds: settings.backpressure,
            dedup,
            dlq: Arc::clone(&dlq),
            metrics: Arc::clone(&metrics),
            clock: Arc::clone(&clock),
        });

        for worker_id in 0..settings.worker_count.max(1) {
            let receiver = Arc::clone(&receiver);
            let worker_config = WorkerConfig {
                batch_size: settings.batch_size,
                batch_timeout: settings.batch_timeout,
                retry_max_attempts: settings.retry_max_attempts,
                backoff: settings.backoff,
            };
            let handles = WorkerHandles {
                sinks: Arc::clone(&sinks),
                stages: Arc::clone(&stages),
                retry_semaphore: Arc::clone(&retry_semaphore),
                dlq: Arc::clone(&dlq),
                metrics: Arc::clone(&metrics),
                clock: Arc::clone(&clock),
            };
            let cancel = cancel.clone();
            tokio::spawn(async move {
                worker::run(worker_id, receiver, worker_config, handles, cancel).await;
            });
        }

        dispatcher
    }

    /// Enqueue a record for dispatch. May reject, shed, or dead-letter the
    /// record depending on current queue pressure (spec §4.4).
    pub async fn enqueue(&self, record: Record) -> Result<(), DispatchError> {
        let now = self.clock.now();

        if let Some(dedup) = &self.dedup {
            if dedup.check_and_insert(&record, now) {
                self.metrics.records_deduped.incr();
                return Ok(());
            }
        }

        let depth = self.capacity.saturating_sub(self.sender.capacity());
        let utilization = depth as f64 / self.capacity.max(1) as f64;
        self.metrics.set_queue_depth(depth);

        match self.thresholds.classify(utilization) {
            Zone::Emergency => {
                self.dead_letter(record, FailureReason::QueueEmergency, now)
                    .await?;
                return Ok(());
            }
            Zone::Critical if sheds_in_critical_zone(record.source_type) => {
                self.metrics.records_dropped.incr();
                return Ok(());
            }
            _ => {}
        }

        self.metrics.records_ingested.incr();
        match self.sender.try_send(record) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(record)) => {
                self.dead_letter(record, FailureReason::QueueEmergency, now)
                    .await
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(DispatchError::QueueClosed),
        }
    }

    async fn dead_letter(
        &self,
        record: Record,
        reason: FailureReason,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), DispatchError> {
        let entry = DlqEntry::new(
            Uuid::new_v4().to_string(),
            Batch::new(vec![record]),
            reason,
            "dispatcher",
            now,
        );
        self.dlq.append(&entry)?;
        self.metrics.record_dlq_write(now);
        Ok(())
    }

    pub fn queue_capacity(&self) -> usize {
        self.capacity
    }
}

/// Under critical (but sub-emergency) queue pressure, only low-priority
/// sources are shed — informational file tailing, not container stdout/stderr.
fn sheds_in_critical_zone(source_type: SourceType) -> bool {
    source_type == SourceType::File
}
