// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker loop: pull records off the shared queue, batch them, fan the
//! batch out to every configured sink, and route exhausted failures to the
//! DLQ.

use crate::processing_stage::{apply_stages, ProcessingStage};
use crate::retry::BackoffConfig;
use chrono::Utc;
use logcap_core::{Batch, Clock, DlqEntry, FailureReason, Record, Sink, SinkError};
use logcap_metrics::Registry;
use logcap_storage::DlqStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

pub struct WorkerConfig {
    pub batch_size: usize,
    pub batch_timeout: Duration,
    pub retry_max_attempts: u32,
    pub backoff: BackoffConfig,
}

pub struct WorkerHandles {
    pub sinks: Arc<Vec<Arc<dyn Sink>>>,
    pub stages: Arc<Vec<Box<dyn ProcessingStage>>>,
    pub retry_semaphore: Arc<Semaphore>,
    pub dlq: Arc<DlqStore>,
    pub metrics: Arc<Registry>,
    pub clock: Arc<dyn Clock>,
}

pub async fn run(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<Record>>>,
    config: WorkerConfig,
    handles: WorkerHandles,
    cancel: CancellationToken,
) {
    loop {
        let batch_records = collect_batch(&receiver, &config, &handles.stages, &cancel).await;
        let Some(records) = batch_records else {
            debug!(worker_id, "queue closed, worker exiting");
            return;
        };
        if records.is_empty() {
            if cancel.is_cancelled() {
                return;
            }
            continue;
        }

        let batch = Batch::new(records);
        for sink in handles.sinks.iter() {
            deliver_with_retry(Arc::clone(sink), batch.clone(), &config, &handles).await;
        }

        if cancel.is_cancelled() {
            return;
        }
    }
}

async fn collect_batch(
    receiver: &Mutex<mpsc::Receiver<Record>>,
    config: &WorkerConfig,
    stages: &[Box<dyn ProcessingStage>],
    cancel: &CancellationToken,
) -> Option<Vec<Record>> {
    let mut records = Vec::new();
    let deadline = Instant::now() + config.batch_timeout;

    loop {
        if records.len() >= config.batch_size {
            return Some(records);
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Some(records);
        }

        let mut rx = receiver.lock().await;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return if records.is_empty() { None } else { Some(records) };
            }
            res = tokio::time::timeout(remaining, rx.recv()) => {
                drop(rx);
                match res {
                    Ok(Some(record)) => {
                        if let Some(r) = apply_stages(stages, record) {
                            records.push(r);
                        }
                    }
                    Ok(None) => {
                        return if records.is_empty() { None } else { Some(records) };
                    }
                    Err(_elapsed) => {
                        return Some(records);
                    }
                }
            }
        }
    }
}

async fn deliver_with_retry(
    sink: Arc<dyn Sink>,
    batch: Batch,
    config: &WorkerConfig,
    handles: &WorkerHandles,
) {
    let mut attempt: u32 = 0;
    loop {
        let now = handles.clock.now();
        match sink.send(batch.clone()).await {
            Ok(()) => {
                handles.metrics.record_sink_result(true, now);
                handles
                    .metrics
                    .records_dispatched
                    .add(batch.len() as u64);
                return;
            }
            Err(err) => {
                handles.metrics.record_sink_result(false, now);
                attempt += 1;

                let terminal = matches!(err, SinkError::Auth(_)) || attempt > config.retry_max_attempts;
                if terminal {
                    dead_letter(sink.name(), batch, classify(&err), handles, now).await;
                    return;
                }

                let permit = match Arc::clone(&handles.retry_semaphore).try_acquire_owned() {
                    Ok(permit) => permit,
                    Err(_) => {
                        warn!(sink = sink.name(), "retry semaphore saturated, dead-lettering");
                        dead_letter(sink.name(), batch, FailureReason::RetryQueueFull, handles, now)
                            .await;
                        return;
                    }
                };

                let delay = config.backoff.delay_for(attempt);
                tokio::time::sleep(delay).await;
                drop(permit);
            }
        }
    }
}

fn classify(err: &SinkError) -> FailureReason {
    match err {
        SinkError::Timeout(_) => FailureReason::SinkTimeout,
        SinkError::Rejected(_) => FailureReason::SinkRejected,
        SinkError::TimestampWindow(_) => FailureReason::TimestampRejected,
        SinkError::Network(_) => FailureReason::NetworkError,
        SinkError::Auth(_) => FailureReason::AuthError,
        SinkError::Io(_) => FailureReason::SinkIo,
    }
}

async fn dead_letter(
    sink_name: &str,
    batch: Batch,
    reason: FailureReason,
    handles: &WorkerHandles,
    now: chrono::DateTime<Utc>,
) {
    let entry = DlqEntry::new(Uuid::new_v4().to_string(), batch, reason, sink_name, now);
    if let Err(e) = handles.dlq.append(&entry) {
        warn!(error = %e, sink = sink_name, "failed to write dlq entry, batch lost");
        return;
    }
    handles.metrics.record_dlq_write(now);
}
