// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenario coverage against fakes: no live Docker socket or Loki
//! server, but the dispatcher, dedup cache, position store, and DLQ are
//! exercised exactly as `logcap-daemon` wires them together.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use logcap_core::{
    Batch, Clock, FakeClock, Labels, Record, Sink, SinkError, SourceId, SourceType, StreamKind, TraceId,
};
use logcap_dispatcher::{BackoffConfig, Dispatcher, Settings, Thresholds};
use logcap_metrics::Registry;
use logcap_storage::{DlqStore, PositionStore};
use parking_lot::Mutex as StdMutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

struct RecordingSink {
    delivered: Arc<StdMutex<Vec<Batch>>>,
}

#[async_trait]
impl Sink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }
    async fn send(&self, batch: Batch) -> Result<(), SinkError> {
        self.delivered.lock().push(batch);
        Ok(())
    }
}

/// Fails the first `fail_for` sends, then succeeds, modeling a Loki outage
/// that recovers (spec §8 scenario 3).
struct FlakySink {
    remaining_failures: AtomicUsize,
    delivered: Arc<StdMutex<Vec<Batch>>>,
}

#[async_trait]
impl Sink for FlakySink {
    fn name(&self) -> &str {
        "flaky-loki"
    }
    async fn send(&self, batch: Batch) -> Result<(), SinkError> {
        if self.remaining_failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
            if n > 0 {
                Some(n - 1)
            } else {
                None
            }
        }).is_ok()
        {
            return Err(SinkError::Network("loki unavailable".to_string()));
        }
        self.delivered.lock().push(batch);
        Ok(())
    }
}

fn record_for(source: &str, seq: u32, now: DateTime<Utc>) -> Record {
    Record::new(
        TraceId::new(format!("t-{source}-{seq}")),
        now,
        SourceType::Container,
        SourceId::new(source),
        format!("line {seq}"),
        Labels::new(),
        StreamKind::Stdout,
    )
}

fn settings(queue_capacity: usize) -> Settings {
    Settings {
        queue_capacity,
        worker_count: 2,
        batch_size: 10,
        batch_timeout: Duration::from_millis(20),
        backoff: BackoffConfig {
            base: Duration::from_millis(5),
            multiplier: 2,
            cap: Duration::from_millis(50),
        },
        retry_max_attempts: 3,
        retry_semaphore: 4,
        dedup_enabled: false,
        dedup_include_source_id: true,
        dedup_include_timestamp: false,
        dedup_cache_capacity: 1024,
        dedup_ttl: ChronoDuration::seconds(30),
        backpressure: Thresholds {
            warning: 0.7,
            critical: 0.85,
            emergency: 0.95,
        },
    }
}

async fn drain_until(delivered: &Arc<StdMutex<Vec<Batch>>>, expected: usize) {
    for _ in 0..200 {
        let count: usize = delivered.lock().iter().map(Batch::len).sum();
        if count >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {expected} records to reach the sink");
}

/// Scenario 1: happy path. Three sources emit 100 records each; all reach
/// the sink in per-source order and zero DLQ entries are written.
#[tokio::test]
async fn happy_path_three_sources_preserve_order_and_produce_no_dlq_entries() {
    let dir = tempfile::tempdir().unwrap();
    let dlq = Arc::new(DlqStore::new(dir.path().to_path_buf(), 1024 * 1024));
    let registry = Arc::new(Registry::new(100, Utc::now()));
    let clock: Arc<dyn Clock> = Arc::new(FakeClock::new(Utc::now()));
    let delivered = Arc::new(StdMutex::new(Vec::new()));
    let sink: Arc<dyn Sink> = Arc::new(RecordingSink {
        delivered: Arc::clone(&delivered),
    });
    let cancel = CancellationToken::new();

    // A single worker keeps batch send order equal to batch creation order,
    // so the per-source sequence observed at the sink is unambiguous. With
    // more than one worker the dispatcher only promises order *within* a
    // batch (spec: records from one source keep relative order within each
    // batch), not across batches completed by different workers.
    let mut single_worker_settings = settings(1000);
    single_worker_settings.worker_count = 1;

    let dispatcher = Dispatcher::spawn(
        single_worker_settings,
        vec![sink],
        Vec::new(),
        Arc::clone(&dlq),
        Arc::clone(&registry),
        Arc::clone(&clock),
        cancel.clone(),
    );

    let sources = ["container-a", "container-b", "container-c"];
    for seq in 0..100 {
        for source in sources {
            dispatcher.enqueue(record_for(source, seq, clock.now())).await.unwrap();
        }
    }

    drain_until(&delivered, 300).await;
    cancel.cancel();

    let mut per_source: HashMap<&str, Vec<u32>> = HashMap::new();
    for batch in delivered.lock().iter() {
        for rec in &batch.records {
            let source = sources.iter().find(|s| rec.source_id.as_str() == **s).unwrap();
            let seq: u32 = rec.message.strip_prefix("line ").unwrap().parse().unwrap();
            per_source.entry(source).or_default().push(seq);
        }
    }
    for source in sources {
        let seqs = per_source.get(source).expect("source present");
        assert_eq!(seqs.len(), 100);
        assert!(seqs.windows(2).all(|w| w[0] < w[1]), "records out of order for {source}");
    }
    assert!(dlq.load_all().unwrap().is_empty());
}

/// Scenario 3 (abridged): an outage sink fails every send until it recovers;
/// failed batches land in the DLQ and a reprocess pass redelivers them once
/// the sink is healthy again.
#[tokio::test]
async fn outage_then_recovery_redelivers_failed_batches_via_dlq_reprocess() {
    let dir = tempfile::tempdir().unwrap();
    let dlq = Arc::new(DlqStore::new(dir.path().to_path_buf(), 1024 * 1024));
    let registry = Arc::new(Registry::new(100, Utc::now()));
    let now = Utc::now();
    let clock: Arc<dyn Clock> = Arc::new(FakeClock::new(now));
    let delivered = Arc::new(StdMutex::new(Vec::new()));
    let sink: Arc<dyn Sink> = Arc::new(FlakySink {
        remaining_failures: AtomicUsize::new(1000),
        delivered: Arc::clone(&delivered),
    });
    let cancel = CancellationToken::new();

    let mut dispatcher_settings = settings(1000);
    dispatcher_settings.retry_max_attempts = 1;
    dispatcher_settings.batch_timeout = Duration::from_millis(5);

    let dispatcher = Dispatcher::spawn(
        dispatcher_settings,
        vec![sink],
        Vec::new(),
        Arc::clone(&dlq),
        Arc::clone(&registry),
        Arc::clone(&clock),
        cancel.clone(),
    );

    for seq in 0..20 {
        dispatcher.enqueue(record_for("outage-source", seq, now)).await.unwrap();
    }

    for _ in 0..200 {
        if !dlq.load_all().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let dlq_entries = dlq.load_all().unwrap();
    assert!(!dlq_entries.is_empty(), "expected failed batches to be dead-lettered");
    assert!(delivered.lock().is_empty(), "sink should not have received anything during the outage");

    cancel.cancel();

    // Recovery: a fresh dispatcher over a healthy sink, fed directly from
    // the DLQ the way `logcap-daemon`'s reprocess ticker does.
    let recovery_delivered = Arc::new(StdMutex::new(Vec::new()));
    let recovery_sink: Arc<dyn Sink> = Arc::new(RecordingSink {
        delivered: Arc::clone(&recovery_delivered),
    });
    let recovery_cancel = CancellationToken::new();
    let recovery_dispatcher = Dispatcher::spawn(
        settings(1000),
        vec![recovery_sink],
        Vec::new(),
        Arc::clone(&dlq),
        Arc::clone(&registry),
        Arc::clone(&clock),
        recovery_cancel.clone(),
    );

    let candidates = dlq.reprocessable(ChronoDuration::zero(), 5, now).unwrap();
    let mut resolved = std::collections::HashSet::new();
    let mut reprocessed = 0;
    for entry in &candidates {
        for rec in &entry.original_batch.records {
            recovery_dispatcher.enqueue(rec.clone()).await.unwrap();
            reprocessed += 1;
        }
        resolved.insert(entry.entry_id.clone());
    }
    assert_eq!(reprocessed, 20, "every dead-lettered record should be reprocessed exactly once");

    drain_until(&recovery_delivered, 20).await;
    dlq.compact(&resolved, ChronoDuration::days(7), now).unwrap();
    recovery_cancel.cancel();

    assert!(dlq.load_all().unwrap().is_empty(), "dlq should be empty once every entry is resolved");
}

/// Dedup idempotence law: the same record is accepted once and suppressed
/// on the immediate next call.
#[tokio::test]
async fn dedup_suppresses_the_second_identical_record() {
    let dir = tempfile::tempdir().unwrap();
    let dlq = Arc::new(DlqStore::new(dir.path().to_path_buf(), 1024 * 1024));
    let registry = Arc::new(Registry::new(100, Utc::now()));
    let clock: Arc<dyn Clock> = Arc::new(FakeClock::new(Utc::now()));
    let delivered = Arc::new(StdMutex::new(Vec::new()));
    let sink: Arc<dyn Sink> = Arc::new(RecordingSink {
        delivered: Arc::clone(&delivered),
    });
    let cancel = CancellationToken::new();

    let mut dispatcher_settings = settings(1000);
    dispatcher_settings.dedup_enabled = true;

    let dispatcher = Dispatcher::spawn(
        dispatcher_settings,
        vec![sink],
        Vec::new(),
        dlq,
        Arc::clone(&registry),
        Arc::clone(&clock),
        cancel.clone(),
    );

    let rec = record_for("dup-source", 0, clock.now());
    dispatcher.enqueue(rec.clone()).await.unwrap();
    dispatcher.enqueue(rec).await.unwrap();

    drain_until(&delivered, 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let total: usize = delivered.lock().iter().map(Batch::len).sum();
    assert_eq!(total, 1, "second identical record should have been deduplicated");
}

/// Position-store round-trip law: persist, reload in a fresh instance, the
/// in-memory state is unchanged.
#[test]
fn position_store_round_trips_across_a_simulated_restart() {
    let dir = tempfile::tempdir().unwrap();
    let now = Utc::now();

    let store = PositionStore::load(dir.path().to_path_buf(), 2, 1000).unwrap();
    let position = logcap_core::FilePosition {
        path: "/var/log/app.log".into(),
        offset: 4096,
        size: 8192,
        mtime: now,
        inode: 42,
        device: 7,
        last_read: now,
        status: logcap_core::FileStatus::Active,
    };
    store.update_file_position("/var/log/app.log", position.clone());
    store.flush().unwrap();

    let reloaded = PositionStore::load(dir.path().to_path_buf(), 2, 1000).unwrap();
    let loaded = reloaded.file_position("/var/log/app.log").unwrap();
    assert_eq!(loaded.offset, position.offset);
    assert_eq!(loaded.inode, position.inode);
    assert_eq!(loaded.device, position.device);
}

/// Boundary behavior: a batch whose serialized size exceeds `max_request_size`
/// splits into pieces that each fit.
#[test]
fn oversized_batch_splits_into_batches_that_each_fit_the_bound() {
    let now = Utc::now();
    let long_message = "x".repeat(200);
    let records: Vec<Record> = (0..10)
        .map(|i| record_for_with_message("split-source", i, now, &long_message))
        .collect();
    let batch = Batch::new(records);
    let per_record = batch.records[0].approx_size();
    let max_bytes = per_record * 3;

    let chunks = batch.split_by_size(max_bytes);
    assert!(chunks.len() > 1);
    for chunk in &chunks {
        assert!(chunk.approx_size() <= max_bytes || chunk.len() == 1);
    }
    let total: usize = chunks.iter().map(Batch::len).sum();
    assert_eq!(total, 10);
}

fn record_for_with_message(source: &str, seq: u32, now: DateTime<Utc>, message: &str) -> Record {
    Record::new(
        TraceId::new(format!("t-{source}-{seq}")),
        now,
        SourceType::File,
        SourceId::new(source),
        message,
        Labels::new(),
        StreamKind::Unknown,
    )
}
