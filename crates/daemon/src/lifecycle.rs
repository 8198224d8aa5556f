// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup, component wiring, and graceful shutdown for the log-capture
//! daemon.

use chrono::{Duration as ChronoDuration, Utc};
use fs2::FileExt;
use logcap_config::AgentConfig;
use logcap_core::{Clock, Record, Sink, SystemClock};
use logcap_dispatcher::{BackoffConfig, Dispatcher, Settings, Thresholds};
use logcap_ingest_container::ContainerIngestor;
use logcap_ingest_file::{FileIngestor, FileIngestorConfig};
use logcap_metrics::Registry;
use logcap_sinks::{FileSink, FileSinkConfig, LokiSink, LokiSinkConfig};
use logcap_storage::{DlqStore, PositionStore};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(#[from] logcap_config::ConfigError),
    #[error("position store error: {0}")]
    Position(#[from] logcap_storage::PositionError),
    #[error("sink error: {0}")]
    Sink(#[from] logcap_core::SinkError),
    #[error("another logcapd instance already holds the lock at {0}")]
    AlreadyRunning(PathBuf),
}

/// Exclusive lock file preventing two daemon instances from sharing one
/// state directory. Held for the process lifetime; released on drop.
pub struct InstanceLock {
    _file: File,
}

pub fn acquire_instance_lock(path: &std::path::Path) -> Result<InstanceLock, LifecycleError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).write(true).open(path)?;
    file.try_lock_exclusive()
        .map_err(|_| LifecycleError::AlreadyRunning(path.to_path_buf()))?;
    file.set_len(0)?;
    write!(file, "{}", std::process::id())?;
    Ok(InstanceLock { _file: file })
}

/// The running daemon: shared handles callers may want (metrics, for a
/// future admin surface) plus the background tasks to join on shutdown.
pub struct Daemon {
    pub registry: Arc<Registry>,
    pub positions: Arc<PositionStore>,
    pub dlq: Arc<DlqStore>,
    pub dispatcher: Arc<Dispatcher>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Daemon {
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(err) = task.await {
                warn!(error = %err, "daemon task panicked during shutdown");
            }
        }
    }
}

fn build_sinks(
    config: &AgentConfig,
    clock: Arc<dyn Clock>,
    metrics: Arc<Registry>,
) -> Result<Vec<Arc<dyn Sink>>, LifecycleError> {
    let mut sinks: Vec<Arc<dyn Sink>> = Vec::new();

    let loki_cfg = &config.sinks.loki;
    let loki = LokiSink::new(
        LokiSinkConfig {
            base_url: loki_cfg.base_url.clone(),
            tenant_id: loki_cfg.tenant_id.clone(),
            bearer_token: loki_cfg.bearer_token.clone(),
            request_timeout: loki_cfg.request_timeout,
            max_request_bytes: loki_cfg.max_request_bytes,
            max_acceptable_age: ChronoDuration::from_std(loki_cfg.max_acceptable_age)
                .unwrap_or(ChronoDuration::days(3650)),
            drop_instead_of_clamp: loki_cfg.drop_instead_of_clamp,
            min_flush_delay: loki_cfg.min_flush_delay,
            max_flush_delay: loki_cfg.max_flush_delay,
            latency_threshold: loki_cfg.latency_threshold,
        },
        Arc::clone(&clock),
        metrics,
    )?;
    sinks.push(Arc::new(loki));

    if let Some(file_cfg) = &config.sinks.file {
        let file_sink = FileSink::new(FileSinkConfig {
            directory: file_cfg.directory.clone(),
            filename_template: file_cfg.filename_template.clone(),
            max_bytes: file_cfg.max_bytes,
            max_age: ChronoDuration::from_std(file_cfg.max_age).unwrap_or(ChronoDuration::days(3650)),
            gzip_rotated: file_cfg.gzip_rotated,
        });
        sinks.push(Arc::new(file_sink));
    }

    Ok(sinks)
}

fn dispatcher_settings(config: &logcap_config::DispatcherConfig) -> Settings {
    Settings {
        queue_capacity: config.queue_capacity,
        worker_count: config.worker_count,
        batch_size: config.batch_size,
        batch_timeout: config.batch_timeout,
        backoff: BackoffConfig {
            base: config.retry_backoff_base,
            multiplier: config.retry_backoff_multiplier,
            cap: config.retry_backoff_cap,
        },
        retry_max_attempts: config.retry_max_attempts,
        retry_semaphore: config.retry_semaphore,
        dedup_enabled: config.dedup_enabled,
        dedup_include_source_id: config.dedup_include_source_id,
        dedup_include_timestamp: config.dedup_include_timestamp,
        dedup_cache_capacity: config.dedup_cache_capacity,
        dedup_ttl: ChronoDuration::from_std(config.dedup_ttl).unwrap_or(ChronoDuration::hours(1)),
        backpressure: Thresholds {
            warning: config.backpressure_warning,
            critical: config.backpressure_critical,
            emergency: config.backpressure_emergency,
        },
    }
}

/// Build and spawn every component: position/DLQ stores, sinks, the
/// dispatcher's worker pool, both ingestors, and the housekeeping tickers
/// (position flush/cleanup, DLQ reprocess/compaction, health logging).
pub async fn startup(config: AgentConfig) -> Result<Daemon, LifecycleError> {
    std::fs::create_dir_all(&config.positions.directory)?;
    std::fs::create_dir_all(&config.dlq.directory)?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cancel = CancellationToken::new();

    let positions = Arc::new(PositionStore::load(
        config.positions.directory.clone(),
        config.positions.backup_generations,
        config.positions.flush_after_updates,
    )?);
    let dlq = Arc::new(DlqStore::new(config.dlq.directory.clone(), config.dlq.max_bytes));
    let registry = Arc::new(Registry::new(config.dispatcher.queue_capacity, clock.now()));

    let sinks = build_sinks(&config, Arc::clone(&clock), Arc::clone(&registry))?;
    let dispatcher = Dispatcher::spawn(
        dispatcher_settings(&config.dispatcher),
        sinks,
        Vec::new(),
        Arc::clone(&dlq),
        Arc::clone(&registry),
        Arc::clone(&clock),
        cancel.clone(),
    );

    let (records_tx, records_rx) = mpsc::channel::<Record>(config.dispatcher.queue_capacity.min(10_000));
    let mut tasks = Vec::new();
    let mut expected_tasks = 1; // the record pump itself

    tasks.push(spawn_record_pump(records_rx, Arc::clone(&dispatcher)));

    if config.containers.enabled {
        let ingestor = ContainerIngestor::new(
            config.containers.clone(),
            Arc::clone(&positions),
            records_tx.clone(),
            Arc::clone(&clock),
        );
        let ingestor_cancel = cancel.child_token();
        tasks.push(tokio::spawn(async move {
            ingestor.run(ingestor_cancel).await;
        }));
        expected_tasks += 1;
    }

    if config.files.enabled {
        let ingestor = FileIngestor::new(
            FileIngestorConfig {
                paths: config.files.paths.clone(),
                discovery_interval: config.files.discovery_interval,
                poll_interval: config.files.poll_interval,
                seek_strategy: config.files.seek_strategy,
                recent_tail_bytes: config.files.recent_tail_bytes,
                labels: config.files.labels.clone(),
            },
            Arc::clone(&positions),
            records_tx.clone(),
            Arc::clone(&clock),
        );
        let ingestor_cancel = cancel.child_token();
        tasks.push(tokio::spawn(async move {
            ingestor.run(ingestor_cancel).await;
        }));
        expected_tasks += 1;
    }

    drop(records_tx);
    registry.set_task_counts(expected_tasks, expected_tasks);

    tasks.push(spawn_position_housekeeping(
        Arc::clone(&positions),
        config.positions.flush_interval,
        config.positions.cleanup_interval,
        config.positions.retention,
        Arc::clone(&clock),
        cancel.child_token(),
    ));

    tasks.push(spawn_dlq_reprocess(
        Arc::clone(&dlq),
        Arc::clone(&dispatcher),
        config.dlq.clone(),
        Arc::clone(&clock),
        cancel.child_token(),
    ));

    tasks.push(spawn_health_log(
        Arc::clone(&registry),
        Arc::clone(&clock),
        cancel.child_token(),
    ));

    Ok(Daemon {
        registry,
        positions,
        dlq,
        dispatcher,
        cancel,
        tasks,
    })
}

fn spawn_record_pump(mut records_rx: mpsc::Receiver<Record>, dispatcher: Arc<Dispatcher>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(record) = records_rx.recv().await {
            if let Err(err) = dispatcher.enqueue(record).await {
                warn!(error = %err, "failed to enqueue ingested record");
            }
        }
        info!("record pump exiting, all ingestors have stopped");
    })
}

fn spawn_position_housekeeping(
    positions: Arc<PositionStore>,
    flush_interval: Duration,
    cleanup_interval: Duration,
    retention: Duration,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut flush_ticker = tokio::time::interval(flush_interval);
        let mut cleanup_ticker = tokio::time::interval(cleanup_interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    if let Err(err) = positions.flush() {
                        warn!(error = %err, "failed to flush positions on shutdown");
                    }
                    break;
                }
                _ = flush_ticker.tick() => {
                    if let Err(err) = positions.flush() {
                        warn!(error = %err, "periodic position flush failed");
                    }
                }
                _ = cleanup_ticker.tick() => {
                    let retention = ChronoDuration::from_std(retention).unwrap_or(ChronoDuration::days(1));
                    let removed = positions.cleanup_stale_files(retention, clock.now());
                    if removed > 0 {
                        info!(removed, "pruned stale file positions");
                    }
                }
            }
        }
    })
}

fn spawn_dlq_reprocess(
    dlq: Arc<DlqStore>,
    dispatcher: Arc<Dispatcher>,
    config: logcap_config::DlqConfig,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.reprocess_interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    reprocess_once(&dlq, &dispatcher, &config, clock.now()).await;
                }
            }
        }
    })
}

async fn reprocess_once(
    dlq: &DlqStore,
    dispatcher: &Dispatcher,
    config: &logcap_config::DlqConfig,
    now: chrono::DateTime<Utc>,
) {
    let min_age = ChronoDuration::from_std(config.reprocess_min_age).unwrap_or(ChronoDuration::minutes(2));
    let candidates = match dlq.reprocessable(min_age, config.reprocess_max_retries, now) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(error = %err, "failed to read dlq entries for reprocessing");
            return;
        }
    };
    if candidates.is_empty() {
        return;
    }

    let mut resolved = std::collections::HashSet::new();
    let mut failed = std::collections::HashSet::new();
    for entry in candidates {
        let mut delivered = true;
        for chunk in entry.original_batch.records.chunks(config.reprocess_sub_batch_size) {
            for record in chunk {
                if dispatcher.enqueue(record.clone()).await.is_err() {
                    delivered = false;
                }
            }
        }
        if delivered {
            resolved.insert(entry.entry_id);
        } else {
            failed.insert(entry.entry_id);
        }
    }

    if let Err(err) = dlq.record_attempts(&failed, now) {
        warn!(error = %err, "failed to record dlq retry attempts");
    }

    match dlq.compact(&resolved, ChronoDuration::from_std(config.retention).unwrap_or(ChronoDuration::days(7)), now) {
        Ok(removed) if removed > 0 => info!(removed, "compacted dlq after reprocessing"),
        Ok(_) => {}
        Err(err) => warn!(error = %err, "failed to compact dlq"),
    }
}

fn spawn_health_log(registry: Arc<Registry>, clock: Arc<dyn Clock>, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let snapshot = registry.health_snapshot(clock.now());
                    if snapshot.degraded {
                        warn!(reasons = ?snapshot.degraded_reasons, "agent health degraded");
                    } else {
                        info!(
                            queue_utilization = snapshot.queue_utilization,
                            records_ingested = snapshot.records_ingested,
                            records_dispatched = snapshot.records_dispatched,
                            "health snapshot",
                        );
                    }
                }
            }
        }
    })
}
