// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rediscovers configured paths/globs on an interval and keeps one tailer
//! task running per currently-matched file (spec §4.2 discovery).

use crate::discovery::discover;
use crate::tailer::{self, TailerConfig};
use logcap_config::SeekStrategy;
use logcap_core::{Clock, Labels, Record};
use logcap_storage::PositionStore;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct FileIngestorConfig {
    pub paths: Vec<String>,
    pub discovery_interval: Duration,
    pub poll_interval: Duration,
    pub seek_strategy: SeekStrategy,
    pub recent_tail_bytes: u64,
    pub labels: Labels,
}

struct ActiveTailer {
    cancel: CancellationToken,
}

pub struct FileIngestor {
    config: FileIngestorConfig,
    positions: Arc<PositionStore>,
    records_tx: mpsc::Sender<Record>,
    clock: Arc<dyn Clock>,
}

impl FileIngestor {
    pub fn new(
        config: FileIngestorConfig,
        positions: Arc<PositionStore>,
        records_tx: mpsc::Sender<Record>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            positions,
            records_tx,
            clock,
        }
    }

    /// Run the discovery loop until `cancel` fires, then stop every active
    /// tailer and return.
    pub async fn run(self, cancel: CancellationToken) {
        let mut active: HashMap<PathBuf, ActiveTailer> = HashMap::new();

        loop {
            self.reconcile(&mut active, &cancel);

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.discovery_interval) => {}
            }
        }

        for (_, tailer) in active.drain() {
            tailer.cancel.cancel();
        }
    }

    fn reconcile(&self, active: &mut HashMap<PathBuf, ActiveTailer>, cancel: &CancellationToken) {
        let discovered = discover(&self.config.paths);
        let discovered_set: std::collections::HashSet<&PathBuf> = discovered.iter().collect();

        active.retain(|path, tailer| {
            if discovered_set.contains(path) {
                true
            } else {
                info!(path = %path.display(), "file no longer matched, stopping tailer");
                tailer.cancel.cancel();
                false
            }
        });

        for path in discovered {
            if active.contains_key(&path) {
                continue;
            }
            info!(path = %path.display(), "discovered file, starting tailer");
            let tailer_cancel = cancel.child_token();
            let tailer_config = TailerConfig {
                path: path.clone(),
                poll_interval: self.config.poll_interval,
                seek_strategy: self.config.seek_strategy,
                recent_tail_bytes: self.config.recent_tail_bytes,
                labels: self.config.labels.clone(),
            };
            let positions = Arc::clone(&self.positions);
            let records_tx = self.records_tx.clone();
            let clock = Arc::clone(&self.clock);
            let task_cancel = tailer_cancel.clone();
            tokio::spawn(async move {
                tailer::run(tailer_config, positions, records_tx, clock, task_cancel).await;
            });
            active.insert(path, ActiveTailer { cancel: tailer_cancel });
        }
    }
}
