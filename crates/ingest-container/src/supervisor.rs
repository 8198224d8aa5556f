// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ties discovery, the stream pool cap, and per-container observers together,
//! mirroring the shape of the file ingestor's supervisor.

use crate::backoff::ReconnectBackoff;
use crate::discovery;
use crate::docker_api::ContainerSummary;
use crate::filter;
use crate::heartbeat::HeartbeatRegistry;
use crate::observer::{self, ObserverConfig};
use crate::pool::StreamPool;
use crate::transport::UnixHttpClient;
use logcap_config::ContainersConfig;
use logcap_core::{Clock, Labels, Record};
use logcap_storage::PositionStore;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct ContainerIngestor {
    config: ContainersConfig,
    client: Arc<UnixHttpClient>,
    positions: Arc<PositionStore>,
    records_tx: mpsc::Sender<Record>,
    clock: Arc<dyn Clock>,
    self_container_id: Option<String>,
}

impl ContainerIngestor {
    pub fn new(
        config: ContainersConfig,
        positions: Arc<PositionStore>,
        records_tx: mpsc::Sender<Record>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let client = Arc::new(UnixHttpClient::new(
            config.socket_path.clone(),
            8,
            std::time::Duration::from_secs(30),
        ));
        let self_container_id = std::env::var("HOSTNAME").ok().filter(|v| !v.is_empty());
        Self {
            config,
            client,
            positions,
            records_tx,
            clock,
            self_container_id,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        let pool = Arc::new(StreamPool::new(self.config.stream_cap));
        let heartbeats = Arc::new(HeartbeatRegistry::new(
            self.config.heartbeat_interval,
            self.config.heartbeat_miss_factor,
        ));
        let backoff = ReconnectBackoff::new(self.config.reconnect_backoff_base, self.config.reconnect_backoff_cap);
        let mut active: HashMap<String, CancellationToken> = HashMap::new();

        let (notify_tx, mut notify_rx) = mpsc::channel(16);
        let events_client = Arc::clone(&self.client);
        let events_cancel = cancel.child_token();
        tokio::spawn(async move {
            discovery::watch_events(&events_client, notify_tx, backoff, events_cancel).await;
        });

        loop {
            self.reconcile(&mut active, &pool, &heartbeats, backoff, &cancel).await;
            self.check_heartbeats(&mut active, &heartbeats, &pool);

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.discovery_interval) => {}
                _ = notify_rx.recv() => {}
            }
        }

        for (_, token) in active.drain() {
            token.cancel();
        }
    }

    async fn reconcile(
        &self,
        active: &mut HashMap<String, CancellationToken>,
        pool: &Arc<StreamPool>,
        heartbeats: &Arc<HeartbeatRegistry>,
        backoff: ReconnectBackoff,
        cancel: &CancellationToken,
    ) {
        let containers = match discovery::list_containers(&self.client).await {
            Ok(containers) => containers,
            Err(err) => {
                warn!(error = %err, "failed to list containers from daemon");
                return;
            }
        };

        let selected: Vec<&ContainerSummary> = containers
            .iter()
            .filter(|c| filter::selected(c, &self.config, self.self_container_id.as_deref()))
            .collect();
        let selected_ids: HashSet<&str> = selected.iter().map(|c| c.id.as_str()).collect();

        active.retain(|id, token| {
            if selected_ids.contains(id.as_str()) {
                true
            } else {
                info!(container_id = %id, "container no longer selected, stopping observer");
                token.cancel();
                pool.release(id);
                heartbeats.forget(id);
                false
            }
        });

        for summary in selected {
            if active.contains_key(&summary.id) {
                continue;
            }
            self.spawn_observer(summary, active, pool, heartbeats, backoff, cancel);
        }
    }

    fn spawn_observer(
        &self,
        summary: &ContainerSummary,
        active: &mut HashMap<String, CancellationToken>,
        pool: &Arc<StreamPool>,
        heartbeats: &Arc<HeartbeatRegistry>,
        backoff: ReconnectBackoff,
        cancel: &CancellationToken,
    ) {
        if let Some(evicted_id) = pool.admit(&summary.id, std::time::Instant::now()) {
            warn!(evicted_container_id = %evicted_id, "stream pool at capacity, evicting least active container");
            if let Some(token) = active.remove(&evicted_id) {
                token.cancel();
            }
            heartbeats.forget(&evicted_id);
        }

        let observer_cancel = cancel.child_token();
        let config = ObserverConfig {
            container_id: summary.id.clone(),
            rotation_deadline: self.config.rotation_deadline,
            reconnect_backoff: backoff,
            labels: container_labels(summary),
        };
        let client = Arc::clone(&self.client);
        let positions = Arc::clone(&self.positions);
        let records_tx = self.records_tx.clone();
        let clock = Arc::clone(&self.clock);
        let heartbeats_clone = Arc::clone(heartbeats);
        let task_cancel = observer_cancel.clone();

        info!(container_id = %summary.id, "starting container log observer");
        tokio::spawn(async move {
            observer::run(config, client, positions, records_tx, clock, heartbeats_clone, task_cancel).await;
        });
        active.insert(summary.id.clone(), observer_cancel);
    }

    /// Drops any observer whose heartbeat has gone stale. The next reconcile
    /// pass (on the following discovery tick) respawns it if the container
    /// is still selected.
    fn check_heartbeats(&self, active: &mut HashMap<String, CancellationToken>, heartbeats: &Arc<HeartbeatRegistry>, pool: &Arc<StreamPool>) {
        for container_id in heartbeats.stalled(std::time::Instant::now()) {
            warn!(container_id = %container_id, "observer heartbeat stalled, respawning");
            if let Some(token) = active.remove(&container_id) {
                token.cancel();
            }
            heartbeats.forget(&container_id);
            pool.release(&container_id);
        }
    }
}

fn container_labels(summary: &ContainerSummary) -> Labels {
    let mut labels = Labels::new();
    if let Some(name) = summary.display_names().first() {
        labels.insert("container_name".to_string(), (*name).to_string());
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    #[test]
    fn container_labels_uses_first_display_name() {
        let summary = ContainerSummary {
            id: "abc123".to_string(),
            names: vec!["/web-1".to_string(), "/web-1/alias".to_string()],
            labels: StdHashMap::new(),
        };
        let labels = container_labels(&summary);
        assert_eq!(labels.get("container_name").map(String::as_str), Some("web-1"));
    }

    #[test]
    fn container_labels_empty_when_no_names() {
        let summary = ContainerSummary {
            id: "abc123".to_string(),
            names: Vec::new(),
            labels: StdHashMap::new(),
        };
        assert!(container_labels(&summary).is_empty());
    }
}
