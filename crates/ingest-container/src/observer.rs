// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-container log-streaming task implementing the short-lived-stream
//! rotation pattern (spec §4.1):
//!
//! 1. Open a follow-mode log stream from the container's recorded position.
//! 2. Read frames until either the rotation deadline elapses or the stream
//!    ends on its own (container stopped, daemon hung up).
//! 3. On a clean rotation, reopen from the updated position immediately.
//! 4. On a transient error, back off exponentially before reconnecting.
//! 5. Exit without reconnecting once the container is gone or the agent is
//!    shutting down.

use crate::backoff::ReconnectBackoff;
use crate::error::ContainerError;
use crate::frame;
use crate::heartbeat::HeartbeatRegistry;
use crate::transport::UnixHttpClient;
use logcap_core::{Clock, ContainerPosition, Labels, Record, SourceId, SourceType, TraceId};
use logcap_storage::PositionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct ObserverConfig {
    pub container_id: String,
    pub rotation_deadline: Duration,
    pub reconnect_backoff: ReconnectBackoff,
    pub labels: Labels,
}

enum StreamOutcome {
    Rotated,
    ContainerGone,
    Cancelled,
}

pub async fn run(
    config: ObserverConfig,
    client: Arc<UnixHttpClient>,
    positions: Arc<PositionStore>,
    records_tx: mpsc::Sender<Record>,
    clock: Arc<dyn Clock>,
    heartbeats: Arc<HeartbeatRegistry>,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            break;
        }

        match stream_once(&config, &client, &positions, &records_tx, &clock, &heartbeats, &cancel).await {
            Ok(StreamOutcome::Rotated) => {
                attempt = 0;
                debug!(container_id = %config.container_id, "rotating log stream");
            }
            Ok(StreamOutcome::ContainerGone) => {
                info!(container_id = %config.container_id, "log stream ended, container appears stopped");
                break;
            }
            Ok(StreamOutcome::Cancelled) => break,
            Err(err) => {
                attempt += 1;
                let delay = config.reconnect_backoff.delay_for(attempt);
                warn!(container_id = %config.container_id, attempt, ?delay, error = %err, "container log stream failed, reconnecting");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    heartbeats.forget(&config.container_id);
}

#[allow(clippy::too_many_arguments)]
async fn stream_once(
    config: &ObserverConfig,
    client: &UnixHttpClient,
    positions: &PositionStore,
    records_tx: &mpsc::Sender<Record>,
    clock: &Arc<dyn Clock>,
    heartbeats: &HeartbeatRegistry,
    cancel: &CancellationToken,
) -> Result<StreamOutcome, ContainerError> {
    let mut position = positions
        .container_position(&config.container_id)
        .unwrap_or_else(|| ContainerPosition::new(config.container_id.clone(), clock.now()));

    let since = position.last_log_time.timestamp();
    let path = format!(
        "/containers/{}/logs?follow=true&stdout=true&stderr=true&timestamps=true&since={since}",
        config.container_id
    );
    let mut stream = client.get_stream(&path).await?;
    let deadline = tokio::time::Instant::now() + config.rotation_deadline;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                stream.close().await;
                return Ok(StreamOutcome::Cancelled);
            }
            _ = tokio::time::sleep_until(deadline) => {
                stream.close().await;
                return Ok(StreamOutcome::Rotated);
            }
            header = stream.read_exact(frame::HEADER_LEN) => {
                let Some(header_bytes) = header? else {
                    stream.close().await;
                    return Ok(StreamOutcome::ContainerGone);
                };
                let header_array: [u8; frame::HEADER_LEN] = header_bytes
                    .try_into()
                    .map_err(|_| ContainerError::Protocol("short frame header".to_string()))?;
                let (stream_kind, len) = frame::decode_header(&header_array);

                let Some(payload) = stream.read_exact(len).await? else {
                    stream.close().await;
                    return Ok(StreamOutcome::ContainerGone);
                };
                let payload_str = String::from_utf8_lossy(&payload).into_owned();
                let now = clock.now();

                for (timestamp, line) in frame::split_timestamped_lines(&payload_str, now) {
                    if timestamp > position.last_log_time {
                        position.last_log_time = timestamp;
                    }
                    let record = Record::new(
                        TraceId::new(uuid::Uuid::new_v4().to_string()),
                        timestamp,
                        SourceType::Container,
                        SourceId::new(config.container_id.clone()),
                        line,
                        config.labels.clone(),
                        stream_kind,
                    );
                    if records_tx.send(record).await.is_err() {
                        stream.close().await;
                        return Ok(StreamOutcome::Cancelled);
                    }
                }

                if positions.update_container_position(config.container_id.clone(), position.clone()) {
                    if let Err(err) = positions.flush() {
                        warn!(container_id = %config.container_id, error = %err, "failed to flush container positions");
                    }
                }
                heartbeats.beat(&config.container_id, std::time::Instant::now());
            }
        }
    }
}
