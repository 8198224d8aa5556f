// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container enumeration and the low-latency event subscription that wakes
//! the supervisor up between polling intervals (spec §4.1 discovery).

use crate::backoff::ReconnectBackoff;
use crate::docker_api::{ContainerSummary, DaemonEvent};
use crate::error::ContainerError;
use crate::transport::UnixHttpClient;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub async fn list_containers(client: &UnixHttpClient) -> Result<Vec<ContainerSummary>, ContainerError> {
    let response = client.get("/containers/json?all=false").await?;
    if response.status != 200 {
        return Err(ContainerError::Http(
            response.status,
            "listing containers".to_string(),
        ));
    }
    Ok(serde_json::from_slice(&response.body)?)
}

/// Subscribes to the daemon's event stream and pings `notify_tx` whenever a
/// container lifecycle event (start/die/destroy) arrives, so the supervisor
/// can reconcile immediately instead of waiting for the next discovery poll.
/// Reconnects with backoff on transport failure; exits on cancellation.
pub async fn watch_events(client: &UnixHttpClient, notify_tx: mpsc::Sender<()>, backoff: ReconnectBackoff, cancel: CancellationToken) {
    let mut attempt: u32 = 0;

    while !cancel.is_cancelled() {
        match run_event_stream(client, &notify_tx, &cancel).await {
            Ok(()) => attempt = 0,
            Err(err) => {
                attempt += 1;
                let delay = backoff.delay_for(attempt);
                warn!(attempt, ?delay, error = %err, "container event stream failed, reconnecting");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}

async fn run_event_stream(
    client: &UnixHttpClient,
    notify_tx: &mpsc::Sender<()>,
    cancel: &CancellationToken,
) -> Result<(), ContainerError> {
    let filters = r#"{"type":["container"]}"#;
    let path = format!("/events?filters={}", urlencode(filters));
    let mut stream = client.get_stream(&path).await?;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                stream.close().await;
                return Ok(());
            }
            line = stream.read_line() => {
                let Some(line) = line? else {
                    return Ok(());
                };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<DaemonEvent>(&line) {
                    Ok(event) if event.is_container_lifecycle() => {
                        debug!(container_id = %event.actor.id, action = %event.action, "container lifecycle event");
                        if notify_tx.send(()).await.is_err() {
                            stream.close().await;
                            return Ok(());
                        }
                    }
                    Ok(_) => {}
                    Err(err) => warn!(error = %err, "failed to decode daemon event"),
                }
            }
        }
    }
}

/// Minimal percent-encoding for the `filters` query parameter; the daemon
/// only ever receives a small fixed JSON blob here, not arbitrary user input.
fn urlencode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
