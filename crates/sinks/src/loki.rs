// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP push to a Loki-compatible endpoint.
//!
//! Short-circuits on non-429 4xx (the request itself is malformed, retrying
//! won't help), treats 401/403 as terminal auth failures, treats a
//! timestamp-window 400 as a one-shot learning-and-retry case, and lets
//! everything else (429, 5xx, transport errors) flow back to the
//! dispatcher's retry loop.

use crate::adaptive::AdaptiveFlushDelay;
use crate::label_grouping::group_into_streams;
use crate::timestamp_clamp::{clamp_future_skew, enforce_max_age, TimestampLearner};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use logcap_core::{Batch, Clock, Sink, SinkError};
use logcap_metrics::Registry;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub struct LokiSinkConfig {
    pub base_url: String,
    pub tenant_id: Option<String>,
    pub bearer_token: Option<String>,
    pub request_timeout: Duration,
    pub max_request_bytes: usize,
    pub max_acceptable_age: ChronoDuration,
    pub drop_instead_of_clamp: bool,
    pub min_flush_delay: Duration,
    pub max_flush_delay: Duration,
    pub latency_threshold: Duration,
}

pub struct LokiSink {
    client: Client,
    push_url: String,
    tenant_id: Option<String>,
    bearer_token: Option<String>,
    max_request_bytes: usize,
    timestamps: TimestampLearner,
    drop_instead_of_clamp: bool,
    clock: Arc<dyn Clock>,
    metrics: Arc<Registry>,
    pub flush_delay: AdaptiveFlushDelay,
}

#[derive(Serialize)]
struct PushRequest {
    streams: Vec<StreamEntry>,
}

#[derive(Serialize)]
struct StreamEntry {
    stream: logcap_core::Labels,
    values: Vec<[String; 2]>,
}

impl LokiSink {
    pub fn new(
        config: LokiSinkConfig,
        clock: Arc<dyn Clock>,
        metrics: Arc<Registry>,
    ) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SinkError::Network(e.to_string()))?;

        Ok(Self {
            client,
            push_url: format!("{}/loki/api/v1/push", config.base_url.trim_end_matches('/')),
            tenant_id: config.tenant_id,
            bearer_token: config.bearer_token,
            max_request_bytes: config.max_request_bytes,
            timestamps: TimestampLearner::new(config.max_acceptable_age),
            drop_instead_of_clamp: config.drop_instead_of_clamp,
            clock,
            metrics,
            flush_delay: AdaptiveFlushDelay::new(
                config.min_flush_delay,
                config.max_flush_delay,
                config.latency_threshold,
            ),
        })
    }

    fn build_payload(&self, batch: Batch, now: DateTime<Utc>) -> PushRequest {
        let (records, dropped, clamped) = enforce_max_age(
            batch.records,
            self.timestamps.current_max_age(),
            self.drop_instead_of_clamp,
            now,
        );
        if dropped > 0 {
            debug!(dropped, "dropped records older than the learned acceptable age");
        }
        if clamped > 0 {
            self.metrics.timestamp_clamped.add(clamped as u64);
        }

        let streams = group_into_streams(records)
            .into_iter()
            .map(|(labels, records)| StreamEntry {
                stream: labels,
                values: records
                    .into_iter()
                    .map(|r| {
                        let nanos = r.timestamp.timestamp_nanos_opt().unwrap_or(0);
                        [nanos.to_string(), r.message]
                    })
                    .collect(),
            })
            .collect();

        PushRequest { streams }
    }

    /// POST one already-size-bounded batch and classify the response.
    async fn post_batch(&self, batch: Batch, now: DateTime<Utc>) -> Result<(), SinkError> {
        let payload = self.build_payload(batch, now);
        if payload.streams.is_empty() {
            return Ok(());
        }

        let mut request = self.client.post(&self.push_url).json(&payload);
        if let Some(tenant) = &self.tenant_id {
            request = request.header("X-Scope-OrgID", tenant);
        }
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let started = Instant::now();
        let result = request.send().await;
        self.flush_delay.observe(started.elapsed());

        match result {
            Ok(response) => classify_response(response).await,
            Err(e) if e.is_timeout() => Err(SinkError::Timeout(e.to_string())),
            Err(e) => Err(SinkError::Network(e.to_string())),
        }
    }

    /// Send one size-bounded chunk, retrying exactly once if Loki rejects it
    /// for falling outside its timestamp acceptance window (spec §4.5/§4.4).
    async fn send_chunk(&self, batch: Batch) -> Result<(), SinkError> {
        let now = self.clock.now();
        match self.post_batch(batch.clone(), now).await {
            Err(SinkError::TimestampWindow(body)) => {
                let retried = self.relearn_and_reclamp(batch, &body, now);
                self.post_batch(retried, now).await
            }
            other => other,
        }
    }

    fn relearn_and_reclamp(&self, batch: Batch, rejection_body: &str, now: DateTime<Utc>) -> Batch {
        if is_too_old(rejection_body) {
            let narrowed = self.timestamps.narrow();
            warn!(narrowed_to = %narrowed, "loki rejected batch as too old, narrowing learned acceptable age");
            let (records, _dropped, clamped) =
                enforce_max_age(batch.records, narrowed, self.drop_instead_of_clamp, now);
            if clamped > 0 {
                self.metrics.timestamp_clamped.add(clamped as u64);
            }
            Batch::new(records)
        } else if is_too_new(rejection_body) {
            warn!("loki rejected batch as too new, clamping future skew before retry");
            let (records, clamped) = clamp_future_skew(batch.records, now);
            if clamped > 0 {
                self.metrics.timestamp_clamped.add(clamped as u64);
            }
            Batch::new(records)
        } else {
            batch
        }
    }
}

#[async_trait]
impl Sink for LokiSink {
    fn name(&self) -> &str {
        "loki"
    }

    async fn send(&self, batch: Batch) -> Result<(), SinkError> {
        if batch.is_empty() {
            return Ok(());
        }
        for chunk in batch.split_by_size(self.max_request_bytes) {
            self.send_chunk(chunk).await?;
        }
        Ok(())
    }
}

fn is_too_old(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    lower.contains("too old") || lower.contains("too far behind")
}

fn is_too_new(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    lower.contains("too new") || lower.contains("too far in the future")
}

async fn classify_response(response: reqwest::Response) -> Result<(), SinkError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SinkError::Auth(body)),
        StatusCode::TOO_MANY_REQUESTS => Err(SinkError::Network(format!("rate limited: {body}"))),
        StatusCode::BAD_REQUEST if is_too_old(&body) || is_too_new(&body) => {
            warn!(body = %body, "loki rejected batch for timestamp window");
            Err(SinkError::TimestampWindow(body))
        }
        s if s.is_client_error() => {
            warn!(status = %s, "loki rejected batch, not retrying");
            Err(SinkError::Rejected(body))
        }
        s => Err(SinkError::Network(format!("loki returned {s}: {body}"))),
    }
}
