// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Config section structs. Every default below is named explicitly in spec.md.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub global: GlobalConfig,
    pub containers: ContainersConfig,
    pub files: FilesConfig,
    pub positions: PositionsConfig,
    pub dispatcher: DispatcherConfig,
    pub sinks: SinksConfig,
    pub dlq: DlqConfig,
    pub admin: AdminConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            global: GlobalConfig::default(),
            containers: ContainersConfig::default(),
            files: FilesConfig::default(),
            positions: PositionsConfig::default(),
            dispatcher: DispatcherConfig::default(),
            sinks: SinksConfig::default(),
            dlq: DlqConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Human-readable identifier for this agent instance, attached to metrics.
    pub instance_id: String,
    /// `tracing` env-filter directive, e.g. "info" or "logcap=debug".
    pub log_level: String,
    /// Root directory for positions/DLQ state when not overridden per-section.
    pub state_dir: PathBuf,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            instance_id: "logcap".to_string(),
            log_level: "info".to_string(),
            state_dir: PathBuf::from("/var/lib/logcap"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainersConfig {
    pub enabled: bool,
    /// Unix socket path to the container daemon.
    pub socket_path: PathBuf,
    pub include_names: Vec<String>,
    pub exclude_names: Vec<String>,
    pub include_labels: Vec<String>,
    pub exclude_labels: Vec<String>,
    #[serde(with = "duration_secs")]
    pub discovery_interval: Duration,
    #[serde(with = "duration_secs")]
    pub rotation_deadline: Duration,
    pub stream_cap: usize,
    #[serde(with = "duration_secs")]
    pub heartbeat_interval: Duration,
    pub heartbeat_miss_factor: u32,
    #[serde(with = "duration_secs")]
    pub reconnect_backoff_base: Duration,
    #[serde(with = "duration_secs")]
    pub reconnect_backoff_cap: Duration,
}

impl Default for ContainersConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            socket_path: PathBuf::from("/var/run/docker.sock"),
            include_names: Vec::new(),
            exclude_names: Vec::new(),
            include_labels: Vec::new(),
            exclude_labels: Vec::new(),
            discovery_interval: secs(30),
            rotation_deadline: secs(30),
            stream_cap: 50,
            heartbeat_interval: secs(30),
            heartbeat_miss_factor: 5,
            reconnect_backoff_base: secs(5),
            reconnect_backoff_cap: secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeekStrategy {
    Beginning,
    Recent,
    End,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    pub enabled: bool,
    pub paths: Vec<String>,
    #[serde(with = "duration_secs")]
    pub discovery_interval: Duration,
    #[serde(with = "duration_millis")]
    pub poll_interval: Duration,
    pub seek_strategy: SeekStrategy,
    /// Tail window size in bytes for `SeekStrategy::Recent`.
    pub recent_tail_bytes: u64,
    pub labels: std::collections::BTreeMap<String, String>,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            paths: Vec::new(),
            discovery_interval: secs(30),
            poll_interval: millis(100),
            seek_strategy: SeekStrategy::End,
            recent_tail_bytes: 65536,
            labels: std::collections::BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionsConfig {
    pub directory: PathBuf,
    #[serde(with = "duration_secs")]
    pub flush_interval: Duration,
    pub flush_after_updates: u32,
    pub backup_generations: u32,
    #[serde(with = "duration_secs")]
    pub retention: Duration,
    #[serde(with = "duration_secs")]
    pub cleanup_interval: Duration,
}

impl Default for PositionsConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("/var/lib/logcap/positions"),
            flush_interval: secs(10),
            flush_after_updates: 100,
            backup_generations: 3,
            retention: secs(24 * 3600),
            cleanup_interval: secs(3600),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    pub queue_capacity: usize,
    pub worker_count: usize,
    pub batch_size: usize,
    #[serde(with = "duration_secs")]
    pub batch_timeout: Duration,
    #[serde(with = "duration_secs")]
    pub retry_backoff_base: Duration,
    pub retry_backoff_multiplier: u32,
    #[serde(with = "duration_secs")]
    pub retry_backoff_cap: Duration,
    pub retry_max_attempts: u32,
    pub retry_semaphore: usize,
    pub dedup_enabled: bool,
    pub dedup_include_source_id: bool,
    pub dedup_include_timestamp: bool,
    pub dedup_cache_capacity: usize,
    #[serde(with = "duration_secs")]
    pub dedup_ttl: Duration,
    #[serde(with = "duration_secs")]
    pub dedup_sweep_interval: Duration,
    /// Queue-utilization thresholds: (warning, critical, emergency), spec §4.4.
    pub backpressure_warning: f64,
    pub backpressure_critical: f64,
    pub backpressure_emergency: f64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 50_000,
            worker_count: 6,
            batch_size: 500,
            batch_timeout: secs(10),
            retry_backoff_base: secs(5),
            retry_backoff_multiplier: 2,
            retry_backoff_cap: secs(60),
            retry_max_attempts: 3,
            retry_semaphore: 150,
            dedup_enabled: true,
            dedup_include_source_id: true,
            dedup_include_timestamp: false,
            dedup_cache_capacity: 100_000,
            dedup_ttl: secs(3600),
            dedup_sweep_interval: secs(600),
            backpressure_warning: 0.75,
            backpressure_critical: 0.90,
            backpressure_emergency: 0.95,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinksConfig {
    pub loki: LokiSinkConfig,
    pub file: Option<FileSinkConfig>,
}

impl Default for SinksConfig {
    fn default() -> Self {
        Self {
            loki: LokiSinkConfig::default(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LokiSinkConfig {
    pub base_url: String,
    pub tenant_id: Option<String>,
    pub bearer_token: Option<String>,
    pub max_request_bytes: usize,
    pub min_batch_size: usize,
    pub max_batch_size: usize,
    #[serde(with = "duration_millis")]
    pub min_flush_delay: Duration,
    #[serde(with = "duration_secs")]
    pub max_flush_delay: Duration,
    #[serde(with = "duration_secs")]
    pub adaptation_interval: Duration,
    #[serde(with = "duration_millis")]
    pub latency_threshold: Duration,
    #[serde(with = "duration_secs")]
    pub max_acceptable_age: Duration,
    pub drop_instead_of_clamp: bool,
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
}

impl Default for LokiSinkConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3100".to_string(),
            tenant_id: None,
            bearer_token: None,
            max_request_bytes: 2 * 1024 * 1024,
            min_batch_size: 10,
            max_batch_size: 1000,
            min_flush_delay: millis(50),
            max_flush_delay: secs(10),
            adaptation_interval: secs(30),
            latency_threshold: millis(500),
            max_acceptable_age: secs(24 * 3600),
            drop_instead_of_clamp: false,
            request_timeout: secs(120),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSinkConfig {
    pub directory: PathBuf,
    pub filename_template: String,
    pub max_bytes: u64,
    #[serde(with = "duration_secs")]
    pub max_age: Duration,
    pub gzip_rotated: bool,
}

impl Default for FileSinkConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("/var/log/logcap"),
            filename_template: "{date}-{source_id}.log".to_string(),
            max_bytes: 100 * 1024 * 1024,
            max_age: secs(24 * 3600),
            gzip_rotated: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DlqConfig {
    pub directory: PathBuf,
    pub max_bytes: u64,
    #[serde(with = "duration_secs")]
    pub retention: Duration,
    #[serde(with = "duration_secs")]
    pub reprocess_interval: Duration,
    #[serde(with = "duration_secs")]
    pub reprocess_min_age: Duration,
    pub reprocess_max_retries: u32,
    pub reprocess_sub_batch_size: usize,
}

impl Default for DlqConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("/var/lib/logcap/dlq"),
            max_bytes: 100 * 1024 * 1024,
            retention: secs(7 * 24 * 3600),
            reprocess_interval: secs(5 * 60),
            reprocess_min_age: secs(2 * 60),
            reprocess_max_retries: 3,
            reprocess_sub_batch_size: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:9091".to_string(),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
