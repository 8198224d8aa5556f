// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `OJLC_<SECTION>_<FIELD>` environment overrides, checked after the YAML
//! file loads so operators can tune a single value without editing the file.

use crate::sections::AgentConfig;
use std::str::FromStr;
use std::time::Duration;

fn env_value<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

fn env_secs(key: &str) -> Option<Duration> {
    env_value::<u64>(key).map(Duration::from_secs)
}

fn env_millis(key: &str) -> Option<Duration> {
    env_value::<u64>(key).map(Duration::from_millis)
}

pub(crate) fn apply(config: &mut AgentConfig) {
    if let Some(v) = env_value::<String>("OJLC_GLOBAL_LOG_LEVEL") {
        config.global.log_level = v;
    }
    if let Some(v) = env_value::<String>("OJLC_GLOBAL_INSTANCE_ID") {
        config.global.instance_id = v;
    }

    if let Some(v) = env_value::<bool>("OJLC_CONTAINERS_ENABLED") {
        config.containers.enabled = v;
    }
    if let Some(v) = env_value::<usize>("OJLC_CONTAINERS_STREAM_CAP") {
        config.containers.stream_cap = v;
    }
    if let Some(v) = env_secs("OJLC_CONTAINERS_ROTATION_DEADLINE") {
        config.containers.rotation_deadline = v;
    }

    if let Some(v) = env_value::<bool>("OJLC_FILES_ENABLED") {
        config.files.enabled = v;
    }
    if let Some(v) = env_millis("OJLC_FILES_POLL_INTERVAL") {
        config.files.poll_interval = v;
    }

    if let Some(v) = env_value::<usize>("OJLC_DISPATCHER_QUEUE_CAPACITY") {
        config.dispatcher.queue_capacity = v;
    }
    if let Some(v) = env_value::<usize>("OJLC_DISPATCHER_WORKER_COUNT") {
        config.dispatcher.worker_count = v;
    }
    if let Some(v) = env_value::<usize>("OJLC_DISPATCHER_BATCH_SIZE") {
        config.dispatcher.batch_size = v;
    }
    if let Some(v) = env_secs("OJLC_DISPATCHER_BATCH_TIMEOUT") {
        config.dispatcher.batch_timeout = v;
    }
    if let Some(v) = env_value::<u32>("OJLC_DISPATCHER_RETRY_MAX_ATTEMPTS") {
        config.dispatcher.retry_max_attempts = v;
    }
    if let Some(v) = env_value::<usize>("OJLC_DISPATCHER_RETRY_SEMAPHORE") {
        config.dispatcher.retry_semaphore = v;
    }
    if let Some(v) = env_value::<bool>("OJLC_DISPATCHER_DEDUP_ENABLED") {
        config.dispatcher.dedup_enabled = v;
    }

    if let Some(v) = env_value::<String>("OJLC_SINKS_LOKI_BASE_URL") {
        config.sinks.loki.base_url = v;
    }
    if let Some(v) = env_value::<String>("OJLC_SINKS_LOKI_TENANT_ID") {
        config.sinks.loki.tenant_id = Some(v);
    }
    if let Some(v) = env_value::<String>("OJLC_SINKS_LOKI_BEARER_TOKEN") {
        config.sinks.loki.bearer_token = Some(v);
    }
    if let Some(v) = env_value::<usize>("OJLC_SINKS_LOKI_MIN_BATCH_SIZE") {
        config.sinks.loki.min_batch_size = v;
    }
    if let Some(v) = env_value::<usize>("OJLC_SINKS_LOKI_MAX_BATCH_SIZE") {
        config.sinks.loki.max_batch_size = v;
    }
    if let Some(v) = env_value::<usize>("OJLC_SINKS_LOKI_MAX_REQUEST_BYTES") {
        config.sinks.loki.max_request_bytes = v;
    }
    if let Some(v) = env_secs("OJLC_SINKS_LOKI_MAX_ACCEPTABLE_AGE") {
        config.sinks.loki.max_acceptable_age = v;
    }

    if let Some(v) = env_value::<u64>("OJLC_DLQ_MAX_BYTES") {
        config.dlq.max_bytes = v;
    }
    if let Some(v) = env_secs("OJLC_DLQ_RETENTION") {
        config.dlq.retention = v;
    }

    if let Some(v) = env_value::<String>("OJLC_ADMIN_BIND_ADDRESS") {
        config.admin.bind_address = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn overrides_worker_count_from_env() {
        std::env::set_var("OJLC_DISPATCHER_WORKER_COUNT", "9");
        let mut config = AgentConfig::default();
        apply(&mut config);
        std::env::remove_var("OJLC_DISPATCHER_WORKER_COUNT");
        assert_eq!(config.dispatcher.worker_count, 9);
    }

    #[test]
    #[serial]
    fn ignores_unparseable_values() {
        std::env::set_var("OJLC_DISPATCHER_WORKER_COUNT", "not-a-number");
        let mut config = AgentConfig::default();
        let before = config.dispatcher.worker_count;
        apply(&mut config);
        std::env::remove_var("OJLC_DISPATCHER_WORKER_COUNT");
        assert_eq!(config.dispatcher.worker_count, before);
    }
}
