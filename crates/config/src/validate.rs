// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-field validation. Collects every problem instead of bailing on the
//! first, so `AgentConfig::load` can report a complete list to the operator.

use crate::sections::AgentConfig;

pub(crate) fn validate(config: &AgentConfig) -> Vec<String> {
    let mut problems = Vec::new();

    if config.sinks.loki.min_batch_size > config.sinks.loki.max_batch_size {
        problems.push(format!(
            "sinks.loki.min_batch_size ({}) must be <= sinks.loki.max_batch_size ({})",
            config.sinks.loki.min_batch_size, config.sinks.loki.max_batch_size
        ));
    }
    if config.sinks.loki.min_flush_delay > config.sinks.loki.max_flush_delay {
        problems.push(format!(
            "sinks.loki.min_flush_delay ({:?}) must be <= sinks.loki.max_flush_delay ({:?})",
            config.sinks.loki.min_flush_delay, config.sinks.loki.max_flush_delay
        ));
    }
    if config.sinks.loki.base_url.is_empty() {
        problems.push("sinks.loki.base_url must not be empty".to_string());
    }

    if config.dispatcher.worker_count == 0 {
        problems.push("dispatcher.worker_count must be at least 1".to_string());
    }
    if config.dispatcher.queue_capacity == 0 {
        problems.push("dispatcher.queue_capacity must be at least 1".to_string());
    }
    if config.dispatcher.retry_backoff_base > config.dispatcher.retry_backoff_cap {
        problems.push(format!(
            "dispatcher.retry_backoff_base ({:?}) must be <= dispatcher.retry_backoff_cap ({:?})",
            config.dispatcher.retry_backoff_base, config.dispatcher.retry_backoff_cap
        ));
    }
    if !(0.0..=1.0).contains(&config.dispatcher.backpressure_warning)
        || !(0.0..=1.0).contains(&config.dispatcher.backpressure_critical)
        || !(0.0..=1.0).contains(&config.dispatcher.backpressure_emergency)
    {
        problems.push("dispatcher backpressure thresholds must fall within [0.0, 1.0]".to_string());
    }
    if !(config.dispatcher.backpressure_warning
        <= config.dispatcher.backpressure_critical
        && config.dispatcher.backpressure_critical <= config.dispatcher.backpressure_emergency)
    {
        problems.push(
            "dispatcher backpressure thresholds must satisfy warning <= critical <= emergency"
                .to_string(),
        );
    }

    if config.containers.stream_cap == 0 {
        problems.push("containers.stream_cap must be at least 1".to_string());
    }

    if config.positions.backup_generations == 0 {
        problems.push("positions.backup_generations must be at least 1".to_string());
    }

    if config.dlq.reprocess_sub_batch_size == 0 {
        problems.push("dlq.reprocess_sub_batch_size must be at least 1".to_string());
    }

    if let Some(file_sink) = &config.sinks.file {
        if file_sink.max_bytes == 0 {
            problems.push("sinks.file.max_bytes must be at least 1".to_string());
        }
    }

    problems
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_problems() {
        assert!(validate(&AgentConfig::default()).is_empty());
    }

    #[test]
    fn flags_zero_worker_count() {
        let mut config = AgentConfig::default();
        config.dispatcher.worker_count = 0;
        assert!(!validate(&config).is_empty());
    }

    #[test]
    fn flags_out_of_order_backpressure_thresholds() {
        let mut config = AgentConfig::default();
        config.dispatcher.backpressure_warning = 0.95;
        config.dispatcher.backpressure_critical = 0.5;
        assert!(!validate(&config).is_empty());
    }
}
