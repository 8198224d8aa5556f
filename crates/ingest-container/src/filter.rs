// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container selection policy (spec §4.1 discovery): union-of-includes,
//! intersection-of-excludes, plus mandatory self-exclusion.

use crate::docker_api::ContainerSummary;
use logcap_config::ContainersConfig;

fn matches_any_name(summary: &ContainerSummary, patterns: &[String]) -> bool {
    let names = summary.display_names();
    patterns
        .iter()
        .any(|p| names.iter().any(|n| n.contains(p.as_str())))
}

fn matches_any_label(summary: &ContainerSummary, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| match pattern.split_once('=') {
        Some((key, value)) => summary.labels.get(key).is_some_and(|v| v == value),
        None => summary.labels.contains_key(pattern.as_str()),
    })
}

fn included(summary: &ContainerSummary, cfg: &ContainersConfig) -> bool {
    if cfg.include_names.is_empty() && cfg.include_labels.is_empty() {
        return true;
    }
    matches_any_name(summary, &cfg.include_names) || matches_any_label(summary, &cfg.include_labels)
}

/// Intersection-of-excludes: a container is excluded only if it matches
/// *every* exclude category the operator actually configured. An unconfigured
/// category (empty list) doesn't participate.
fn excluded(summary: &ContainerSummary, cfg: &ContainersConfig) -> bool {
    let mut configured = false;
    let mut all_match = true;

    if !cfg.exclude_names.is_empty() {
        configured = true;
        all_match &= matches_any_name(summary, &cfg.exclude_names);
    }
    if !cfg.exclude_labels.is_empty() {
        configured = true;
        all_match &= matches_any_label(summary, &cfg.exclude_labels);
    }

    configured && all_match
}

/// Whether the agent's own container, by best-effort identification. Docker
/// sets a container's hostname to its short ID unless overridden, so a
/// running agent's `HOSTNAME` env var is the short ID of its own container.
fn is_self(summary: &ContainerSummary, self_container_id: Option<&str>) -> bool {
    match self_container_id {
        Some(id) if !id.is_empty() => summary.id.starts_with(id),
        _ => false,
    }
}

pub fn selected(summary: &ContainerSummary, cfg: &ContainersConfig, self_container_id: Option<&str>) -> bool {
    if is_self(summary, self_container_id) {
        return false;
    }
    included(summary, cfg) && !excluded(summary, cfg)
}
