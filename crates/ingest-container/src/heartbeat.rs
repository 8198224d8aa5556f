// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracks the last time each observer task made forward progress. The
//! supervisor polls this registry to detect a stalled observer (stream stuck
//! open with no frames arriving, or a hung reconnect) and respawn it (spec
//! §4.1 "task supervision & heartbeat").

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub struct HeartbeatRegistry {
    last_beat: Mutex<HashMap<String, Instant>>,
    interval: Duration,
    miss_factor: u32,
}

impl HeartbeatRegistry {
    pub fn new(interval: Duration, miss_factor: u32) -> Self {
        Self {
            last_beat: Mutex::new(HashMap::new()),
            interval,
            miss_factor,
        }
    }

    pub fn beat(&self, container_id: &str, now: Instant) {
        self.last_beat.lock().insert(container_id.to_string(), now);
    }

    pub fn forget(&self, container_id: &str) {
        self.last_beat.lock().remove(container_id);
    }

    fn stale_after(&self) -> Duration {
        self.interval.saturating_mul(self.miss_factor)
    }

    /// Containers whose last heartbeat is older than `interval * miss_factor`.
    /// A container with no recorded heartbeat yet is not considered stale —
    /// the observer may simply not have produced its first beat.
    pub fn stalled(&self, now: Instant) -> Vec<String> {
        let threshold = self.stale_after();
        self.last_beat
            .lock()
            .iter()
            .filter(|(_, beat)| now.saturating_duration_since(**beat) > threshold)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_heartbeat_is_not_stalled() {
        let registry = HeartbeatRegistry::new(Duration::from_secs(10), 3);
        let t0 = Instant::now();
        registry.beat("a", t0);
        assert!(registry.stalled(t0 + Duration::from_secs(5)).is_empty());
    }

    #[test]
    fn missed_heartbeats_beyond_threshold_are_stalled() {
        let registry = HeartbeatRegistry::new(Duration::from_secs(10), 3);
        let t0 = Instant::now();
        registry.beat("a", t0);
        let stalled = registry.stalled(t0 + Duration::from_secs(31));
        assert_eq!(stalled, vec!["a".to_string()]);
    }

    #[test]
    fn containers_with_no_heartbeat_yet_are_not_flagged() {
        let registry = HeartbeatRegistry::new(Duration::from_secs(10), 3);
        assert!(registry.stalled(Instant::now()).is_empty());
    }

    #[test]
    fn forgetting_removes_from_future_checks() {
        let registry = HeartbeatRegistry::new(Duration::from_secs(10), 3);
        let t0 = Instant::now();
        registry.beat("a", t0);
        registry.forget("a");
        assert!(registry.stalled(t0 + Duration::from_secs(100)).is_empty());
    }
}
