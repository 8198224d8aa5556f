// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounds the number of concurrently open container log streams (spec §4.1
//! "stream pool cap"). When the cap is reached, admitting a new container
//! evicts whichever tracked stream has been quietest the longest rather than
//! refusing the new one outright.

use logcap_core::StreamHandleMeta;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Instant;

pub struct StreamPool {
    entries: Mutex<HashMap<String, StreamHandleMeta>>,
    capacity: usize,
}

impl StreamPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, container_id: &str) -> bool {
        self.entries.lock().contains_key(container_id)
    }

    /// Register a new open stream, evicting the least-recently-active entry
    /// if the pool is already at capacity. Returns the container id that was
    /// evicted to make room, if any.
    pub fn admit(&self, container_id: &str, now: Instant) -> Option<String> {
        let mut entries = self.entries.lock();
        if entries.contains_key(container_id) {
            return None;
        }

        let evicted = if entries.len() >= self.capacity {
            let lru = entries
                .iter()
                .min_by_key(|(_, meta)| meta.last_activity)
                .map(|(id, _)| id.clone());
            if let Some(id) = &lru {
                entries.remove(id);
            }
            lru
        } else {
            None
        };

        entries.insert(container_id.to_string(), StreamHandleMeta::new(container_id, now));
        evicted
    }

    pub fn touch(&self, container_id: &str, now: Instant) {
        if let Some(meta) = self.entries.lock().get_mut(container_id) {
            meta.touch(now);
        }
    }

    pub fn release(&self, container_id: &str) {
        self.entries.lock().remove(container_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn admits_without_eviction_under_capacity() {
        let pool = StreamPool::new(2);
        let now = Instant::now();
        assert_eq!(pool.admit("a", now), None);
        assert_eq!(pool.admit("b", now), None);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn evicts_least_recently_active_when_full() {
        let pool = StreamPool::new(2);
        let t0 = Instant::now();
        pool.admit("a", t0);
        pool.admit("b", t0 + Duration::from_secs(1));
        pool.touch("b", t0 + Duration::from_secs(2));

        let evicted = pool.admit("c", t0 + Duration::from_secs(3));
        assert_eq!(evicted, Some("a".to_string()));
        assert!(pool.contains("b"));
        assert!(pool.contains("c"));
        assert!(!pool.contains("a"));
    }

    #[test]
    fn re_admitting_an_existing_entry_is_a_no_op() {
        let pool = StreamPool::new(1);
        let now = Instant::now();
        pool.admit("a", now);
        assert_eq!(pool.admit("a", now), None);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn release_frees_capacity() {
        let pool = StreamPool::new(1);
        let now = Instant::now();
        pool.admit("a", now);
        pool.release("a");
        assert_eq!(pool.admit("b", now), None);
    }
}
