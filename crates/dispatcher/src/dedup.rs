// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Time-bounded dedup cache: hash the fields that identify a record,
//! suppress anything seen again within `ttl`.
//!
//! Capacity is enforced by insertion order rather than true LRU — the sweep
//! evicts the oldest entries once the cache exceeds capacity, which is close
//! enough for a dedup window whose purpose is bounding memory, not exact
//! recency tracking.

use chrono::{DateTime, Duration, Utc};
use logcap_core::Record;
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};

pub struct DedupCache {
    ttl: Duration,
    capacity: usize,
    include_source_id: bool,
    include_timestamp: bool,
    state: Mutex<State>,
}

struct State {
    last_seen: HashMap<u64, DateTime<Utc>>,
    order: VecDeque<u64>,
}

impl DedupCache {
    pub fn new(
        ttl: Duration,
        capacity: usize,
        include_source_id: bool,
        include_timestamp: bool,
    ) -> Self {
        Self {
            ttl,
            capacity,
            include_source_id,
            include_timestamp,
            state: Mutex::new(State {
                last_seen: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    fn hash_of(&self, record: &Record) -> u64 {
        let mut hasher = DefaultHasher::new();
        record.message.hash(&mut hasher);
        if self.include_source_id {
            record.source_id.as_str().hash(&mut hasher);
        }
        if self.include_timestamp {
            record.timestamp.timestamp_nanos_opt().hash(&mut hasher);
        }
        hasher.finish()
    }

    /// `true` if this record was already seen within `ttl`. Otherwise
    /// records it as seen and returns `false`.
    pub fn check_and_insert(&self, record: &Record, now: DateTime<Utc>) -> bool {
        let hash = self.hash_of(record);
        let mut state = self.state.lock();

        if let Some(last) = state.last_seen.get(&hash) {
            if now - *last < self.ttl {
                return true;
            }
        }

        if !state.last_seen.contains_key(&hash) {
            state.order.push_back(hash);
        }
        state.last_seen.insert(hash, now);
        false
    }

    /// Drop expired entries and, if still over capacity, the oldest
    /// remaining ones by insertion order.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut state = self.state.lock();
        let before = state.last_seen.len();

        let ttl = self.ttl;
        let State { last_seen, order } = &mut *state;
        last_seen.retain(|_, last| now - *last < ttl);
        order.retain(|h| last_seen.contains_key(h));

        while state.last_seen.len() > self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                state.last_seen.remove(&oldest);
            } else {
                break;
            }
        }

        before - state.last_seen.len()
    }

    pub fn len(&self) -> usize {
        self.state.lock().last_seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
