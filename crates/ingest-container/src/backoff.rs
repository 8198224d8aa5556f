// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exponential backoff with jitter for daemon reconnect attempts, mirroring
//! the sink-retry backoff used elsewhere in the agent.

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct ReconnectBackoff {
    base: Duration,
    cap: Duration,
}

impl ReconnectBackoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    /// Delay before reconnect attempt `attempt` (1-indexed), with up to 20%
    /// jitter so many observers reconnecting at once don't all hammer the
    /// daemon socket in lockstep.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = 2u32.saturating_pow(attempt.saturating_sub(1));
        let raw = self.base.saturating_mul(exp).min(self.cap);
        let jitter_ms = rand::thread_rng().gen_range(0..=(raw.as_millis() as u64 / 5).max(1));
        raw + Duration::from_millis(jitter_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_exponentially_until_cap() {
        let b = ReconnectBackoff::new(Duration::from_secs(5), Duration::from_secs(60));
        assert!(b.delay_for(1) >= Duration::from_secs(5));
        assert!(b.delay_for(1) < Duration::from_secs(6));
        assert!(b.delay_for(2) >= Duration::from_secs(10));
        assert!(b.delay_for(10) <= Duration::from_secs(60) + Duration::from_secs(12));
    }
}
