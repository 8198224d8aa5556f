// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exponential backoff with jitter for sink retries.

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    pub base: Duration,
    pub multiplier: u32,
    pub cap: Duration,
}

impl BackoffConfig {
    /// Delay before retry attempt `attempt` (1-indexed), with up to 20%
    /// jitter added to avoid synchronized retry storms across sources.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.multiplier.saturating_pow(attempt.saturating_sub(1));
        let raw = self.base.saturating_mul(exp).min(self.cap);
        let jitter_ms = rand::thread_rng().gen_range(0..=(raw.as_millis() as u64 / 5).max(1));
        raw + Duration::from_millis(jitter_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BackoffConfig {
        BackoffConfig {
            base: Duration::from_secs(5),
            multiplier: 2,
            cap: Duration::from_secs(60),
        }
    }

    #[test]
    fn grows_exponentially_until_cap() {
        let c = config();
        assert!(c.delay_for(1) >= Duration::from_secs(5));
        assert!(c.delay_for(1) < Duration::from_secs(6));
        assert!(c.delay_for(2) >= Duration::from_secs(10));
        assert!(c.delay_for(10) <= Duration::from_secs(60) + Duration::from_secs(12));
    }
}
