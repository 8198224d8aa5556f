// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adjusts the next batch's target flush delay based on recent push
//! latency: slower than `latency_threshold` pushes the delay toward the
//! max (fewer, larger requests under load); faster pushes it toward the
//! min (lower end-to-end latency when the sink has headroom).

use parking_lot::Mutex;
use std::time::Duration;

pub struct AdaptiveFlushDelay {
    min: Duration,
    max: Duration,
    threshold: Duration,
    current: Mutex<Duration>,
}

impl AdaptiveFlushDelay {
    pub fn new(min: Duration, max: Duration, threshold: Duration) -> Self {
        Self {
            min,
            max,
            threshold,
            current: Mutex::new(min),
        }
    }

    pub fn current(&self) -> Duration {
        *self.current.lock()
    }

    /// Step the delay up or down by 20% of the configured range based on
    /// the latest observed push latency.
    pub fn observe(&self, latency: Duration) {
        let step = (self.max.saturating_sub(self.min)) / 5;
        let step = if step.is_zero() {
            Duration::from_millis(1)
        } else {
            step
        };
        let mut current = self.current.lock();
        if latency > self.threshold {
            *current = (*current + step).min(self.max);
        } else {
            *current = current.saturating_sub(step).max(self.min);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moves_toward_max_under_sustained_high_latency() {
        let controller = AdaptiveFlushDelay::new(
            Duration::from_millis(50),
            Duration::from_secs(10),
            Duration::from_millis(500),
        );
        for _ in 0..10 {
            controller.observe(Duration::from_secs(1));
        }
        assert_eq!(controller.current(), Duration::from_secs(10));
    }

    #[test]
    fn moves_toward_min_under_sustained_low_latency() {
        let controller = AdaptiveFlushDelay::new(
            Duration::from_millis(50),
            Duration::from_secs(10),
            Duration::from_millis(500),
        );
        controller.observe(Duration::from_secs(2));
        for _ in 0..20 {
            controller.observe(Duration::from_millis(10));
        }
        assert_eq!(controller.current(), Duration::from_millis(50));
    }
}
