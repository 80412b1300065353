// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Input polling and adaptive output pacing.
//!
//! A stage that keeps finding its previous output unconsumed is producing
//! faster than downstream can take it. The discard timer grows on every such
//! eviction and decays on every clean publish; once it passes the threshold
//! the stage sleeps for the timer's value after publishing, so it stops
//! burning work that will only be thrown away.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Polling and throttle tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Input poll timeout per iteration.
    pub poll_interval_ms: u64,
    /// Seconds added to the discard timer per evicted envelope.
    pub grow_secs: f64,
    /// Seconds removed from the discard timer per clean publish.
    pub decay_secs: f64,
    /// Timer value above which the stage sleeps after publishing.
    pub threshold_secs: f64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
            grow_secs: 0.015,
            decay_secs: 0.001,
            threshold_secs: 0.015,
        }
    }
}

impl PacingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Discard timer of one stage.
#[derive(Debug, Clone)]
pub struct DiscardThrottle {
    config: PacingConfig,
    timer_secs: f64,
}

impl DiscardThrottle {
    pub fn new(config: PacingConfig) -> Self {
        Self {
            config,
            timer_secs: 0.0,
        }
    }

    /// Account for one publish that evicted `evicted` envelopes.
    pub fn record_publish(&mut self, evicted: usize) {
        if evicted > 0 {
            self.timer_secs += self.config.grow_secs * evicted as f64;
        } else {
            self.timer_secs = (self.timer_secs - self.config.decay_secs).max(0.0);
        }
    }

    pub fn timer_secs(&self) -> f64 {
        self.timer_secs
    }

    /// How long to sleep after this publish, if at all.
    pub fn backoff(&self) -> Option<Duration> {
        (self.timer_secs > self.config.threshold_secs)
            .then(|| Duration::from_secs_f64(self.timer_secs))
    }

    /// Sleep for [`backoff`](Self::backoff). Returns the time slept.
    pub fn pace(&self) -> Duration {
        match self.backoff() {
            Some(delay) => {
                std::thread::sleep(delay);
                delay
            }
            None => Duration::ZERO,
        }
    }
}
