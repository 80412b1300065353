// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! End-to-end latency and pool occupancy sampled at the consumer.

use std::time::{Duration, Instant};

use serde::Serialize;

/// Ring buffer of the last `window` consumed frames.
#[derive(Debug, Clone)]
pub struct FrameStats {
    delays: Vec<Option<Duration>>,
    free_slots: Vec<Option<usize>>,
    cursor: usize,
    count: u64,
    pool_capacity: Option<usize>,
}

/// Serializable summary for logs and the runtime binary.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameStatsSnapshot {
    pub samples: u64,
    pub avg_delay_ms: Option<f64>,
    pub avg_free_slots: Option<f64>,
    pub avg_processing_frames: Option<f64>,
}

impl FrameStats {
    /// `pool_capacity` is `None` when frames are not pooled.
    pub fn new(window: usize, pool_capacity: Option<usize>) -> Self {
        let window = window.max(1);
        Self {
            delays: vec![None; window],
            free_slots: vec![None; window],
            cursor: 0,
            count: 0,
            pool_capacity,
        }
    }

    /// Record a frame created at `created_at`, consumed now.
    pub fn record(&mut self, created_at: Instant, free_slots: Option<usize>) {
        self.record_at(Instant::now(), created_at, free_slots);
    }

    pub fn record_at(&mut self, now: Instant, created_at: Instant, free_slots: Option<usize>) {
        self.delays[self.cursor] = Some(now.saturating_duration_since(created_at));
        self.free_slots[self.cursor] = free_slots;
        self.cursor = (self.cursor + 1) % self.delays.len();
        self.count += 1;
    }

    /// Samples recorded since creation, including overwritten ones.
    pub fn sample_count(&self) -> u64 {
        self.count
    }

    pub fn avg_delay(&self) -> Option<Duration> {
        let valid: Vec<Duration> = self.delays.iter().flatten().copied().collect();
        if valid.is_empty() {
            return None;
        }
        Some(valid.iter().sum::<Duration>() / valid.len() as u32)
    }

    pub fn avg_free_slots(&self) -> Option<f64> {
        let valid: Vec<usize> = self.free_slots.iter().flatten().copied().collect();
        if valid.is_empty() {
            return None;
        }
        Some(valid.iter().sum::<usize>() as f64 / valid.len() as f64)
    }

    /// Frames in flight on average: pool capacity minus average free slots.
    pub fn avg_processing_frames(&self) -> Option<f64> {
        let capacity = self.pool_capacity?;
        self.avg_free_slots().map(|free| capacity as f64 - free)
    }

    pub fn snapshot(&self) -> FrameStatsSnapshot {
        FrameStatsSnapshot {
            samples: self.count,
            avg_delay_ms: self.avg_delay().map(|d| d.as_secs_f64() * 1000.0),
            avg_free_slots: self.avg_free_slots(),
            avg_processing_frames: self.avg_processing_frames(),
        }
    }
}
