// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::time::{Duration, Instant};

/// Iterations before the average is reset, so startup cost is not reported.
pub const WARMUP_ITERATIONS: u64 = 100;
/// Iterations between throughput log lines.
pub const REPORT_EVERY: u64 = 100;

/// Per-stage processing-time accumulator.
#[derive(Debug)]
pub struct StageTimer {
    started: Option<Instant>,
    total: Duration,
    calls: u32,
    iterations: u64,
}

impl Default for StageTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl StageTimer {
    pub fn new() -> Self {
        Self {
            started: None,
            total: Duration::ZERO,
            calls: 0,
            iterations: 0,
        }
    }

    pub fn tic(&mut self) {
        self.started = Some(Instant::now());
    }

    pub fn toc(&mut self) -> Duration {
        let elapsed = self
            .started
            .take()
            .map(|start| start.elapsed())
            .unwrap_or_default();
        self.total += elapsed;
        self.calls += 1;
        elapsed
    }

    pub fn average(&self) -> Option<Duration> {
        (self.calls > 0).then(|| self.total / self.calls)
    }

    pub fn clear(&mut self) {
        self.total = Duration::ZERO;
        self.calls = 0;
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Close an iteration; logs throughput every `REPORT_EVERY` iterations
    /// after the warm-up.
    pub fn finish_iteration(&mut self, stage_id: &str, pacing_secs: f64) {
        self.iterations += 1;
        if self.iterations == WARMUP_ITERATIONS {
            self.clear();
        }
        if self.iterations > WARMUP_ITERATIONS && self.iterations % REPORT_EVERY == 0 {
            if let Some(average) = self.average() {
                let secs = average.as_secs_f64();
                if secs > 0.0 {
                    tracing::info!(
                        "[{}] {:.1} fps ({:.1} fps with pacing)",
                        stage_id,
                        1.0 / secs,
                        1.0 / (secs + pacing_secs)
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average() {
        let mut timer = StageTimer::new();
        assert!(timer.average().is_none());
        timer.tic();
        std::thread::sleep(Duration::from_millis(5));
        let elapsed = timer.toc();
        assert!(elapsed >= Duration::from_millis(5));
        assert_eq!(timer.average(), Some(elapsed));
    }

    #[test]
    fn test_warmup_clears_average() {
        let mut timer = StageTimer::new();
        for _ in 0..WARMUP_ITERATIONS {
            timer.tic();
            timer.toc();
            timer.finish_iteration("test", 0.0);
        }
        assert!(timer.average().is_none());
        assert_eq!(timer.iterations(), WARMUP_ITERATIONS);
    }
}
