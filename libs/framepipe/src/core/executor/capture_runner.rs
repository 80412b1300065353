// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::pacing::{DiscardThrottle, PacingConfig};
use super::stage_runner::{StageExit, StageReport};
use crate::core::envelope::Envelope;
use crate::core::frames::FrameData;
use crate::core::link_channel::ChannelSender;
use crate::core::pool::{AcquireSource, FrameBufferPool};
use crate::core::traits::FrameSource;
use crate::core::{PipelineError, Result};

pub const CAPTURE_STAGE_ID: &str = "capture";

/// Head of the pipeline: reads a [`FrameSource`] and publishes frame envelopes.
pub struct CaptureRunner {
    source: Box<dyn FrameSource>,
    output: ChannelSender,
    pool: Option<FrameBufferPool>,
    pacing: PacingConfig,
    stop: Arc<AtomicBool>,
    max_frames: Option<u64>,
}

impl CaptureRunner {
    pub fn new(
        source: Box<dyn FrameSource>,
        output: ChannelSender,
        pool: Option<FrameBufferPool>,
        pacing: PacingConfig,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            source,
            output,
            pool,
            pacing,
            stop,
            max_frames: None,
        }
    }

    /// Stop after `frames` frames as if the source had ended.
    pub fn with_max_frames(mut self, frames: Option<u64>) -> Self {
        self.max_frames = frames;
        self
    }

    /// Run until the stop flag, end of stream, or a source error.
    ///
    /// Always publishes exactly one terminal envelope.
    pub fn run(mut self) -> StageReport {
        let started = Instant::now();
        let mut report = StageReport::new(CAPTURE_STAGE_ID);

        tracing::info!(
            "[{}] Reading from '{}' ({}x{}x{})",
            CAPTURE_STAGE_ID,
            self.source.name(),
            self.source.layout().width,
            self.source.layout().height,
            self.source.layout().channels
        );

        report.exit = match self.run_loop(&mut report) {
            Ok(()) => {
                if let Err(e) = self.output.publish(Envelope::close()) {
                    tracing::warn!("[{}] Publishing close failed: {}", CAPTURE_STAGE_ID, e);
                }
                StageExit::Closed
            }
            Err(e) => {
                tracing::error!("[{}] Capture failed: {}", CAPTURE_STAGE_ID, e);
                let error = Arc::new(e);
                if let Err(e) = self
                    .output
                    .publish(Envelope::close_with_error(Arc::clone(&error)))
                {
                    tracing::warn!("[{}] Publishing error close failed: {}", CAPTURE_STAGE_ID, e);
                }
                StageExit::Failed(error)
            }
        };

        report.elapsed = started.elapsed();
        tracing::info!(
            "[{}] Stopped after {} frame(s), {} skipped",
            CAPTURE_STAGE_ID,
            report.published,
            report.discarded
        );
        report
    }

    fn run_loop(&mut self, report: &mut StageReport) -> Result<()> {
        let layout = self.source.layout();
        let mut scratch = vec![0u8; layout.byte_len()];
        let mut throttle = DiscardThrottle::new(self.pacing.clone());
        let mut sequence = 0u64;

        loop {
            if self.stop.load(Ordering::Acquire) {
                tracing::debug!("[{}] Stop requested", CAPTURE_STAGE_ID);
                return Ok(());
            }
            if self.max_frames.is_some_and(|max| sequence >= max) {
                tracing::debug!("[{}] Frame limit reached", CAPTURE_STAGE_ID);
                return Ok(());
            }
            if !self.source.read(&mut scratch)? {
                tracing::info!("[{}] End of stream", CAPTURE_STAGE_ID);
                return Ok(());
            }
            report.processed += 1;

            let frame = match &self.pool {
                Some(pool) => match pool.acquire(AcquireSource::Pixels(&scratch)) {
                    Ok(handle) => FrameData::pooled(handle, layout),
                    Err(PipelineError::PoolExhausted { .. }) => {
                        tracing::debug!(
                            "[{}] Pool exhausted, skipping frame #{}",
                            CAPTURE_STAGE_ID,
                            sequence
                        );
                        report.discarded += 1;
                        continue;
                    }
                    Err(e) => return Err(e),
                },
                None => FrameData::inline(Arc::from(scratch.as_slice()), layout)?,
            };

            let envelope = Envelope::new(sequence).with(frame)?;
            let outcome = self.output.publish(envelope)?;
            report.published += 1;
            report.evicted += outcome.evicted as u64;
            throttle.record_publish(outcome.evicted);
            sequence += 1;
            throttle.pace();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::envelope::Terminal;
    use crate::core::link_channel::{StageChannel, StageChannelConfig};
    use crate::core::pool::{ExhaustionPolicy, FrameLayout, FramePoolConfig};
    use crate::core::sources::SyntheticSource;
    use std::time::Duration;

    struct FailingSource {
        remaining: u32,
    }

    impl FrameSource for FailingSource {
        fn name(&self) -> &str {
            "failing"
        }

        fn layout(&self) -> FrameLayout {
            FrameLayout::new(2, 2, 1)
        }

        fn read(&mut self, buffer: &mut [u8]) -> Result<bool> {
            if self.remaining == 0 {
                return Err(PipelineError::Io(std::io::Error::other("camera unplugged")));
            }
            self.remaining -= 1;
            buffer.fill(1);
            Ok(true)
        }
    }

    fn collect(channel: &StageChannel) -> Vec<Envelope> {
        let rx = channel.receiver();
        std::iter::from_fn(|| rx.try_recv()).collect()
    }

    #[test]
    fn test_end_of_stream_publishes_single_close() {
        let source = SyntheticSource::new(FrameLayout::new(8, 8, 3)).with_frame_limit(Some(5));
        let output = StageChannel::new("frames", &StageChannelConfig { capacity: 16 }, None);
        let runner = CaptureRunner::new(
            Box::new(source),
            output.sender(),
            None,
            PacingConfig::default(),
            Arc::new(AtomicBool::new(false)),
        );
        let report = runner.run();
        assert!(matches!(report.exit, StageExit::Closed));
        assert_eq!(report.published, 5);

        let seen = collect(&output);
        assert_eq!(seen.len(), 6);
        assert_eq!(seen.iter().filter(|e| e.is_terminal()).count(), 1);
        assert_eq!(seen[4].sequence(), 4);
        assert!(seen[0].frame().is_some());
    }

    #[test]
    fn test_source_error_becomes_error_close() {
        let output = StageChannel::new("frames", &StageChannelConfig { capacity: 16 }, None);
        let runner = CaptureRunner::new(
            Box::new(FailingSource { remaining: 2 }),
            output.sender(),
            None,
            PacingConfig::default(),
            Arc::new(AtomicBool::new(false)),
        );
        let report = runner.run();
        assert!(report.exit.is_failure());

        let seen = collect(&output);
        assert_eq!(seen.len(), 3);
        assert!(matches!(
            seen[2].terminal_marker(),
            Some(Terminal::CloseWithError(_))
        ));
    }

    #[test]
    fn test_pool_exhaustion_skips_frames() {
        let layout = FrameLayout::new(2, 2, 1);
        let pool = FrameBufferPool::new(
            layout,
            FramePoolConfig {
                capacity: 2,
                exhaustion_policy: ExhaustionPolicy::ReturnError,
            },
        )
        .unwrap();
        let output = StageChannel::new("frames", &StageChannelConfig { capacity: 16 }, Some(pool.clone()));
        let source = SyntheticSource::new(layout).with_frame_limit(Some(5));
        let runner = CaptureRunner::new(
            Box::new(source),
            output.sender(),
            Some(pool.clone()),
            PacingConfig::default(),
            Arc::new(AtomicBool::new(false)),
        );
        let report = runner.run();

        // Nobody consumes, so only two frames fit in the pool.
        assert_eq!(report.published, 2);
        assert_eq!(report.discarded, 3);
        assert!(matches!(report.exit, StageExit::Closed));
        output.drain().unwrap();
        assert_eq!(pool.outstanding(), 0);
    }

    fn run_unconsumed(frames: u64, pacing: PacingConfig) -> StageReport {
        let output = StageChannel::new("frames", &StageChannelConfig::default(), None);
        let source = SyntheticSource::new(FrameLayout::new(4, 4, 1)).with_frame_limit(Some(frames));
        CaptureRunner::new(
            Box::new(source),
            output.sender(),
            None,
            pacing,
            Arc::new(AtomicBool::new(false)),
        )
        .run()
    }

    #[test]
    fn test_backs_off_while_output_is_not_consumed() {
        // Evictions 2..=5 push the timer to 30, 45, 60 and 75 ms.
        let paced = run_unconsumed(6, PacingConfig::default());
        assert_eq!(paced.published, 6);
        assert_eq!(paced.evicted, 5);
        assert!(paced.elapsed >= Duration::from_millis(200), "{:?}", paced.elapsed);

        let unpaced = run_unconsumed(
            6,
            PacingConfig {
                threshold_secs: f64::MAX,
                ..PacingConfig::default()
            },
        );
        assert_eq!(unpaced.evicted, 5);
        assert!(unpaced.elapsed < paced.elapsed);
    }

    #[test]
    fn test_stop_flag() {
        let stop = Arc::new(AtomicBool::new(true));
        let output = StageChannel::new("frames", &StageChannelConfig::default(), None);
        let runner = CaptureRunner::new(
            Box::new(SyntheticSource::new(FrameLayout::new(4, 4, 1))),
            output.sender(),
            None,
            PacingConfig::default(),
            stop,
        );
        let report = runner.run();
        assert_eq!(report.published, 0);
        let seen = collect(&output);
        assert_eq!(seen.len(), 1);
        assert!(seen[0].is_terminal());
    }
}
