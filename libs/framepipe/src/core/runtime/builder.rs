// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Builder that wires the fixed pipeline topology and starts its threads.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::Sender;

use super::pipeline::{Pipeline, StageThread};
use crate::core::config::PipelineConfig;
use crate::core::executor::{
    panic_message, CaptureRunner, Stage, StageExit, StageReport, StageRunner, CAPTURE_STAGE_ID,
};
use crate::core::frames::BodyPartSelector;
use crate::core::link_channel::{ChannelReceiver, ChannelSender, StageChannel};
use crate::core::pool::FrameBufferPool;
use crate::core::stages::{PoseStage, SegmentationStage, TrackingStage};
use crate::core::traits::{FrameSource, PoseEstimator, Segmenter, Tracker};
use crate::core::{PipelineError, Result};

/// Creates the segmenter for worker `n`. Called once per worker before any
/// thread starts.
pub type SegmenterFactory = Box<dyn Fn(usize) -> Result<Box<dyn Segmenter>> + Send>;

/// Builder for a running [`Pipeline`].
///
/// Topology: capture → tracker → (pose) → segmentation × N → driver.
pub struct PipelineBuilder {
    config: PipelineConfig,
    source: Option<Box<dyn FrameSource>>,
    tracker: Option<Box<dyn Tracker>>,
    pose_estimator: Option<Box<dyn PoseEstimator>>,
    segmenter_factory: Option<SegmenterFactory>,
    body_part: Option<BodyPartSelector>,
    max_frames: Option<u64>,
}

impl PipelineBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            source: None,
            tracker: None,
            pose_estimator: None,
            segmenter_factory: None,
            body_part: None,
            max_frames: None,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn source<S: FrameSource>(mut self, source: S) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn tracker<T: Tracker>(mut self, tracker: T) -> Self {
        self.tracker = Some(Box::new(tracker));
        self
    }

    /// Required when `stages.pose` is enabled, ignored otherwise.
    pub fn pose_estimator<P: PoseEstimator>(mut self, estimator: P) -> Self {
        self.pose_estimator = Some(Box::new(estimator));
        self
    }

    pub fn segmenter_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(usize) -> Result<Box<dyn Segmenter>> + Send + 'static,
    {
        self.segmenter_factory = Some(Box::new(factory));
        self
    }

    /// Share a body part selector with the caller instead of creating one
    /// from `stages.body_part`.
    pub fn body_part(mut self, selector: BodyPartSelector) -> Self {
        self.body_part = Some(selector);
        self
    }

    /// Capture stops after this many frames as if the source had ended.
    pub fn max_frames(mut self, frames: Option<u64>) -> Self {
        self.max_frames = frames;
        self
    }

    /// Validate, wire channels and start every stage thread.
    pub fn start(self) -> Result<Pipeline> {
        let config = self.config;
        config.validate()?;

        let source = self
            .source
            .ok_or_else(|| PipelineError::Configuration("No frame source set".into()))?;
        let tracker = self
            .tracker
            .ok_or_else(|| PipelineError::Configuration("No tracker set".into()))?;
        let factory = self
            .segmenter_factory
            .ok_or_else(|| PipelineError::Configuration("No segmenter factory set".into()))?;
        let pose_estimator = if config.stages.pose {
            Some(self.pose_estimator.ok_or_else(|| {
                PipelineError::Configuration(
                    "Pose is enabled but no pose estimator is set (set stages.pose = false)".into(),
                )
            })?)
        } else {
            None
        };

        let workers = config.stages.segmentation_workers;
        let segmenters = (0..workers)
            .map(&*factory)
            .collect::<Result<Vec<_>>>()?;

        let layout = source.layout();
        let pool = if config.use_pool {
            Some(FrameBufferPool::new(layout, config.pool.clone())?)
        } else {
            None
        };
        let body_part = self
            .body_part
            .unwrap_or_else(|| BodyPartSelector::new(config.stages.body_part));

        tracing::info!(
            "[pipeline] Starting: {}x{}x{} frames, pool {}, {} segmentation worker(s), pose {}",
            layout.width,
            layout.height,
            layout.channels,
            pool.as_ref()
                .map(|p| format!("{} slot(s)", p.capacity()))
                .unwrap_or_else(|| "disabled".to_string()),
            workers,
            if pose_estimator.is_some() { "on" } else { "off" }
        );

        let channel = |name: &str| StageChannel::new(name, &config.channel, pool.clone());
        let frames = channel("frames");
        let tracked = channel("tracked");
        let posed = pose_estimator.as_ref().map(|_| channel("posed"));
        let output = channel("output");

        // Every endpoint is registered before the first thread starts so
        // close accounting sees all producers and consumers.
        let capture_output = frames.sender();
        let tracker_input = frames.receiver();
        let tracker_output = tracked.sender();
        let pose_endpoints = posed.as_ref().map(|posed| (tracked.receiver(), posed.sender()));
        let segmentation_source = posed.as_ref().unwrap_or(&tracked);
        let segmentation_endpoints: Vec<_> = (0..workers)
            .map(|_| (segmentation_source.receiver(), output.sender()))
            .collect();
        let driver_input: ChannelReceiver = output.receiver();

        let stop = Arc::new(AtomicBool::new(false));
        let abort = Arc::new(AtomicBool::new(false));
        let (report_tx, report_rx) = crossbeam_channel::unbounded();
        let mut threads = Vec::new();

        let spawned = (|| -> Result<()> {
            let capture = CaptureRunner::new(
                source,
                capture_output,
                pool.clone(),
                config.pacing.clone(),
                Arc::clone(&stop),
            )
            .with_max_frames(self.max_frames);
            threads.push(spawn_stage(CAPTURE_STAGE_ID, &report_tx, move || {
                capture.run()
            })?);

            let mut start = |stage: Box<dyn Stage>,
                             input: ChannelReceiver,
                             output: ChannelSender|
             -> Result<()> {
                let runner = StageRunner::new(stage, input, output, pool.clone(), config.pacing.clone())
                    .with_abort_flag(Arc::clone(&abort));
                let id = runner.stage_id().to_string();
                threads.push(spawn_stage(&id, &report_tx, move || runner.run())?);
                Ok(())
            };

            start(
                Box::new(TrackingStage::new(tracker, config.stages.registry_config())),
                tracker_input,
                tracker_output,
            )?;
            if let (Some(estimator), Some((input, output))) = (pose_estimator, pose_endpoints) {
                start(Box::new(PoseStage::new(estimator)), input, output)?;
            }
            for (n, (segmenter, (input, output))) in
                segmenters.into_iter().zip(segmentation_endpoints).enumerate()
            {
                let stage = SegmentationStage::new(
                    n,
                    segmenter,
                    config.stages.down_scale,
                    body_part.clone(),
                );
                start(Box::new(stage), input, output)?;
            }
            Ok(())
        })();

        if let Err(e) = spawned {
            tracing::error!("[pipeline] Startup failed: {}", e);
            stop.store(true, Ordering::Release);
            abort.store(true, Ordering::Release);
            return Err(e);
        }

        let mut channels = vec![frames, tracked];
        channels.extend(posed);
        channels.push(output);

        Ok(Pipeline::new(
            config,
            pool,
            driver_input,
            channels,
            threads,
            report_rx,
            stop,
            abort,
            body_part,
        ))
    }
}

/// Start a stage on its own named thread. The thread always sends exactly
/// one report, including when the stage body panics.
fn spawn_stage<F>(id: &str, reports: &Sender<StageReport>, body: F) -> Result<StageThread>
where
    F: FnOnce() -> StageReport + Send + 'static,
{
    let stage_id = id.to_string();
    let reports = reports.clone();
    let handle = thread::Builder::new()
        .name(format!("framepipe-{}", id))
        .spawn({
            let stage_id = stage_id.clone();
            move || {
                let report = match panic::catch_unwind(AssertUnwindSafe(body)) {
                    Ok(report) => report,
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        tracing::error!("[{}] Thread panicked: {}", stage_id, message);
                        let mut report = StageReport::new(&stage_id);
                        report.exit = StageExit::Failed(Arc::new(PipelineError::stage(
                            &stage_id,
                            format!("thread panicked: {}", message),
                        )));
                        report
                    }
                };
                // The pipeline may already have given up on this thread.
                let _ = reports.send(report);
            }
        })
        .map_err(|e| PipelineError::Runtime(format!("Failed to spawn {} thread: {}", id, e)))?;

    tracing::debug!("[{}] Thread started", stage_id);
    Ok(StageThread::new(stage_id, handle))
}
