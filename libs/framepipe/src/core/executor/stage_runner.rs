// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::pacing::{DiscardThrottle, PacingConfig};
use super::stage::{Disposition, Stage, StageContext};
use super::timing::StageTimer;
use crate::core::envelope::{Envelope, Terminal};
use crate::core::link_channel::{ChannelReceiver, ChannelSender};
use crate::core::pool::FrameBufferPool;
use crate::core::PipelineError;

/// How a stage loop ended.
#[derive(Debug, Clone)]
pub enum StageExit {
    /// Received and forwarded `Close`.
    Closed,
    /// Received and forwarded an upstream `CloseWithError`.
    UpstreamError(Arc<PipelineError>),
    /// This stage failed and published `CloseWithError`.
    Failed(Arc<PipelineError>),
    /// Stopped by the pipeline's abort flag without a terminal.
    Aborted,
}

impl StageExit {
    pub fn is_failure(&self) -> bool {
        matches!(self, StageExit::Failed(_))
    }

    pub fn error(&self) -> Option<&Arc<PipelineError>> {
        match self {
            StageExit::UpstreamError(e) | StageExit::Failed(e) => Some(e),
            StageExit::Closed | StageExit::Aborted => None,
        }
    }
}

/// Summary a stage thread hands back when it stops.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub stage_id: String,
    pub exit: StageExit,
    pub processed: u64,
    pub published: u64,
    pub discarded: u64,
    pub evicted: u64,
    pub elapsed: Duration,
}

impl StageReport {
    pub(crate) fn new(stage_id: &str) -> Self {
        Self {
            stage_id: stage_id.to_string(),
            exit: StageExit::Closed,
            processed: 0,
            published: 0,
            discarded: 0,
            evicted: 0,
            elapsed: Duration::ZERO,
        }
    }
}

/// Drives one [`Stage`] between its input and output channels.
pub struct StageRunner {
    stage: Box<dyn Stage>,
    input: ChannelReceiver,
    output: ChannelSender,
    ctx: StageContext,
    pacing: PacingConfig,
    abort: Arc<AtomicBool>,
}

impl StageRunner {
    pub fn new(
        stage: Box<dyn Stage>,
        input: ChannelReceiver,
        output: ChannelSender,
        pool: Option<FrameBufferPool>,
        pacing: PacingConfig,
    ) -> Self {
        let ctx = StageContext::new(stage.id(), pool);
        Self {
            stage,
            input,
            output,
            ctx,
            pacing,
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share an abort flag; when set the loop exits at its next poll.
    pub fn with_abort_flag(mut self, abort: Arc<AtomicBool>) -> Self {
        self.abort = abort;
        self
    }

    pub fn stage_id(&self) -> &str {
        self.ctx.stage_id()
    }

    /// Run until a terminal envelope arrives, the stage fails, or abort.
    pub fn run(mut self) -> StageReport {
        let id = self.ctx.stage_id().to_string();
        let started = Instant::now();
        let mut report = StageReport::new(&id);

        tracing::info!("[{}] Stage started", id);

        if let Err(e) = self.stage.setup(&self.ctx) {
            tracing::error!("[{}] Setup failed: {}", id, e);
            report.exit = self.fail(e);
            report.elapsed = started.elapsed();
            return report;
        }

        report.exit = self.run_loop(&mut report);

        if let Err(e) = self.stage.teardown() {
            tracing::warn!("[{}] Teardown error: {}", id, e);
        }
        report.elapsed = started.elapsed();
        tracing::info!(
            "[{}] Stage stopped after {} envelope(s): {:?}",
            id,
            report.processed,
            report.exit
        );
        report
    }

    fn run_loop(&mut self, report: &mut StageReport) -> StageExit {
        let poll = self.pacing.poll_interval();
        let mut throttle = DiscardThrottle::new(self.pacing.clone());
        let mut timer = StageTimer::new();

        loop {
            if self.abort.load(Ordering::Acquire) {
                tracing::warn!("[{}] Aborted", self.ctx.stage_id());
                return StageExit::Aborted;
            }

            let Some(mut envelope) = self.input.recv_timeout(poll) else {
                continue;
            };

            if let Some(terminal) = envelope.terminal_marker().cloned() {
                tracing::debug!("[{}] Forwarding terminal envelope", self.ctx.stage_id());
                if let Err(e) = self.output.publish(envelope) {
                    tracing::warn!("[{}] Forwarding terminal failed: {}", self.ctx.stage_id(), e);
                }
                return match terminal {
                    Terminal::Close => StageExit::Closed,
                    Terminal::CloseWithError(e) => StageExit::UpstreamError(e),
                };
            }

            if let Some(kind) = envelope.first_missing(self.stage.required_payloads()) {
                self.release(&mut envelope);
                return self.fail(PipelineError::MissingPayload {
                    stage: self.ctx.stage_id().to_string(),
                    kind,
                });
            }

            timer.tic();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                self.stage.process(&mut envelope, &mut self.ctx)
            }));
            report.processed += 1;

            match outcome {
                Ok(Ok(Disposition::Publish)) => match self.output.publish(envelope) {
                    Ok(published) => {
                        report.published += 1;
                        report.evicted += published.evicted as u64;
                        throttle.record_publish(published.evicted);
                    }
                    Err(e) => return self.fail(e),
                },
                Ok(Ok(Disposition::Discard)) => {
                    report.discarded += 1;
                    if let Err(e) = self.release_checked(&mut envelope) {
                        return self.fail(e);
                    }
                }
                Ok(Err(e)) => {
                    self.release(&mut envelope);
                    return self.fail(e);
                }
                Err(payload) => {
                    self.release(&mut envelope);
                    let message = panic_message(payload.as_ref());
                    return self.fail(PipelineError::stage(self.ctx.stage_id(), format!("panicked: {}", message)));
                }
            }

            timer.toc();
            self.ctx.advance();
            timer.finish_iteration(self.ctx.stage_id(), throttle.timer_secs());
            throttle.pace();
        }
    }

    fn release_checked(&self, envelope: &mut Envelope) -> crate::core::Result<bool> {
        envelope.release_frame(self.ctx.pool())
    }

    /// Release on a path that is already failing; errors are only logged.
    fn release(&self, envelope: &mut Envelope) {
        if let Err(e) = self.release_checked(envelope) {
            tracing::error!(
                "[{}] Could not release frame of envelope #{}: {}",
                self.ctx.stage_id(),
                envelope.sequence(),
                e
            );
        }
    }

    fn fail(&self, error: PipelineError) -> StageExit {
        tracing::error!("[{}] Stage failed: {}", self.ctx.stage_id(), error);
        let error = Arc::new(error);
        if let Err(e) = self.output.publish(Envelope::close_with_error(Arc::clone(&error))) {
            tracing::warn!("[{}] Publishing error close failed: {}", self.ctx.stage_id(), e);
        }
        StageExit::Failed(error)
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
