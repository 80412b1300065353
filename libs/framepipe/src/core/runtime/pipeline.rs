// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

use super::shutdown::ShutdownReport;
use super::status::PipelineStatus;
use crate::core::config::PipelineConfig;
use crate::core::envelope::{Envelope, PayloadKind, Terminal};
use crate::core::executor::StageReport;
use crate::core::frames::BodyPartSelector;
use crate::core::link_channel::{ChannelReceiver, StageChannel, StageChannelStats};
use crate::core::observability::{FrameStats, FrameStatsSnapshot};
use crate::core::pool::{BufferView, FrameBufferPool};
use crate::core::{PipelineError, Result};

const DRIVER_ID: &str = "driver";

/// Join handle of one stage thread.
pub(super) struct StageThread {
    id: String,
    handle: Option<JoinHandle<()>>,
}

impl StageThread {
    pub(super) fn new(id: String, handle: JoinHandle<()>) -> Self {
        Self {
            id,
            handle: Some(handle),
        }
    }

    fn is_pending(&self) -> bool {
        self.handle.is_some()
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            // The thread body catches panics and always reports first.
            if handle.join().is_err() {
                tracing::error!("[{}] Thread exited abnormally", self.id);
            }
        }
    }
}

/// Requests a graceful stop from any thread, e.g. a signal handler.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Capture stops and publishes `Close`; downstream stages drain and exit.
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A running pipeline, read by the driver from its terminal channel.
///
/// Dropping a pipeline that was not shut down shuts it down.
pub struct Pipeline {
    config: PipelineConfig,
    pool: Option<FrameBufferPool>,
    output: ChannelReceiver,
    channels: Vec<StageChannel>,
    threads: Vec<StageThread>,
    reports: Receiver<StageReport>,
    stop: Arc<AtomicBool>,
    abort: Arc<AtomicBool>,
    body_part: BodyPartSelector,
    stats: FrameStats,
    terminal: Option<Terminal>,
    status: PipelineStatus,
    shutdown_report: Option<ShutdownReport>,
}

impl Pipeline {
    pub(super) fn new(
        config: PipelineConfig,
        pool: Option<FrameBufferPool>,
        output: ChannelReceiver,
        channels: Vec<StageChannel>,
        threads: Vec<StageThread>,
        reports: Receiver<StageReport>,
        stop: Arc<AtomicBool>,
        abort: Arc<AtomicBool>,
        body_part: BodyPartSelector,
    ) -> Self {
        let stats = FrameStats::new(config.stats_window, pool.as_ref().map(|p| p.capacity()));
        tracing::info!("[pipeline] Started {} stage thread(s)", threads.len());
        Self {
            config,
            pool,
            output,
            channels,
            threads,
            reports,
            stop,
            abort,
            body_part,
            stats,
            terminal: None,
            status: PipelineStatus::Running,
            shutdown_report: None,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn status(&self) -> PipelineStatus {
        self.status
    }

    pub fn pool(&self) -> Option<&FrameBufferPool> {
        self.pool.as_ref()
    }

    /// Selector the segmentation workers read on every envelope.
    pub fn body_part(&self) -> &BodyPartSelector {
        &self.body_part
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.stop))
    }

    /// Ask capture to stop. Returns immediately; keep reading until the
    /// terminal envelope, then call [`shutdown`](Self::shutdown).
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Next envelope from the terminal channel.
    ///
    /// Yields the terminal envelope exactly once, then `None` forever.
    pub fn recv(&mut self, timeout: Duration) -> Option<Envelope> {
        if self.terminal.is_some() || self.shutdown_report.is_some() {
            return None;
        }
        let envelope = self.output.recv_timeout(timeout)?;

        match envelope.terminal_marker() {
            Some(terminal) => {
                match terminal {
                    Terminal::Close => tracing::info!("[{}] Pipeline closed", DRIVER_ID),
                    Terminal::CloseWithError(e) => {
                        tracing::error!("[{}] Pipeline closed with error: {}", DRIVER_ID, e)
                    }
                }
                self.terminal = Some(terminal.clone());
                self.status = PipelineStatus::Closed;
            }
            None => {
                let free = self.pool.as_ref().map(|p| p.free_slots());
                self.stats.record(envelope.created_at(), free);
            }
        }
        Some(envelope)
    }

    /// Block until the next data envelope. `None` once the pipeline closed.
    pub fn next_frame(&mut self) -> Option<Envelope> {
        let poll = self.config.pacing.poll_interval();
        loop {
            if self.is_closed() || self.shutdown_report.is_some() {
                return None;
            }
            match self.recv(poll) {
                Some(envelope) if envelope.is_terminal() => return None,
                Some(envelope) => return Some(envelope),
                None => continue,
            }
        }
    }

    /// Give an envelope's frame back to the pool.
    pub fn release(&self, mut envelope: Envelope) -> Result<()> {
        envelope.release_frame(self.pool.as_ref()).map(|_| ())
    }

    /// Pixels of an envelope's frame.
    pub fn frame_view<'a>(&'a self, envelope: &'a Envelope) -> Result<BufferView<'a>> {
        let frame = envelope.frame().ok_or_else(|| PipelineError::MissingPayload {
            stage: DRIVER_ID.to_string(),
            kind: PayloadKind::Frame,
        })?;
        frame.view(self.pool.as_ref())
    }

    pub fn is_closed(&self) -> bool {
        self.terminal.is_some()
    }

    pub fn terminal(&self) -> Option<&Terminal> {
        self.terminal.as_ref()
    }

    /// Error carried by the terminal envelope, once it has arrived.
    pub fn terminal_error(&self) -> Option<&Arc<PipelineError>> {
        self.terminal.as_ref().and_then(Terminal::error)
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn stats_snapshot(&self) -> FrameStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn channel_stats(&self) -> Vec<(String, StageChannelStats)> {
        self.channels
            .iter()
            .map(|c| (c.name().to_string(), c.stats()))
            .collect()
    }

    /// Stop every stage within `shutdown_timeout_ms`, drain the channels and
    /// tear down the pool.
    ///
    /// Idempotent: later calls return the first report.
    pub fn shutdown(&mut self) -> ShutdownReport {
        if let Some(report) = &self.shutdown_report {
            return report.clone();
        }

        let started = Instant::now();
        let deadline = started + self.config.shutdown_timeout();
        self.status = PipelineStatus::Stopping;
        tracing::info!("[pipeline] Shutting down");
        self.stop.store(true, Ordering::Release);

        let mut stages = Vec::with_capacity(self.threads.len());
        while self.threads.iter().any(StageThread::is_pending) {
            let Ok(report) = self.reports.recv_deadline(deadline) else {
                break;
            };
            if let Some(thread) = self.threads.iter_mut().find(|t| t.id == report.stage_id) {
                thread.join();
            }
            stages.push(report);
        }
        stages.sort_by_key(|r| {
            self.threads
                .iter()
                .position(|t| t.id == r.stage_id)
                .unwrap_or(usize::MAX)
        });

        let abandoned: Vec<String> = self
            .threads
            .iter_mut()
            .filter(|t| t.is_pending())
            .map(|t| {
                // Dropping the handle detaches the thread.
                t.handle = None;
                t.id.clone()
            })
            .collect();
        if !abandoned.is_empty() {
            self.abort.store(true, Ordering::Release);
            tracing::warn!(
                "[pipeline] Hard timeout after {:?}, detaching: {}",
                self.config.shutdown_timeout(),
                abandoned.join(", ")
            );
        }

        let mut drained = 0;
        for channel in &self.channels {
            match channel.drain() {
                Ok(count) => drained += count,
                Err(e) => tracing::warn!("[{}] Drain failed: {}", channel.name(), e),
            }
        }

        let pool_shut_down = match &self.pool {
            None => true,
            Some(pool) => match pool.shutdown() {
                Ok(()) => true,
                Err(PipelineError::PoolBusy { outstanding }) => {
                    tracing::warn!(
                        "[pipeline] Pool kept alive: {} frame(s) still held by the driver",
                        outstanding
                    );
                    false
                }
                Err(e) => {
                    tracing::warn!("[pipeline] Pool shutdown failed: {}", e);
                    false
                }
            },
        };

        let report = ShutdownReport {
            stages,
            abandoned,
            drained,
            pool_shut_down,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            "[pipeline] Shutdown complete in {:?}: {} stage(s) stopped, {} abandoned, {} envelope(s) drained",
            report.elapsed,
            report.stages.len(),
            report.abandoned.len(),
            report.drained
        );

        self.status = PipelineStatus::Stopped;
        self.shutdown_report = Some(report.clone());
        report
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if self.shutdown_report.is_none() {
            self.shutdown();
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("status", &self.status)
            .field("stages", &self.threads.iter().map(|t| &t.id).collect::<Vec<_>>())
            .field("pool", &self.pool)
            .field("terminal", &self.terminal)
            .finish()
    }
}
