// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use crate::core::envelope::{Envelope, PayloadKind};
use crate::core::frames::FrameData;
use crate::core::pool::{BufferView, FrameBufferPool};
use crate::core::{PipelineError, Result};

/// What the runner does with an envelope after `process`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Pass it downstream.
    Publish,
    /// Drop it; the runner releases its frame.
    Discard,
}

/// Runner-owned state handed to the stage on every call.
#[derive(Debug)]
pub struct StageContext {
    stage_id: String,
    frame_index: u64,
    pool: Option<FrameBufferPool>,
}

impl StageContext {
    pub fn new(stage_id: impl Into<String>, pool: Option<FrameBufferPool>) -> Self {
        Self {
            stage_id: stage_id.into(),
            frame_index: 0,
            pool,
        }
    }

    pub fn stage_id(&self) -> &str {
        &self.stage_id
    }

    /// Number of envelopes this stage has processed before the current one.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub(crate) fn advance(&mut self) {
        self.frame_index += 1;
    }

    pub fn pool(&self) -> Option<&FrameBufferPool> {
        self.pool.as_ref()
    }

    /// Pixels of the envelope's frame.
    pub fn frame<'a>(&'a self, envelope: &'a Envelope) -> Result<BufferView<'a>> {
        let frame = envelope
            .get::<FrameData>()
            .ok_or_else(|| PipelineError::MissingPayload {
                stage: self.stage_id.clone(),
                kind: PayloadKind::Frame,
            })?;
        frame.view(self.pool.as_ref())
    }
}

/// One pipeline worker.
///
/// The runner owns the loop, the channels and the envelope; a stage only
/// enriches the envelope it is given. Errors returned from `process` (and
/// panics) end the stage and are sent downstream as `CloseWithError`.
pub trait Stage: Send + 'static {
    fn id(&self) -> &str;

    /// Payload kinds every input envelope must carry.
    fn required_payloads(&self) -> &[PayloadKind] {
        &[]
    }

    fn setup(&mut self, _ctx: &StageContext) -> Result<()> {
        Ok(())
    }

    fn process(&mut self, envelope: &mut Envelope, ctx: &mut StageContext) -> Result<Disposition>;

    fn teardown(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Stage built from a closure.
pub struct FnStage<F> {
    id: String,
    required: Vec<PayloadKind>,
    process: F,
}

impl<F> FnStage<F>
where
    F: FnMut(&mut Envelope, &mut StageContext) -> Result<Disposition> + Send + 'static,
{
    pub fn new(id: impl Into<String>, process: F) -> Self {
        Self {
            id: id.into(),
            required: Vec::new(),
            process,
        }
    }

    pub fn requires(mut self, kinds: &[PayloadKind]) -> Self {
        self.required = kinds.to_vec();
        self
    }
}

impl<F> Stage for FnStage<F>
where
    F: FnMut(&mut Envelope, &mut StageContext) -> Result<Disposition> + Send + 'static,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn required_payloads(&self) -> &[PayloadKind] {
        &self.required
    }

    fn process(&mut self, envelope: &mut Envelope, ctx: &mut StageContext) -> Result<Disposition> {
        (self.process)(envelope, ctx)
    }
}
