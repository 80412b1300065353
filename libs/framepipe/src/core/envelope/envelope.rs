// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::Arc;
use std::time::Instant;

use super::{EnvelopePayload, Payload, PayloadKind};
use crate::core::frames::FrameData;
use crate::core::pool::{FrameBufferPool, FrameHandle};
use crate::core::{PipelineError, Result};

/// Terminal marker of an envelope.
#[derive(Debug, Clone)]
pub enum Terminal {
    /// Cooperative shutdown.
    Close,
    /// A stage failed; downstream stages forward this and stop.
    CloseWithError(Arc<PipelineError>),
}

impl Terminal {
    pub fn error(&self) -> Option<&Arc<PipelineError>> {
        match self {
            Terminal::Close => None,
            Terminal::CloseWithError(error) => Some(error),
        }
    }
}

/// The message moved through every channel hop.
///
/// Stages add their own payload kind and leave the others alone. Envelopes
/// are not `Clone`: the frame handle they may carry has exactly one owner.
pub struct Envelope {
    payloads: [Option<Payload>; PayloadKind::COUNT],
    created_at: Instant,
    sequence: u64,
    terminal: Option<Terminal>,
}

impl Envelope {
    /// Empty data envelope timestamped now.
    pub fn new(sequence: u64) -> Self {
        Self {
            payloads: Default::default(),
            created_at: Instant::now(),
            sequence,
            terminal: None,
        }
    }

    pub fn with_created_at(mut self, created_at: Instant) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn close() -> Self {
        Self::terminal(Terminal::Close)
    }

    pub fn close_with_error(error: impl Into<Arc<PipelineError>>) -> Self {
        Self::terminal(Terminal::CloseWithError(error.into()))
    }

    pub fn terminal(terminal: Terminal) -> Self {
        Self {
            terminal: Some(terminal),
            ..Self::new(0)
        }
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal.is_some()
    }

    pub fn terminal_marker(&self) -> Option<&Terminal> {
        self.terminal.as_ref()
    }

    /// Add (or overwrite) a payload. Terminal envelopes reject payloads.
    pub fn insert<T: EnvelopePayload>(&mut self, payload: T) -> Result<()> {
        if self.is_terminal() {
            return Err(PipelineError::EnvelopeClosed);
        }
        self.payloads[T::KIND.index()] = Some(payload.into_payload());
        Ok(())
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with<T: EnvelopePayload>(mut self, payload: T) -> Result<Self> {
        self.insert(payload)?;
        Ok(self)
    }

    pub fn get<T: EnvelopePayload>(&self) -> Option<&T> {
        self.payloads[T::KIND.index()]
            .as_ref()
            .and_then(T::from_payload)
    }

    pub fn get_mut<T: EnvelopePayload>(&mut self) -> Option<&mut T> {
        if self.is_terminal() {
            return None;
        }
        self.payloads[T::KIND.index()]
            .as_mut()
            .and_then(T::from_payload_mut)
    }

    pub fn has(&self, kind: PayloadKind) -> bool {
        self.payloads[kind.index()].is_some()
    }

    pub fn contains<T: EnvelopePayload>(&self) -> bool {
        self.has(T::KIND)
    }

    /// Kinds currently present, in declaration order.
    pub fn kinds(&self) -> impl Iterator<Item = PayloadKind> + '_ {
        PayloadKind::ALL.into_iter().filter(|kind| self.has(*kind))
    }

    /// First kind of `required` that is absent.
    pub fn first_missing(&self, required: &[PayloadKind]) -> Option<PayloadKind> {
        required.iter().copied().find(|kind| !self.has(*kind))
    }

    pub fn frame(&self) -> Option<&FrameData> {
        self.get::<FrameData>()
    }

    pub fn frame_handle(&self) -> Option<&FrameHandle> {
        self.frame().and_then(FrameData::handle)
    }

    /// Remove the frame payload and return its handle to `pool`.
    ///
    /// Returns whether a pool slot was released. Inline frames are dropped.
    pub fn release_frame(&mut self, pool: Option<&FrameBufferPool>) -> Result<bool> {
        let Some(frame) = self.payloads[PayloadKind::Frame.index()]
            .take()
            .and_then(FrameData::take_from)
        else {
            return Ok(false);
        };
        match (frame.into_handle(), pool) {
            (Some(handle), Some(pool)) => pool.release(handle).map(|_| true),
            (Some(handle), None) => Err(PipelineError::InvalidHandle {
                handle: handle.id(),
                reason: "pooled frame released without a pool".into(),
            }),
            (None, _) => Ok(false),
        }
    }
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope")
            .field("sequence", &self.sequence)
            .field("kinds", &self.kinds().collect::<Vec<_>>())
            .field("terminal", &self.terminal)
            .finish()
    }
}
