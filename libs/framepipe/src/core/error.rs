// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::time::Duration;

use thiserror::Error;

use crate::core::envelope::PayloadKind;
use crate::core::pool::FrameHandleId;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Frame pool exhausted (no free slot after {timeout:?})")]
    PoolExhausted { timeout: Option<Duration> },

    #[error("Invalid frame handle {handle}: {reason}")]
    InvalidHandle { handle: FrameHandleId, reason: String },

    #[error("Frame handle {0} released twice")]
    DoubleRelease(FrameHandleId),

    #[error("Frame pool is shut down")]
    PoolClosed,

    #[error("Frame pool still has {outstanding} checked-out slot(s)")]
    PoolBusy { outstanding: usize },

    #[error("Frame layout mismatch: expected {expected} bytes, got {actual}")]
    LayoutMismatch { expected: usize, actual: usize },

    #[error("[{stage}] Missing data in pipeline envelope: {kind:?}")]
    MissingPayload { stage: String, kind: PayloadKind },

    #[error("Envelope is closed and cannot carry payloads")]
    EnvelopeClosed,

    #[error("[{stage}] Stage failed: {message}")]
    Stage { stage: String, message: String },

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    /// Contract violations on the frame pool; fatal to the stage that hits them.
    pub fn is_handle_violation(&self) -> bool {
        matches!(
            self,
            PipelineError::InvalidHandle { .. } | PipelineError::DoubleRelease(_)
        )
    }

    pub(crate) fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::Stage {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
