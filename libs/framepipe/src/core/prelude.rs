// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Commonly used types for `use framepipe::prelude::*`.

pub use crate::core::{
    // Configuration
    config::PipelineConfig,

    // Envelopes and payloads
    envelope::{Envelope, PayloadKind, Terminal},

    // Errors
    error::{PipelineError, Result},

    // Stages
    executor::{Disposition, Stage, StageContext},
    frames::{BodyPart, FrameData, PoseData, SegmentationData, TrackingData},

    // Pool
    pool::{BufferView, FrameBufferPool, FrameHandle, FrameLayout},

    // Runtime
    runtime::{Pipeline, PipelineBuilder, ShutdownReport},

    // Collaborators
    traits::{FrameSource, PoseEstimator, Segmenter, Tracker},
};
