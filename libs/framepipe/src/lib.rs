// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Real-time frame pipeline: a shared frame buffer pool, typed envelopes,
//! latest-frame-wins stage channels and a threaded stage runtime.

#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]

pub mod core;

pub use crate::core::prelude;

pub use crate::core::{
    BodyPart, BodyPartSelector, BoxSegmenter, CenterTracker, Disposition, Envelope, FnStage,
    FrameBufferPool, FrameData, FrameHandle, FrameHandleId, FrameLayout, FramePoolConfig, FrameSource,
    NullPoseEstimator, PayloadKind, Pipeline, PipelineBuilder, PipelineConfig, PipelineError,
    PipelineStatus, PoseEstimator, Result, Segmenter, ShutdownReport, Stage, StageContext,
    SyntheticSource, Terminal, Tracker,
};
