// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

pub mod collaborators;
pub mod frame_source;

pub use collaborators::{Detection, PoseEstimate, PoseEstimator, Segmenter, Tracker};
pub use frame_source::FrameSource;
