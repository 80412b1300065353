// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Model interfaces the built-in stages call into.
//!
//! Implementations see pixels and boxes only; they never touch channels or
//! the pool. Each one is owned by a single stage thread, so `&mut self` is
//! fine for stateful trackers and sessions.

use crate::core::frames::{ImageCrop, Landmark, Mask, PromptPoint, RawPoseHandle, Rect};
use crate::core::pool::BufferView;
use crate::core::Result;

/// One detection with the tracker's identity assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub bbox: Rect,
    pub track_id: u64,
}

/// Object detection plus multi-object tracking.
pub trait Tracker: Send + 'static {
    fn track(&mut self, image: &BufferView<'_>) -> Result<Vec<Detection>>;
}

/// Promptable segmentation.
pub trait Segmenter: Send + 'static {
    /// Mask covering the whole of `image` for the object inside `bbox`.
    fn segment(
        &mut self,
        image: &BufferView<'_>,
        bbox: Rect,
        hint_points: Option<&[PromptPoint]>,
    ) -> Result<Mask>;
}

/// Landmarks found in a crop, in crop coordinates.
#[derive(Debug, Clone, Default)]
pub struct PoseEstimate {
    /// Empty when no pose was found.
    pub landmarks: Vec<Landmark>,
    pub raw: Option<RawPoseHandle>,
}

/// Pose estimation on a single-person crop.
pub trait PoseEstimator: Send + 'static {
    fn estimate_pose(&mut self, crop: &ImageCrop) -> Result<PoseEstimate>;
}
