// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod frame_data;
mod geometry;
mod image;
mod pose;
mod segmentation;
mod tracking;

pub use frame_data::{FrameData, FrameRef};
pub use geometry::{Point, Rect};
pub use image::ImageCrop;
pub use pose::{
    BodyPart, BodyPartSelector, Landmark, PoseData, PromptPoint, RawPoseHandle, TargetPose,
    DEFAULT_VISIBILITY_THRESHOLD, LANDMARK_COUNT,
};
pub use segmentation::{Mask, SegmentationData, TargetMask};
pub use tracking::{TrackedTarget, TrackingData};
