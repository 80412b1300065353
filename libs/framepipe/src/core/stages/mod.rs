// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod pose_stage;
mod reference;
mod segmentation_stage;
mod target_registry;
mod tracking_stage;

pub use pose_stage::{PoseStage, POSE_STAGE_ID};
pub use reference::{BoxSegmenter, CenterTracker, NullPoseEstimator};
pub use segmentation_stage::SegmentationStage;
pub use target_registry::{TargetRegistry, TargetRegistryConfig};
pub use tracking_stage::{TrackingStage, TRACKING_STAGE_ID};
