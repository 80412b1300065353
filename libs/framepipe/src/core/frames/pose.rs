// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::any::Any;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::Point;

/// Number of combined landmarks a pose estimator reports per target.
pub const LANDMARK_COUNT: usize = 19;

/// Default visibility a landmark needs to become a prompt point.
pub const DEFAULT_VISIBILITY_THRESHOLD: f32 = 0.5;

/// Landmark selection per body part: 1 = foreground prompt, 0 = background
/// prompt, -1 = ignored. Indexed by `BodyPart as usize - 1`.
const BODY_POINTS: [[i8; LANDMARK_COUNT]; 4] = [
    // LeftArm
    [-1, 1, -1, 1, -1, 1, -1, -1, -1, -1, -1, -1, -1, -1, -1, 0, 0, 0, 0],
    // RightArm
    [-1, -1, 1, -1, 1, -1, 1, -1, -1, -1, -1, -1, -1, -1, -1, 0, 0, 0, 0],
    // BothArms
    [1, 1, 1, 1, 1, 1, 1, -1, -1, -1, -1, -1, -1, -1, -1, 0, 0, 0, 0],
    // OnlyFace
    [1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, 0, 0, -1, -1],
];

/// One landmark in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub visibility: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32, visibility: f32) -> Self {
        Self { x, y, z, visibility }
    }
}

/// Body part segmentation is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum BodyPart {
    #[default]
    All = 0,
    LeftArm = 1,
    RightArm = 2,
    BothArms = 3,
    OnlyFace = 4,
}

impl BodyPart {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(BodyPart::All),
            1 => Some(BodyPart::LeftArm),
            2 => Some(BodyPart::RightArm),
            3 => Some(BodyPart::BothArms),
            4 => Some(BodyPart::OnlyFace),
            _ => None,
        }
    }

    /// Prompt mode of landmark `index`: `Some(true)` foreground,
    /// `Some(false)` background, `None` not used.
    fn point_mode(&self, index: usize) -> Option<bool> {
        let table = match self {
            BodyPart::All => return Some(true),
            part => &BODY_POINTS[*part as usize - 1],
        };
        match table.get(index) {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        }
    }
}

/// Body part shared between the driver and the segmentation workers.
///
/// The driver may switch it at any time; workers read it once per frame.
#[derive(Debug, Clone, Default)]
pub struct BodyPartSelector(Arc<AtomicU8>);

impl BodyPartSelector {
    pub fn new(part: BodyPart) -> Self {
        Self(Arc::new(AtomicU8::new(part as u8)))
    }

    pub fn get(&self) -> BodyPart {
        BodyPart::from_u8(self.0.load(Ordering::Relaxed)).unwrap_or_default()
    }

    pub fn set(&self, part: BodyPart) {
        self.0.store(part as u8, Ordering::Relaxed);
    }
}

/// Prompt point for the segmenter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PromptPoint {
    pub point: Point,
    /// `true` marks the point as part of the object, `false` as background.
    pub foreground: bool,
}

/// Estimator-specific pose result, passed through untouched.
#[derive(Clone)]
pub struct RawPoseHandle(pub Arc<dyn Any + Send + Sync>);

impl RawPoseHandle {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl std::fmt::Debug for RawPoseHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RawPoseHandle(..)")
    }
}

/// Pose of one tracked target. Empty landmarks mean no pose was found.
#[derive(Debug, Clone, Default)]
pub struct TargetPose {
    pub landmarks: Vec<Landmark>,
    pub raw: Option<RawPoseHandle>,
}

/// Pose payload, one entry per target of the frame's `TrackingData`.
#[derive(Debug, Clone, Default)]
pub struct PoseData {
    pub poses: Vec<TargetPose>,
}

impl PoseData {
    pub fn get(&self, target: usize) -> Option<&TargetPose> {
        self.poses.get(target)
    }

    /// Visible landmarks of `target` as segmentation prompts.
    ///
    /// Returns `None` when the target has no pose. With a specific body part
    /// only that part's landmarks are used, each with its prompt mode.
    pub fn landmarks_xy(
        &self,
        target: usize,
        body_part: BodyPart,
        visibility_threshold: f32,
    ) -> Option<Vec<PromptPoint>> {
        let pose = self.poses.get(target)?;
        if pose.landmarks.is_empty() {
            return None;
        }

        let points = pose
            .landmarks
            .iter()
            .enumerate()
            .filter(|(_, landmark)| landmark.visibility > visibility_threshold)
            .filter_map(|(index, landmark)| {
                body_part.point_mode(index).map(|foreground| PromptPoint {
                    point: Point::new(landmark.x, landmark.y),
                    foreground,
                })
            })
            .collect();
        Some(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pose_with_visibility(visibility: f32) -> PoseData {
        let landmarks = (0..LANDMARK_COUNT)
            .map(|i| Landmark::new(i as f32, i as f32 * 2.0, 0.0, visibility))
            .collect();
        PoseData {
            poses: vec![TargetPose {
                landmarks,
                raw: None,
            }],
        }
    }

    #[test]
    fn test_all_landmarks_are_foreground() {
        let pose = pose_with_visibility(0.9);
        let points = pose.landmarks_xy(0, BodyPart::All, 0.5).unwrap();
        assert_eq!(points.len(), LANDMARK_COUNT);
        assert!(points.iter().all(|p| p.foreground));
        assert_eq!(points[3].point, Point::new(3.0, 6.0));
    }

    #[test]
    fn test_left_arm_selection() {
        let pose = pose_with_visibility(0.9);
        let points = pose.landmarks_xy(0, BodyPart::LeftArm, 0.5).unwrap();
        let foreground: Vec<f32> = points
            .iter()
            .filter(|p| p.foreground)
            .map(|p| p.point.x)
            .collect();
        assert_eq!(foreground, vec![1.0, 3.0, 5.0]);
        assert_eq!(points.iter().filter(|p| !p.foreground).count(), 4);
    }

    #[test]
    fn test_only_face_selection() {
        let pose = pose_with_visibility(0.9);
        let points = pose.landmarks_xy(0, BodyPart::OnlyFace, 0.5).unwrap();
        assert_eq!(points.len(), 3);
        assert!(points[0].foreground);
        assert_eq!(points[0].point.x, 0.0);
    }

    #[test]
    fn test_invisible_landmarks_dropped() {
        let pose = pose_with_visibility(0.4);
        assert!(pose.landmarks_xy(0, BodyPart::All, 0.5).unwrap().is_empty());
    }

    #[test]
    fn test_missing_pose() {
        let pose = PoseData {
            poses: vec![TargetPose::default()],
        };
        assert!(pose.landmarks_xy(0, BodyPart::All, 0.5).is_none());
        assert!(pose.landmarks_xy(7, BodyPart::All, 0.5).is_none());
    }

    #[test]
    fn test_selector_shared() {
        let selector = BodyPartSelector::new(BodyPart::All);
        let worker_view = selector.clone();
        selector.set(BodyPart::RightArm);
        assert_eq!(worker_view.get(), BodyPart::RightArm);
    }
}
