// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use crate::core::envelope::{Envelope, PayloadKind};
use crate::core::executor::{Disposition, Stage, StageContext};
use crate::core::frames::{ImageCrop, PoseData, TargetPose, TrackingData};
use crate::core::traits::PoseEstimator;
use crate::core::{PipelineError, Result};

pub const POSE_STAGE_ID: &str = "pose";

/// Estimates a pose per tracked target and adds `PoseData`.
///
/// Each target is cropped to its padded box; landmarks come back in crop
/// coordinates and are shifted into frame coordinates here.
pub struct PoseStage {
    estimator: Box<dyn PoseEstimator>,
}

impl PoseStage {
    pub fn new(estimator: Box<dyn PoseEstimator>) -> Self {
        Self { estimator }
    }
}

impl Stage for PoseStage {
    fn id(&self) -> &str {
        POSE_STAGE_ID
    }

    fn required_payloads(&self) -> &[PayloadKind] {
        &[PayloadKind::Frame, PayloadKind::Tracking]
    }

    fn process(&mut self, envelope: &mut Envelope, ctx: &mut StageContext) -> Result<Disposition> {
        let pose = {
            let image = ctx.frame(envelope)?;
            let tracking = envelope
                .get::<TrackingData>()
                .ok_or_else(|| PipelineError::MissingPayload {
                    stage: POSE_STAGE_ID.into(),
                    kind: PayloadKind::Tracking,
                })?;

            let mut poses = Vec::with_capacity(tracking.len());
            for target in &tracking.targets {
                let crop = ImageCrop::from_region(&image, target.padded_bbox);
                if crop.is_empty() {
                    poses.push(TargetPose::default());
                    continue;
                }
                let estimate = self.estimator.estimate_pose(&crop)?;
                let (dx, dy) = crop.origin();
                let landmarks = estimate
                    .landmarks
                    .into_iter()
                    .map(|mut landmark| {
                        landmark.x += dx as f32;
                        landmark.y += dy as f32;
                        landmark
                    })
                    .collect();
                poses.push(TargetPose {
                    landmarks,
                    raw: estimate.raw,
                });
            }
            PoseData { poses }
        };
        envelope.insert(pose)?;
        Ok(Disposition::Publish)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frames::{FrameData, Landmark, Rect, TrackedTarget};
    use crate::core::pool::FrameLayout;
    use crate::core::traits::PoseEstimate;
    use std::sync::Arc;

    struct CornerPose;

    impl PoseEstimator for CornerPose {
        fn estimate_pose(&mut self, crop: &ImageCrop) -> Result<PoseEstimate> {
            Ok(PoseEstimate {
                landmarks: vec![Landmark::new(
                    crop.layout().width as f32,
                    crop.layout().height as f32,
                    0.0,
                    1.0,
                )],
                raw: None,
            })
        }
    }

    #[test]
    fn test_landmarks_offset_into_frame() {
        let layout = FrameLayout::new(20, 20, 1);
        let frame = FrameData::inline(Arc::from(vec![0u8; 400]), layout).unwrap();
        let tracking = TrackingData {
            targets: vec![TrackedTarget {
                track_id: 1,
                bbox: Rect::new(6, 6, 10, 12),
                padded_bbox: Rect::new(5, 4, 11, 14),
                last_seen_frame: 0,
                appearance_count: 1,
            }],
            frame_index: 0,
        };
        let mut env = Envelope::new(0).with(frame).unwrap().with(tracking).unwrap();
        let mut ctx = StageContext::new(POSE_STAGE_ID, None);

        let mut stage = PoseStage::new(Box::new(CornerPose));
        assert_eq!(stage.process(&mut env, &mut ctx).unwrap(), Disposition::Publish);

        let pose = env.get::<PoseData>().unwrap();
        let landmark = pose.poses[0].landmarks[0];
        // Crop is 6x10 at (5, 4).
        assert_eq!((landmark.x, landmark.y), (11.0, 14.0));
    }
}
