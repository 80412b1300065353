// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use crate::core::envelope::{Envelope, PayloadKind};
use crate::core::executor::{Disposition, Stage, StageContext};
use crate::core::frames::{
    BodyPart, BodyPartSelector, ImageCrop, PoseData, PromptPoint, Rect, SegmentationData,
    TargetMask, TrackingData, DEFAULT_VISIBILITY_THRESHOLD,
};
use crate::core::pool::BufferView;
use crate::core::traits::Segmenter;
use crate::core::{PipelineError, Result};

/// Share of the smaller box side kept around the selected body part.
const BODY_PART_PADDING: f32 = 0.25;

/// One segmentation worker. Several may share an input channel.
pub struct SegmentationStage {
    id: String,
    segmenter: Box<dyn Segmenter>,
    down_scale: f32,
    body_part: BodyPartSelector,
}

impl SegmentationStage {
    pub fn new(
        worker: usize,
        segmenter: Box<dyn Segmenter>,
        down_scale: f32,
        body_part: BodyPartSelector,
    ) -> Self {
        Self {
            id: format!("segmentation-{}", worker),
            segmenter,
            down_scale,
            body_part,
        }
    }
}

/// Shrink `bbox` to the foreground prompts of a single body part, keeping
/// `padding` pixels around them. The box never grows.
fn narrow_to_prompts(bbox: Rect, prompts: &[PromptPoint], width: u32, height: u32) -> Rect {
    let foreground: Vec<_> = prompts.iter().filter(|p| p.foreground).collect();
    if foreground.is_empty() {
        return bbox;
    }
    let padding = bbox.width().min(bbox.height()) as f32 * BODY_PART_PADDING;

    let min_x = foreground.iter().map(|p| p.point.x).fold(f32::INFINITY, f32::min);
    let max_x = foreground.iter().map(|p| p.point.x).fold(f32::NEG_INFINITY, f32::max);
    let min_y = foreground.iter().map(|p| p.point.y).fold(f32::INFINITY, f32::min);
    let max_y = foreground.iter().map(|p| p.point.y).fold(f32::NEG_INFINITY, f32::max);

    Rect {
        x0: bbox.x0.max((min_x - padding) as i32),
        y0: bbox.y0.max((min_y - padding) as i32),
        x1: bbox.x1.min((max_x + padding) as i32),
        y1: bbox.y1.min((max_y + padding) as i32),
    }
    .clip(width, height)
}

impl Stage for SegmentationStage {
    fn id(&self) -> &str {
        &self.id
    }

    fn required_payloads(&self) -> &[PayloadKind] {
        &[PayloadKind::Frame, PayloadKind::Tracking]
    }

    fn process(&mut self, envelope: &mut Envelope, ctx: &mut StageContext) -> Result<Disposition> {
        let body_part = self.body_part.get();
        let scale = self.down_scale;

        let segmentation = {
            let frame = ctx.frame(envelope)?;
            let scaled;
            let image: BufferView<'_> = if scale > 1.0 {
                scaled = ImageCrop::downscaled(&frame, scale);
                scaled.view()
            } else {
                frame
            };
            let layout = image.layout();

            let tracking = envelope
                .get::<TrackingData>()
                .ok_or_else(|| PipelineError::MissingPayload {
                    stage: self.id.clone(),
                    kind: PayloadKind::Tracking,
                })?;
            let pose = envelope.get::<PoseData>();

            let mut masks = Vec::with_capacity(tracking.len());
            for (index, target) in tracking.targets.iter().enumerate() {
                let mut bbox = target.bbox.scale_down(scale);
                let padded = target.padded_bbox.scale_down(scale);

                let prompts: Option<Vec<PromptPoint>> = pose
                    .and_then(|pose| pose.landmarks_xy(index, body_part, DEFAULT_VISIBILITY_THRESHOLD))
                    .map(|points| {
                        points
                            .into_iter()
                            .map(|mut p| {
                                p.point.x /= scale;
                                p.point.y /= scale;
                                p
                            })
                            .collect()
                    });

                if body_part != BodyPart::All {
                    if let Some(prompts) = &prompts {
                        bbox = narrow_to_prompts(bbox, prompts, layout.width, layout.height);
                    }
                }

                let mask = self
                    .segmenter
                    .segment(&image, bbox, prompts.as_deref())?;
                let cut = mask.cut(padded);
                if cut.is_empty() {
                    tracing::warn!(
                        "[{}] Empty mask for target {} (box {:?}, padded {:?})",
                        self.id,
                        target.track_id,
                        target.bbox,
                        target.padded_bbox
                    );
                }
                masks.push(TargetMask {
                    track_id: target.track_id,
                    origin: (padded.x0.max(0), padded.y0.max(0)),
                    mask: cut,
                });
            }

            SegmentationData {
                masks,
                mask_scale: scale,
            }
        };

        envelope.insert(segmentation)?;
        Ok(Disposition::Publish)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frames::{FrameData, Landmark, Mask, Point, TargetPose, TrackedTarget};
    use crate::core::pool::FrameLayout;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Fills the requested box and remembers what it was asked for.
    struct RecordingSegmenter {
        calls: Arc<Mutex<Vec<(Rect, usize, u32)>>>,
    }

    impl Segmenter for RecordingSegmenter {
        fn segment(
            &mut self,
            image: &BufferView<'_>,
            bbox: Rect,
            hint_points: Option<&[PromptPoint]>,
        ) -> Result<Mask> {
            self.calls.lock().push((
                bbox,
                hint_points.map_or(0, |p| p.len()),
                image.layout().width,
            ));
            Ok(Mask::filled(image.layout().width, image.layout().height, bbox))
        }
    }

    fn envelope(layout: FrameLayout, pose: Option<PoseData>) -> Envelope {
        let frame = FrameData::inline(Arc::from(vec![0u8; layout.byte_len()]), layout).unwrap();
        let tracking = TrackingData {
            targets: vec![TrackedTarget {
                track_id: 9,
                bbox: Rect::new(8, 8, 32, 56),
                padded_bbox: Rect::new(4, 4, 36, 60),
                last_seen_frame: 0,
                appearance_count: 3,
            }],
            frame_index: 0,
        };
        let mut env = Envelope::new(0).with(frame).unwrap().with(tracking).unwrap();
        if let Some(pose) = pose {
            env.insert(pose).unwrap();
        }
        env
    }

    fn stage(down_scale: f32, part: BodyPart) -> (SegmentationStage, Arc<Mutex<Vec<(Rect, usize, u32)>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let stage = SegmentationStage::new(
            0,
            Box::new(RecordingSegmenter {
                calls: Arc::clone(&calls),
            }),
            down_scale,
            BodyPartSelector::new(part),
        );
        (stage, calls)
    }

    #[test]
    fn test_mask_cut_to_padded_box() {
        let (mut stage, calls) = stage(1.0, BodyPart::All);
        let mut env = envelope(FrameLayout::new(64, 64, 1), None);
        let mut ctx = StageContext::new("segmentation-0", None);
        stage.process(&mut env, &mut ctx).unwrap();

        let data = env.get::<SegmentationData>().unwrap();
        assert_eq!(data.mask_scale, 1.0);
        let target = &data.masks[0];
        assert_eq!(target.track_id, 9);
        assert_eq!(target.origin, (4, 4));
        assert_eq!((target.mask.width(), target.mask.height()), (32, 56));
        assert_eq!(target.mask.count(), 24 * 48);
        assert_eq!(calls.lock()[0], (Rect::new(8, 8, 32, 56), 0, 64));
    }

    #[test]
    fn test_down_scale_applies_to_image_and_boxes() {
        let (mut stage, calls) = stage(2.0, BodyPart::All);
        let mut env = envelope(FrameLayout::new(64, 64, 1), None);
        let mut ctx = StageContext::new("segmentation-0", None);
        stage.process(&mut env, &mut ctx).unwrap();

        assert_eq!(calls.lock()[0], (Rect::new(4, 4, 16, 28), 0, 32));
        let data = env.get::<SegmentationData>().unwrap();
        assert_eq!(data.mask_scale, 2.0);
        assert_eq!(data.masks[0].origin, (2, 2));
    }

    #[test]
    fn test_body_part_narrows_box() {
        // Left arm uses landmarks 1, 3 and 5 as foreground.
        let mut landmarks = vec![Landmark::new(0.0, 0.0, 0.0, 0.0); 19];
        landmarks[1] = Landmark::new(20.0, 20.0, 0.0, 0.9);
        landmarks[3] = Landmark::new(22.0, 30.0, 0.0, 0.9);
        landmarks[5] = Landmark::new(24.0, 40.0, 0.0, 0.9);
        let pose = PoseData {
            poses: vec![TargetPose {
                landmarks,
                raw: None,
            }],
        };

        let (mut stage, calls) = stage(1.0, BodyPart::LeftArm);
        let mut env = envelope(FrameLayout::new(64, 64, 1), Some(pose));
        let mut ctx = StageContext::new("segmentation-0", None);
        stage.process(&mut env, &mut ctx).unwrap();

        // padding = min(24, 48) * 0.25 = 6
        let (bbox, prompts, _) = calls.lock()[0];
        assert_eq!(bbox, Rect::new(14, 14, 30, 46));
        assert_eq!(prompts, 3);
    }

    #[test]
    fn test_narrow_ignores_background_points() {
        let prompts = [PromptPoint {
            point: Point::new(50.0, 50.0),
            foreground: false,
        }];
        let bbox = Rect::new(0, 0, 10, 10);
        assert_eq!(narrow_to_prompts(bbox, &prompts, 64, 64), bbox);
    }
}
