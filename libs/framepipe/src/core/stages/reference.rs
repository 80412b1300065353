// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Model-free collaborators for demos and tests.

use crate::core::frames::{ImageCrop, Mask, PromptPoint, Rect};
use crate::core::pool::BufferView;
use crate::core::traits::{Detection, PoseEstimate, PoseEstimator, Segmenter, Tracker};
use crate::core::Result;

/// Treats every pixel whose first channel is at least `threshold` as part of
/// one object and reports its bounding box under a fixed track id.
#[derive(Debug, Clone)]
pub struct CenterTracker {
    threshold: u8,
    track_id: u64,
}

impl CenterTracker {
    pub fn new(threshold: u8) -> Self {
        Self {
            threshold,
            track_id: 1,
        }
    }
}

impl Default for CenterTracker {
    fn default() -> Self {
        Self::new(128)
    }
}

impl Tracker for CenterTracker {
    fn track(&mut self, image: &BufferView<'_>) -> Result<Vec<Detection>> {
        let layout = image.layout();
        let pixel = layout.pixel_stride();
        let mut bounds: Option<Rect> = None;

        for y in 0..layout.height {
            let row = image.row(y);
            for x in 0..layout.width {
                if row[x as usize * pixel] < self.threshold {
                    continue;
                }
                let (x, y) = (x as i32, y as i32);
                bounds = Some(match bounds {
                    None => Rect::new(x, y, x + 1, y + 1),
                    Some(r) => Rect::new(r.x0.min(x), r.y0.min(y), r.x1.max(x + 1), r.y1.max(y + 1)),
                });
            }
        }

        Ok(bounds
            .map(|bbox| Detection {
                bbox,
                track_id: self.track_id,
            })
            .into_iter()
            .collect())
    }
}

/// Segments exactly the requested box.
#[derive(Debug, Clone, Default)]
pub struct BoxSegmenter;

impl Segmenter for BoxSegmenter {
    fn segment(
        &mut self,
        image: &BufferView<'_>,
        bbox: Rect,
        _hint_points: Option<&[PromptPoint]>,
    ) -> Result<Mask> {
        let layout = image.layout();
        Ok(Mask::filled(layout.width, layout.height, bbox))
    }
}

/// Never finds a pose.
#[derive(Debug, Clone, Default)]
pub struct NullPoseEstimator;

impl PoseEstimator for NullPoseEstimator {
    fn estimate_pose(&mut self, _crop: &ImageCrop) -> Result<PoseEstimate> {
        Ok(PoseEstimate::default())
    }
}
