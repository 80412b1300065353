// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::collections::BTreeMap;

use crate::core::frames::TrackedTarget;
use crate::core::traits::Detection;

/// Filtering and retention rules for tracked targets.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetRegistryConfig {
    /// Boxes with area at or below this are ignored.
    pub min_box_area: i64,
    /// Boxes wider than `max_aspect_ratio` x their height are ignored.
    pub max_aspect_ratio: f32,
    /// Padding as a fraction of the larger box side.
    pub padding_ratio: f32,
    /// Frames a target survives without being seen.
    pub grace_frames: u64,
    /// Segmentation down-scale; boxes are snapped to multiples of it.
    pub down_scale: f32,
}

impl Default for TargetRegistryConfig {
    fn default() -> Self {
        Self {
            min_box_area: 10,
            max_aspect_ratio: 1.6,
            padding_ratio: 0.1,
            grace_frames: 15,
            down_scale: 1.0,
        }
    }
}

/// Keeps track ids alive across frames.
#[derive(Debug, Default)]
pub struct TargetRegistry {
    config: TargetRegistryConfig,
    targets: BTreeMap<u64, TrackedTarget>,
    current_frame: u64,
}

impl TargetRegistry {
    pub fn new(config: TargetRegistryConfig) -> Self {
        Self {
            config,
            targets: BTreeMap::new(),
            current_frame: 0,
        }
    }

    pub fn current_frame(&self) -> u64 {
        self.current_frame
    }

    /// Fold one frame of detections in and return the live targets.
    pub fn update(&mut self, detections: &[Detection], width: u32, height: u32) -> Vec<TrackedTarget> {
        let frame = self.current_frame;

        for detection in detections {
            let raw = detection.bbox;
            let padding = raw.width().max(raw.height()) as f32 * self.config.padding_ratio;
            let padded = raw.pad(padding);

            let divisor = self.config.down_scale as i32;
            let (bbox, padded_bbox) = if self.config.down_scale != 1.0 && divisor > 1 {
                (
                    raw.snap_outward(divisor).clip(width, height),
                    padded.snap_outward(divisor).clip(width, height),
                )
            } else {
                (raw.clip(width, height), padded.clip(width, height))
            };

            if bbox.area() <= self.config.min_box_area {
                continue;
            }
            if bbox.width() as f32 / bbox.height() as f32 > self.config.max_aspect_ratio {
                continue;
            }

            self.targets
                .entry(detection.track_id)
                .and_modify(|target| {
                    target.bbox = bbox;
                    target.padded_bbox = padded_bbox;
                    target.last_seen_frame = frame;
                    target.appearance_count += 1;
                })
                .or_insert(TrackedTarget {
                    track_id: detection.track_id,
                    bbox,
                    padded_bbox,
                    last_seen_frame: frame,
                    appearance_count: 1,
                });
        }

        let grace = self.config.grace_frames;
        self.targets
            .retain(|_, target| frame - target.last_seen_frame < grace);

        self.current_frame += 1;
        self.targets.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frames::Rect;

    fn detection(id: u64, bbox: Rect) -> Detection {
        Detection { bbox, track_id: id }
    }

    #[test]
    fn test_padding_and_clip() {
        let mut registry = TargetRegistry::new(TargetRegistryConfig::default());
        let targets = registry.update(&[detection(1, Rect::new(5, 0, 25, 40))], 100, 100);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].bbox, Rect::new(5, 0, 25, 40));
        // 10% of the taller side (40) = 4, clipped at the top.
        assert_eq!(targets[0].padded_bbox, Rect::new(1, 0, 29, 44));
    }

    #[test]
    fn test_rejects_small_and_wide_boxes() {
        let mut registry = TargetRegistry::new(TargetRegistryConfig::default());
        let targets = registry.update(
            &[
                detection(1, Rect::new(0, 0, 2, 5)),
                detection(2, Rect::new(0, 0, 50, 20)),
                detection(3, Rect::new(10, 10, 30, 50)),
            ],
            100,
            100,
        );
        assert_eq!(targets.iter().map(|t| t.track_id).collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn test_grace_window() {
        let mut registry = TargetRegistry::new(TargetRegistryConfig::default());
        let person = detection(7, Rect::new(10, 10, 30, 60));
        registry.update(&[person], 100, 100);
        registry.update(&[person], 100, 100);

        // Absent for 14 more frames: still reported.
        for _ in 0..14 {
            let targets = registry.update(&[], 100, 100);
            assert_eq!(targets.len(), 1);
            assert_eq!(targets[0].appearance_count, 2);
            assert_eq!(targets[0].last_seen_frame, 1);
        }
        // The 15th frame of absence drops it.
        assert!(registry.update(&[], 100, 100).is_empty());

        // Same id seen again starts fresh.
        let targets = registry.update(&[person], 100, 100);
        assert_eq!(targets[0].appearance_count, 1);
    }

    #[test]
    fn test_down_scale_snaps_boxes() {
        let mut registry = TargetRegistry::new(TargetRegistryConfig {
            down_scale: 4.0,
            ..TargetRegistryConfig::default()
        });
        let targets = registry.update(&[detection(1, Rect::new(5, 6, 21, 31))], 100, 100);
        let bbox = targets[0].bbox;
        assert_eq!(bbox, Rect::new(4, 4, 24, 32));
        for v in [bbox.x0, bbox.y0, bbox.x1, bbox.y1] {
            assert_eq!(v % 4, 0);
        }
    }
}
