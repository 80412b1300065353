// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use serde::{Deserialize, Serialize};

use super::Rect;

/// A person (or other object) followed across frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedTarget {
    pub track_id: u64,
    pub bbox: Rect,
    /// `bbox` grown by the padding ratio, used for crops and mask cut-outs.
    pub padded_bbox: Rect,
    /// Tracker frame index the target was last seen in.
    pub last_seen_frame: u64,
    /// Number of frames the target was seen in.
    pub appearance_count: u32,
}

/// Tracking payload: every target currently inside its grace window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackingData {
    pub targets: Vec<TrackedTarget>,
    pub frame_index: u64,
}

impl TrackingData {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TrackedTarget> {
        self.targets.get(index)
    }

    pub fn by_track_id(&self, track_id: u64) -> Option<&TrackedTarget> {
        self.targets.iter().find(|t| t.track_id == track_id)
    }
}
