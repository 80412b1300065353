// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use super::Rect;

/// Binary mask, row-major.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Mask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl Mask {
    /// All-background mask.
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width as usize * height as usize],
        }
    }

    /// Mask with `rect` (clipped) set.
    pub fn filled(width: u32, height: u32, rect: Rect) -> Self {
        let mut mask = Self::empty(width, height);
        let rect = rect.clip(width, height);
        for y in rect.y0..rect.y1 {
            for x in rect.x0..rect.x1 {
                mask.set(x as u32, y as u32, true);
            }
        }
        mask
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.bits[(y * self.width + x) as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        if x < self.width && y < self.height {
            self.bits[(y * self.width + x) as usize] = value;
        }
    }

    /// Number of foreground pixels.
    pub fn count(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }

    /// Copy of the `rect` region, clipped to the mask.
    pub fn cut(&self, rect: Rect) -> Mask {
        let rect = rect.clip(self.width, self.height);
        if rect.is_empty() {
            return Mask::empty(0, 0);
        }
        let width = rect.width() as u32;
        let height = rect.height() as u32;
        let mut bits = Vec::with_capacity(width as usize * height as usize);
        for y in rect.y0..rect.y1 {
            let start = (y as u32 * self.width + rect.x0 as u32) as usize;
            bits.extend_from_slice(&self.bits[start..start + width as usize]);
        }
        Mask {
            width,
            height,
            bits,
        }
    }
}

/// Mask of one target, cut to its padded box.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetMask {
    pub track_id: u64,
    /// Top-left corner of the cut-out in (scaled) frame coordinates.
    pub origin: (i32, i32),
    pub mask: Mask,
}

/// Segmentation payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentationData {
    pub masks: Vec<TargetMask>,
    /// Down-scale factor the masks were computed at; 1.0 is full resolution.
    pub mask_scale: f32,
}
