// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use serde::{Deserialize, Serialize};

/// Element type of one channel of one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    #[default]
    U8,
    U16,
    F32,
}

impl ElementType {
    pub fn size(&self) -> usize {
        match self {
            ElementType::U8 => 1,
            ElementType::U16 => 2,
            ElementType::F32 => 4,
        }
    }
}

/// Byte layout of a frame: dimensions × element type.
///
/// Fixed once when a pool is created; every buffer in the pool has exactly
/// this layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameLayout {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    #[serde(default)]
    pub element: ElementType,
}

impl FrameLayout {
    /// Create an 8-bit layout.
    pub fn new(width: u32, height: u32, channels: u32) -> Self {
        Self {
            width,
            height,
            channels,
            element: ElementType::U8,
        }
    }

    pub fn with_element(mut self, element: ElementType) -> Self {
        self.element = element;
        self
    }

    /// Bytes per pixel (all channels).
    pub fn pixel_stride(&self) -> usize {
        self.channels as usize * self.element.size()
    }

    /// Bytes per row.
    pub fn row_stride(&self) -> usize {
        self.width as usize * self.pixel_stride()
    }

    pub fn byte_len(&self) -> usize {
        self.height as usize * self.row_stride()
    }
}

impl Default for FrameLayout {
    fn default() -> Self {
        Self::new(1920, 1080, 3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_len() {
        assert_eq!(FrameLayout::new(4, 4, 1).byte_len(), 16);
        assert_eq!(FrameLayout::new(1920, 1080, 3).byte_len(), 6_220_800);
        assert_eq!(
            FrameLayout::new(2, 3, 2)
                .with_element(ElementType::F32)
                .byte_len(),
            48
        );
    }

    #[test]
    fn test_strides() {
        let layout = FrameLayout::new(10, 5, 3).with_element(ElementType::U16);
        assert_eq!(layout.pixel_stride(), 6);
        assert_eq!(layout.row_stride(), 60);
    }
}
