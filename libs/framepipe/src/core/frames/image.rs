// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Owned image copies handed to collaborators: crops and down-scaled frames.

use super::Rect;
use crate::core::pool::{BufferView, FrameLayout};

/// Owned pixels with their layout and position inside the source frame.
#[derive(Debug, Clone)]
pub struct ImageCrop {
    data: Vec<u8>,
    layout: FrameLayout,
    origin: (i32, i32),
}

impl ImageCrop {
    /// Copy `region` (clipped to the frame) out of `frame`.
    pub fn from_region(frame: &BufferView<'_>, region: Rect) -> Self {
        let layout = frame.layout();
        let region = region.clip(layout.width, layout.height);
        let width = region.width().max(0) as u32;
        let height = region.height().max(0) as u32;
        let crop_layout = FrameLayout {
            width,
            height,
            ..layout
        };

        let pixel = layout.pixel_stride();
        let mut data = Vec::with_capacity(crop_layout.byte_len());
        for y in region.y0..region.y0 + height as i32 {
            let row = frame.row(y as u32);
            let start = region.x0 as usize * pixel;
            data.extend_from_slice(&row[start..start + width as usize * pixel]);
        }

        Self {
            data,
            layout: crop_layout,
            origin: (region.x0, region.y0),
        }
    }

    /// Nearest-neighbour resize of the whole frame to `1 / factor` of its size.
    pub fn downscaled(frame: &BufferView<'_>, factor: f32) -> Self {
        let layout = frame.layout();
        if factor <= 1.0 {
            return Self {
                data: frame.as_bytes().to_vec(),
                layout,
                origin: (0, 0),
            };
        }

        let width = ((layout.width as f32 / factor) as u32).max(1);
        let height = ((layout.height as f32 / factor) as u32).max(1);
        let scaled = FrameLayout {
            width,
            height,
            ..layout
        };
        let pixel = layout.pixel_stride();
        let mut data = Vec::with_capacity(scaled.byte_len());
        for y in 0..height {
            let src_y = ((y as f32 * factor) as u32).min(layout.height - 1);
            let row = frame.row(src_y);
            for x in 0..width {
                let src_x = ((x as f32 * factor) as u32).min(layout.width - 1) as usize;
                data.extend_from_slice(&row[src_x * pixel..(src_x + 1) * pixel]);
            }
        }

        Self {
            data,
            layout: scaled,
            origin: (0, 0),
        }
    }

    pub fn view(&self) -> BufferView<'_> {
        BufferView::new(&self.data, self.layout)
    }

    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    pub fn origin(&self) -> (i32, i32) {
        self.origin
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
