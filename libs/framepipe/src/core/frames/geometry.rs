// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use serde::{Deserialize, Serialize};

/// Axis-aligned box in pixel coordinates, `x1`/`y1` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl Rect {
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> i32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> i32 {
        self.y1 - self.y0
    }

    /// Area, zero for degenerate boxes.
    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width() as i64 * self.height() as i64
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// Clip to an image of `width` x `height`.
    pub fn clip(&self, width: u32, height: u32) -> Self {
        let (w, h) = (width as i32, height as i32);
        Self {
            x0: self.x0.clamp(0, w),
            y0: self.y0.clamp(0, h),
            x1: self.x1.clamp(0, w),
            y1: self.y1.clamp(0, h),
        }
    }

    /// Grow on every side by `amount` pixels (truncated).
    pub fn pad(&self, amount: f32) -> Self {
        let amount = amount as i32;
        Self {
            x0: self.x0 - amount,
            y0: self.y0 - amount,
            x1: self.x1 + amount,
            y1: self.y1 + amount,
        }
    }

    /// Snap outward so every edge is a multiple of `divisor`.
    ///
    /// The far edges always move to the next multiple, matching how boxes are
    /// prepared for down-scaled segmentation.
    pub fn snap_outward(&self, divisor: i32) -> Self {
        if divisor <= 1 {
            return *self;
        }
        Self {
            x0: self.x0 - self.x0.rem_euclid(divisor),
            y0: self.y0 - self.y0.rem_euclid(divisor),
            x1: self.x1 + (divisor - self.x1.rem_euclid(divisor)),
            y1: self.y1 + (divisor - self.y1.rem_euclid(divisor)),
        }
    }

    /// Divide every coordinate by `factor`.
    pub fn scale_down(&self, factor: f32) -> Self {
        if factor == 1.0 {
            return *self;
        }
        Self {
            x0: (self.x0 as f32 / factor) as i32,
            y0: (self.y0 as f32 / factor) as i32,
            x1: (self.x1 as f32 / factor) as i32,
            y1: (self.y1 as f32 / factor) as i32,
        }
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x0 as f32
            && point.x < self.x1 as f32
            && point.y >= self.y0 as f32
            && point.y < self.y1 as f32
    }
}

/// Sub-pixel position in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}
