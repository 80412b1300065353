// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Synthetic frame source.
//!
//! Produces a dark background with one bright square sliding left to right,
//! which the reference tracker picks up as a single target. Frames are
//! deterministic for a given index, so tests can check pixel values.

use std::time::{Duration, Instant};

use crate::core::frames::Rect;
use crate::core::pool::{ElementType, FrameLayout};
use crate::core::traits::FrameSource;
use crate::core::{PipelineError, Result};

pub const BACKGROUND_LEVEL: u8 = 16;
pub const TARGET_LEVEL: u8 = 240;

pub struct SyntheticSource {
    layout: FrameLayout,
    frame_interval: Option<Duration>,
    frame_limit: Option<u64>,
    frame_index: u64,
    next_due: Option<Instant>,
}

impl SyntheticSource {
    pub fn new(layout: FrameLayout) -> Self {
        Self {
            layout,
            frame_interval: None,
            frame_limit: None,
            frame_index: 0,
            next_due: None,
        }
    }

    /// Pace `read` to `fps` frames per second.
    pub fn with_fps(mut self, fps: f64) -> Self {
        self.frame_interval = (fps > 0.0).then(|| Duration::from_secs_f64(1.0 / fps));
        self
    }

    /// End the stream after `limit` frames.
    pub fn with_frame_limit(mut self, limit: Option<u64>) -> Self {
        self.frame_limit = limit;
        self
    }

    pub fn frames_produced(&self) -> u64 {
        self.frame_index
    }

    /// Where the bright square is in frame `index`.
    pub fn target_rect(layout: FrameLayout, index: u64) -> Rect {
        let side = (layout.width.min(layout.height) / 4).max(1) as i32;
        let travel = (layout.width as i32 - side).max(1) as u64;
        let x0 = (index * 4 % travel) as i32;
        let y0 = (layout.height as i32 - side) / 2;
        Rect::new(x0, y0, x0 + side, y0 + side)
    }

    fn render(&self, buffer: &mut [u8]) {
        buffer.fill(BACKGROUND_LEVEL);
        let rect = Self::target_rect(self.layout, self.frame_index);
        let pixel = self.layout.pixel_stride();
        let row_stride = self.layout.row_stride();
        for y in rect.y0.max(0)..rect.y1 {
            let row = y as usize * row_stride;
            let start = row + rect.x0 as usize * pixel;
            let end = row + rect.x1 as usize * pixel;
            buffer[start..end].fill(TARGET_LEVEL);
        }
    }
}

impl FrameSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn layout(&self) -> FrameLayout {
        self.layout
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<bool> {
        if self.frame_limit.is_some_and(|limit| self.frame_index >= limit) {
            return Ok(false);
        }
        if self.layout.element != ElementType::U8 {
            return Err(PipelineError::Configuration(
                "synthetic source only produces 8-bit frames".into(),
            ));
        }
        if buffer.len() != self.layout.byte_len() {
            return Err(PipelineError::LayoutMismatch {
                expected: self.layout.byte_len(),
                actual: buffer.len(),
            });
        }

        if let Some(interval) = self.frame_interval {
            let now = Instant::now();
            let due = self.next_due.unwrap_or(now);
            if due > now {
                std::thread::sleep(due - now);
            }
            self.next_due = Some(due.max(now) + interval);
        }

        self.render(buffer);
        self.frame_index += 1;
        Ok(true)
    }
}
