// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! FrameSource - where the capture stage gets its pixels.
//!
//! A source is pulled by the capture stage on its own thread. It knows
//! nothing about envelopes, channels or the pool: it fills a scratch buffer
//! of its declared layout and says whether a frame was produced.
//!
//! ## Implementations
//!
//! - [`SyntheticSource`](crate::core::sources::SyntheticSource): generated
//!   test pattern with a moving bright block, optionally paced to a frame rate.
//! - Camera and file readers live outside this crate and plug in here.

use crate::core::pool::FrameLayout;
use crate::core::Result;

pub trait FrameSource: Send + 'static {
    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Layout of every frame this source produces. Must not change.
    fn layout(&self) -> FrameLayout;

    /// Fill `buffer` (exactly `layout().byte_len()` bytes) with the next frame.
    ///
    /// Returns `Ok(false)` at end of stream. May block until the frame is due.
    fn read(&mut self, buffer: &mut [u8]) -> Result<bool>;
}
