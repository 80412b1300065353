// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::ops::{Deref, DerefMut};

use super::FrameLayout;

/// Read view over the bytes of one frame.
///
/// Either a pool slot resolved through its handle or an inline buffer.
#[derive(Clone, Copy)]
pub struct BufferView<'a> {
    bytes: &'a [u8],
    layout: FrameLayout,
}

impl<'a> BufferView<'a> {
    pub fn new(bytes: &'a [u8], layout: FrameLayout) -> Self {
        debug_assert_eq!(bytes.len(), layout.byte_len());
        Self { bytes, layout }
    }

    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Bytes of row `y`.
    pub fn row(&self, y: u32) -> &'a [u8] {
        let stride = self.layout.row_stride();
        let start = y as usize * stride;
        &self.bytes[start..start + stride]
    }
}

impl Deref for BufferView<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.bytes
    }
}

impl std::fmt::Debug for BufferView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferView")
            .field("layout", &self.layout)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Write view over a pool slot, held by whoever currently owns the handle.
pub struct BufferViewMut<'a> {
    bytes: &'a mut [u8],
    layout: FrameLayout,
}

impl<'a> BufferViewMut<'a> {
    pub(crate) fn new(bytes: &'a mut [u8], layout: FrameLayout) -> Self {
        Self { bytes, layout }
    }

    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    pub fn as_view(&self) -> BufferView<'_> {
        BufferView::new(self.bytes, self.layout)
    }
}

impl Deref for BufferViewMut<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.bytes
    }
}

impl DerefMut for BufferViewMut<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.bytes
    }
}
