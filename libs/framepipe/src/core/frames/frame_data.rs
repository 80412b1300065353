// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::Arc;

use crate::core::pool::{BufferView, BufferViewMut, FrameBufferPool, FrameHandle, FrameLayout};
use crate::core::{PipelineError, Result};

/// Where the pixels of a frame live.
#[derive(Debug)]
pub enum FrameRef {
    /// Slot in the shared frame pool.
    Pooled(FrameHandle),
    /// Private copy, used when no pool is configured.
    Inline(Arc<[u8]>),
}

/// Frame payload: the camera image carried by an envelope.
///
/// Not `Clone`: a pooled frame owns its slot's handle, so it can sit in
/// only one envelope at a time.
///
/// ```compile_fail
/// use framepipe::core::frames::FrameData;
/// use framepipe::core::pool::{AcquireSource, FrameBufferPool, FrameLayout, FramePoolConfig};
///
/// let layout = FrameLayout::new(2, 2, 1);
/// let pool = FrameBufferPool::new(layout, FramePoolConfig::default()).unwrap();
/// let handle = pool.acquire(AcquireSource::Pixels(&[0; 4])).unwrap();
/// let frame = FrameData::pooled(handle, layout);
/// let twin = frame.clone();
/// ```
#[derive(Debug)]
pub struct FrameData {
    frame: FrameRef,
    layout: FrameLayout,
}

impl FrameData {
    pub fn pooled(handle: FrameHandle, layout: FrameLayout) -> Self {
        Self {
            frame: FrameRef::Pooled(handle),
            layout,
        }
    }

    pub fn inline(bytes: Arc<[u8]>, layout: FrameLayout) -> Result<Self> {
        if bytes.len() != layout.byte_len() {
            return Err(PipelineError::LayoutMismatch {
                expected: layout.byte_len(),
                actual: bytes.len(),
            });
        }
        Ok(Self {
            frame: FrameRef::Inline(bytes),
            layout,
        })
    }

    pub fn frame(&self) -> &FrameRef {
        &self.frame
    }

    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    /// Pool handle, if the pixels live in the pool.
    pub fn handle(&self) -> Option<&FrameHandle> {
        match &self.frame {
            FrameRef::Pooled(handle) => Some(handle),
            FrameRef::Inline(_) => None,
        }
    }

    /// Give up the frame, keeping its pool handle if it had one.
    pub fn into_handle(self) -> Option<FrameHandle> {
        match self.frame {
            FrameRef::Pooled(handle) => Some(handle),
            FrameRef::Inline(_) => None,
        }
    }

    /// Resolve the pixels. Pooled frames need the pool that issued them.
    pub fn view<'a>(&'a self, pool: Option<&'a FrameBufferPool>) -> Result<BufferView<'a>> {
        match (&self.frame, pool) {
            (FrameRef::Inline(bytes), _) => Ok(BufferView::new(bytes, self.layout)),
            (FrameRef::Pooled(handle), Some(pool)) => pool.resolve(handle),
            (FrameRef::Pooled(handle), None) => Err(PipelineError::InvalidHandle {
                handle: handle.id(),
                reason: "pooled frame resolved without a pool".into(),
            }),
        }
    }

    /// Writable pixels. Inline bytes are writable only while unshared.
    pub fn view_mut<'a>(&'a mut self, pool: Option<&'a FrameBufferPool>) -> Result<BufferViewMut<'a>> {
        let layout = self.layout;
        match (&mut self.frame, pool) {
            (FrameRef::Pooled(handle), Some(pool)) => pool.resolve_mut(handle),
            (FrameRef::Pooled(handle), None) => Err(PipelineError::InvalidHandle {
                handle: handle.id(),
                reason: "pooled frame resolved without a pool".into(),
            }),
            (FrameRef::Inline(bytes), _) => Arc::get_mut(bytes)
                .map(|bytes| BufferViewMut::new(bytes, layout))
                .ok_or_else(|| PipelineError::Runtime("inline frame bytes are shared".into())),
        }
    }
}
