// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod buffer_view;
mod frame_buffer_pool;
mod frame_handle;
mod layout;

pub use buffer_view::{BufferView, BufferViewMut};
pub use frame_buffer_pool::{
    AcquireSource, ExhaustionPolicy, FrameBufferPool, FramePoolConfig, FramePoolStats,
};
pub use frame_handle::{FrameHandle, FrameHandleId, FramePoolId};
pub use layout::{ElementType, FrameLayout};
