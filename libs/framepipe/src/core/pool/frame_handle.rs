// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::fmt;

use uuid::Uuid;

/// Identity of a [`FrameBufferPool`](super::FrameBufferPool).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FramePoolId(Uuid);

impl FramePoolId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for FramePoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Printable identity of a handle: pool, slot and generation.
///
/// Carried by errors and logs. Unlike [`FrameHandle`] it grants no access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameHandleId {
    pub(crate) pool_id: FramePoolId,
    pub(crate) slot: usize,
    pub(crate) generation: u64,
}

impl FrameHandleId {
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pool_id(&self) -> FramePoolId {
        self.pool_id
    }
}

impl fmt::Display for FrameHandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot#{}@gen{}", self.slot, self.generation)
    }
}

/// Ownership token for a checked-out pool slot.
///
/// Neither `Copy` nor `Clone`: exactly one handle exists per checkout, it
/// moves with the envelope that carries it, and
/// [`release`](super::FrameBufferPool::release) consumes it. Views borrow
/// the handle, so a view cannot outlive the checkout and a write view
/// excludes every other view of the slot.
///
/// A handle is only meaningful to the pool that issued it. The generation
/// changes every time a slot is handed out.
#[must_use = "a dropped handle keeps its slot checked out until the pool is rebuilt"]
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct FrameHandle {
    id: FrameHandleId,
}

impl FrameHandle {
    pub(crate) fn new(pool_id: FramePoolId, slot: usize, generation: u64) -> Self {
        Self {
            id: FrameHandleId {
                pool_id,
                slot,
                generation,
            },
        }
    }

    pub fn id(&self) -> FrameHandleId {
        self.id
    }

    /// Index of the slot inside its pool.
    pub fn slot(&self) -> usize {
        self.id.slot
    }

    pub fn generation(&self) -> u64 {
        self.id.generation
    }

    pub fn pool_id(&self) -> FramePoolId {
        self.id.pool_id
    }
}

impl fmt::Display for FrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.id.fmt(f)
    }
}
