// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! FrameBufferPool - fixed set of pre-allocated frame buffers shared by all stages.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_queue::ArrayQueue;
use parking_lot::{Condvar, Mutex, RwLock};
use serde::{Deserialize, Serialize};

use super::{BufferView, BufferViewMut, FrameHandle, FrameLayout, FramePoolId};
use crate::core::{PipelineError, Result};

/// Slot generation reserved for "free".
const FREE: u64 = 0;

/// Policy for handling pool exhaustion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ExhaustionPolicy {
    /// Block until a slot is released. `None` waits forever.
    Block { timeout_ms: Option<u64> },
    /// Return `PoolExhausted` immediately.
    ReturnError,
}

impl Default for ExhaustionPolicy {
    fn default() -> Self {
        Self::Block {
            timeout_ms: Some(1000),
        }
    }
}

impl ExhaustionPolicy {
    fn timeout(&self) -> Option<Duration> {
        match self {
            ExhaustionPolicy::Block { timeout_ms } => timeout_ms.map(Duration::from_millis),
            ExhaustionPolicy::ReturnError => Some(Duration::ZERO),
        }
    }
}

/// Configuration for the frame pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramePoolConfig {
    /// Number of pre-allocated buffers. Never grows.
    pub capacity: usize,
    /// Policy when every buffer is checked out.
    pub exhaustion_policy: ExhaustionPolicy,
}

impl Default for FramePoolConfig {
    fn default() -> Self {
        Self {
            capacity: 30,
            exhaustion_policy: ExhaustionPolicy::default(),
        }
    }
}

/// What to put into the pool.
#[derive(Debug)]
pub enum AcquireSource<'a> {
    /// Raw pixels; copied into a free slot.
    Pixels(&'a [u8]),
    /// A frame that already lives in the pool; passed through unchanged.
    Handle(FrameHandle),
}

/// Snapshot of pool usage.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FramePoolStats {
    pub capacity: usize,
    pub free_slots: usize,
    pub outstanding: usize,
    pub shut_down: bool,
}

struct Slot {
    bytes: UnsafeCell<Box<[u8]>>,
    /// Generation of the handle currently checked out, or `FREE`.
    live: AtomicU64,
}

// SAFETY: slot bytes are only written by `check_out` right after the slot was
// popped from the free-list (no handle exists yet) and through `resolve_mut`,
// which needs `&mut` on the single live handle. Views borrow that handle and
// `release` consumes it, so no view outlives its checkout.
unsafe impl Sync for Slot {}

struct FrameBufferPoolInner {
    id: FramePoolId,
    layout: FrameLayout,
    policy: ExhaustionPolicy,
    slots: Box<[Slot]>,
    free: ArrayQueue<usize>,
    next_generation: AtomicU64,
    outstanding: AtomicUsize,
    /// `true` once shut down. Read-held while a slot is being filled.
    closed: RwLock<bool>,
    wait_lock: Mutex<()>,
    available: Condvar,
}

impl FrameBufferPoolInner {
    fn slot_for(&self, handle: &FrameHandle) -> Result<&Slot> {
        if handle.pool_id() != self.id {
            return Err(PipelineError::InvalidHandle {
                handle: handle.id(),
                reason: format!("issued by pool {}, not {}", handle.pool_id(), self.id),
            });
        }
        self.slots
            .get(handle.slot())
            .ok_or_else(|| PipelineError::InvalidHandle {
                handle: handle.id(),
                reason: format!("slot out of range (capacity {})", self.slots.len()),
            })
    }

    fn live_slot_for(&self, handle: &FrameHandle) -> Result<&Slot> {
        let slot = self.slot_for(handle)?;
        let live = slot.live.load(Ordering::Acquire);
        if live != handle.generation() {
            let reason = if live == FREE {
                "slot is free".to_string()
            } else {
                format!("slot reissued as generation {}", live)
            };
            return Err(PipelineError::InvalidHandle {
                handle: handle.id(),
                reason,
            });
        }
        Ok(slot)
    }

    fn check_out(&self, index: usize, pixels: &[u8]) -> FrameHandle {
        let slot = &self.slots[index];
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        // SAFETY: `index` was just popped from the free-list, so no handle to
        // this slot exists and nobody else can read or write it.
        unsafe {
            (*slot.bytes.get()).copy_from_slice(pixels);
        }
        slot.live.store(generation, Ordering::Release);
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        FrameHandle::new(self.id, index, generation)
    }

    fn notify_available(&self, all: bool) {
        // Taking the wait lock orders this notify after any waiter's re-check.
        drop(self.wait_lock.lock());
        if all {
            self.available.notify_all();
        } else {
            self.available.notify_one();
        }
    }
}

/// Fixed-capacity pool of pre-allocated frame buffers.
///
/// Cloning is cheap; every clone refers to the same slots. Only the
/// free-list is synchronized: pixel data is owned by whoever holds the
/// handle, and `resolve` performs a single atomic generation check.
///
/// A view borrows the handle it was resolved through, so the handle cannot
/// be released while the view is alive:
///
/// ```compile_fail
/// use framepipe::core::pool::{AcquireSource, FrameBufferPool, FrameLayout, FramePoolConfig};
///
/// let pool = FrameBufferPool::new(FrameLayout::new(2, 2, 1), FramePoolConfig::default()).unwrap();
/// let handle = pool.acquire(AcquireSource::Pixels(&[1; 4])).unwrap();
/// let view = pool.resolve(&handle).unwrap();
/// pool.release(handle).unwrap();
/// assert_eq!(view[0], 1);
/// ```
///
/// Handles cannot be duplicated:
///
/// ```compile_fail
/// use framepipe::core::pool::{AcquireSource, FrameBufferPool, FrameLayout, FramePoolConfig};
///
/// let pool = FrameBufferPool::new(FrameLayout::new(2, 2, 1), FramePoolConfig::default()).unwrap();
/// let handle = pool.acquire(AcquireSource::Pixels(&[1; 4])).unwrap();
/// let copy = handle.clone();
/// pool.release(handle).unwrap();
/// pool.release(copy).unwrap();
/// ```
pub struct FrameBufferPool {
    inner: Arc<FrameBufferPoolInner>,
}

impl Clone for FrameBufferPool {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl FrameBufferPool {
    /// Allocate `config.capacity` zeroed buffers of `layout`.
    pub fn new(layout: FrameLayout, config: FramePoolConfig) -> Result<Self> {
        if config.capacity == 0 {
            return Err(PipelineError::Configuration(
                "frame pool capacity must be at least 1".into(),
            ));
        }
        let byte_len = layout.byte_len();
        if byte_len == 0 {
            return Err(PipelineError::Configuration(format!(
                "frame layout {:?} has no bytes",
                layout
            )));
        }

        let slots: Box<[Slot]> = (0..config.capacity)
            .map(|_| Slot {
                bytes: UnsafeCell::new(vec![0u8; byte_len].into_boxed_slice()),
                live: AtomicU64::new(FREE),
            })
            .collect();
        let free = ArrayQueue::new(config.capacity);
        for index in 0..config.capacity {
            // Cannot fail: the queue was sized for exactly these indices.
            let _ = free.push(index);
        }

        let id = FramePoolId::new();
        tracing::info!(
            "Frame pool {} allocated: {} x {} bytes ({}x{}x{} {:?})",
            id,
            config.capacity,
            byte_len,
            layout.width,
            layout.height,
            layout.channels,
            layout.element
        );

        Ok(Self {
            inner: Arc::new(FrameBufferPoolInner {
                id,
                layout,
                policy: config.exhaustion_policy,
                slots,
                free,
                next_generation: AtomicU64::new(FREE + 1),
                outstanding: AtomicUsize::new(0),
                closed: RwLock::new(false),
                wait_lock: Mutex::new(()),
                available: Condvar::new(),
            }),
        })
    }

    /// Allocate a pool whose layout is fixed by a representative sample frame.
    pub fn from_sample(sample: &[u8], layout: FrameLayout, config: FramePoolConfig) -> Result<Self> {
        if sample.len() != layout.byte_len() {
            return Err(PipelineError::LayoutMismatch {
                expected: layout.byte_len(),
                actual: sample.len(),
            });
        }
        Self::new(layout, config)
    }

    pub fn id(&self) -> FramePoolId {
        self.inner.id
    }

    pub fn layout(&self) -> FrameLayout {
        self.inner.layout
    }

    pub fn capacity(&self) -> usize {
        self.inner.slots.len()
    }

    pub fn free_slots(&self) -> usize {
        self.inner.free.len()
    }

    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::Acquire)
    }

    pub fn is_shut_down(&self) -> bool {
        *self.inner.closed.read()
    }

    pub fn stats(&self) -> FramePoolStats {
        FramePoolStats {
            capacity: self.capacity(),
            free_slots: self.free_slots(),
            outstanding: self.outstanding(),
            shut_down: self.is_shut_down(),
        }
    }

    /// Put a frame into the pool.
    ///
    /// Pixels are copied into a free slot, blocking according to the
    /// exhaustion policy when none is free. A handle is returned unchanged.
    pub fn acquire(&self, source: AcquireSource<'_>) -> Result<FrameHandle> {
        match source {
            AcquireSource::Handle(handle) => Ok(handle),
            AcquireSource::Pixels(pixels) => self.acquire_pixels(pixels, self.inner.policy.timeout()),
        }
    }

    /// Like [`acquire`](Self::acquire) with an explicit wait bound.
    pub fn acquire_timeout(&self, pixels: &[u8], timeout: Option<Duration>) -> Result<FrameHandle> {
        self.acquire_pixels(pixels, timeout)
    }

    fn acquire_pixels(&self, pixels: &[u8], timeout: Option<Duration>) -> Result<FrameHandle> {
        let expected = self.inner.layout.byte_len();
        if pixels.len() != expected {
            return Err(PipelineError::LayoutMismatch {
                expected,
                actual: pixels.len(),
            });
        }

        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            {
                let closed = self.inner.closed.read();
                if *closed {
                    return Err(PipelineError::PoolClosed);
                }
                if let Some(index) = self.inner.free.pop() {
                    let handle = self.inner.check_out(index, pixels);
                    tracing::trace!("Frame pool {}: acquired {}", self.inner.id, handle);
                    return Ok(handle);
                }
            }

            let mut guard = self.inner.wait_lock.lock();
            if !self.inner.free.is_empty() || *self.inner.closed.read() {
                continue;
            }

            match deadline {
                None => self.inner.available.wait(&mut guard),
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        tracing::debug!(
                            "Frame pool {} exhausted ({} slots checked out)",
                            self.inner.id,
                            self.outstanding()
                        );
                        return Err(PipelineError::PoolExhausted { timeout });
                    }
                    // A timed-out wait loops once more: one last pop, then the
                    // deadline check above reports exhaustion.
                    let _ = self.inner.available.wait_until(&mut guard, deadline);
                }
            }
        }
    }

    /// Read view over a live slot, valid while `handle` is borrowed.
    pub fn resolve<'a>(&'a self, handle: &'a FrameHandle) -> Result<BufferView<'a>> {
        let slot = self.inner.live_slot_for(handle)?;
        // SAFETY: the slot is checked out under `handle`, which this view
        // borrows shared. Writes need `&mut handle`, so none can overlap.
        let bytes: &[u8] = unsafe { &*slot.bytes.get() };
        Ok(BufferView::new(bytes, self.inner.layout))
    }

    /// Write view over a live slot. Holds `handle` exclusively, so no other
    /// view of the slot can exist at the same time:
    ///
    /// ```compile_fail
    /// use framepipe::core::pool::{AcquireSource, FrameBufferPool, FrameLayout, FramePoolConfig};
    ///
    /// let pool = FrameBufferPool::new(FrameLayout::new(2, 2, 1), FramePoolConfig::default()).unwrap();
    /// let mut handle = pool.acquire(AcquireSource::Pixels(&[0; 4])).unwrap();
    /// let mut a = pool.resolve_mut(&mut handle).unwrap();
    /// let b = pool.resolve_mut(&mut handle).unwrap();
    /// a[0] = 42;
    /// assert_eq!(b[0], 42);
    /// ```
    ///
    /// Sequential views are fine:
    ///
    /// ```
    /// use framepipe::core::pool::{AcquireSource, FrameBufferPool, FrameLayout, FramePoolConfig};
    ///
    /// let pool = FrameBufferPool::new(FrameLayout::new(2, 2, 1), FramePoolConfig::default()).unwrap();
    /// let mut handle = pool.acquire(AcquireSource::Pixels(&[0; 4])).unwrap();
    /// pool.resolve_mut(&mut handle).unwrap()[0] = 42;
    /// assert_eq!(pool.resolve(&handle).unwrap()[0], 42);
    /// pool.release(handle).unwrap();
    /// ```
    pub fn resolve_mut<'a>(&'a self, handle: &'a mut FrameHandle) -> Result<BufferViewMut<'a>> {
        let slot = self.inner.live_slot_for(handle)?;
        // SAFETY: the slot is checked out under `handle`, which this view
        // borrows exclusively for its whole lifetime.
        let bytes: &mut [u8] = unsafe { &mut *slot.bytes.get() };
        Ok(BufferViewMut::new(bytes, self.inner.layout))
    }

    /// Return a slot to the free-list, consuming its handle.
    ///
    /// A handle whose slot is no longer checked out under its generation is
    /// `DoubleRelease`; one issued by another pool is `InvalidHandle`.
    pub fn release(&self, handle: FrameHandle) -> Result<()> {
        let slot = self.inner.slot_for(&handle)?;
        if slot
            .live
            .compare_exchange(handle.generation(), FREE, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::error!("Frame pool {}: double release of {}", self.inner.id, handle);
            return Err(PipelineError::DoubleRelease(handle.id()));
        }

        self.inner.outstanding.fetch_sub(1, Ordering::AcqRel);
        self.inner.free.push(handle.slot()).map_err(|index| {
            PipelineError::Runtime(format!("free-list overflow returning slot {}", index))
        })?;
        tracing::trace!("Frame pool {}: released {}", self.inner.id, handle);
        self.inner.notify_available(false);
        Ok(())
    }

    /// Tear the pool down and free every buffer.
    ///
    /// Only valid once no handle is outstanding; otherwise `PoolBusy` is
    /// returned and the pool stays usable. Calling it again is a no-op.
    pub fn shutdown(&self) -> Result<()> {
        {
            let mut closed = self.inner.closed.write();
            if *closed {
                return Ok(());
            }
            let outstanding = self.outstanding();
            if outstanding > 0 {
                return Err(PipelineError::PoolBusy { outstanding });
            }
            *closed = true;
            for slot in self.inner.slots.iter() {
                // SAFETY: write lock held and no handle is outstanding, so no
                // acquire is filling a slot and no live view exists.
                unsafe {
                    *slot.bytes.get() = Box::default();
                }
            }
        }
        self.inner.notify_available(true);
        tracing::info!("Frame pool {} shut down", self.inner.id);
        Ok(())
    }
}

impl std::fmt::Debug for FrameBufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("FrameBufferPool")
            .field("id", &self.inner.id)
            .field("layout", &self.inner.layout)
            .field("capacity", &stats.capacity)
            .field("free_slots", &stats.free_slots)
            .field("outstanding", &stats.outstanding)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::mpsc;
    use std::thread;

    fn pool(capacity: usize, policy: ExhaustionPolicy) -> FrameBufferPool {
        FrameBufferPool::new(
            FrameLayout::new(4, 4, 1),
            FramePoolConfig {
                capacity,
                exhaustion_policy: policy,
            },
        )
        .unwrap()
    }

    fn frame(value: u8) -> Vec<u8> {
        vec![value; 16]
    }

    /// Second token for a checkout, which safe code can never obtain.
    fn duplicate(handle: &FrameHandle) -> FrameHandle {
        FrameHandle::new(handle.pool_id(), handle.slot(), handle.generation())
    }

    #[test]
    fn test_acquire_copies_pixels() {
        let pool = pool(2, ExhaustionPolicy::ReturnError);
        let handle = pool.acquire(AcquireSource::Pixels(&frame(7))).unwrap();
        let view = pool.resolve(&handle).unwrap();
        assert!(view.iter().all(|&b| b == 7));
        assert_eq!(view.layout(), FrameLayout::new(4, 4, 1));
    }

    #[test]
    fn test_handle_passes_through() {
        let pool = pool(2, ExhaustionPolicy::ReturnError);
        let handle = pool.acquire(AcquireSource::Pixels(&frame(1))).unwrap();
        let id = handle.id();
        let again = pool.acquire(AcquireSource::Handle(handle)).unwrap();
        assert_eq!(again.id(), id);
        assert_eq!(pool.outstanding(), 1);
    }

    #[test]
    fn test_fourth_acquire_blocks_until_release() {
        let pool = pool(3, ExhaustionPolicy::Block { timeout_ms: None });
        let mut handles: Vec<_> = (0..3)
            .map(|i| pool.acquire(AcquireSource::Pixels(&frame(i))).unwrap())
            .collect();
        assert_eq!(pool.free_slots(), 0);

        let (tx, rx) = mpsc::channel();
        let waiter = {
            let pool = pool.clone();
            thread::spawn(move || {
                let handle = pool.acquire(AcquireSource::Pixels(&frame(9))).unwrap();
                tx.send(handle).unwrap();
            })
        };

        // Still blocked while every slot is out.
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        let freed = handles.remove(1);
        let freed_id = freed.id();
        pool.release(freed).unwrap();
        let reused = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        waiter.join().unwrap();

        assert_eq!(reused.slot(), freed_id.slot());
        assert_ne!(reused.generation(), freed_id.generation());
        assert!(pool.resolve(&reused).unwrap().iter().all(|&b| b == 9));
    }

    #[test]
    fn test_exhaustion_timeout() {
        let pool = pool(1, ExhaustionPolicy::Block { timeout_ms: Some(30) });
        let _held = pool.acquire(AcquireSource::Pixels(&frame(0))).unwrap();
        let start = Instant::now();
        let err = pool.acquire(AcquireSource::Pixels(&frame(0))).unwrap_err();
        assert!(matches!(err, PipelineError::PoolExhausted { .. }));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_exhaustion_return_error() {
        let pool = pool(1, ExhaustionPolicy::ReturnError);
        let _held = pool.acquire(AcquireSource::Pixels(&frame(0))).unwrap();
        assert!(matches!(
            pool.acquire(AcquireSource::Pixels(&frame(0))),
            Err(PipelineError::PoolExhausted { .. })
        ));
    }

    #[test]
    fn test_double_release_detected() {
        let pool = pool(2, ExhaustionPolicy::ReturnError);
        let handle = pool.acquire(AcquireSource::Pixels(&frame(0))).unwrap();
        let copy = duplicate(&handle);
        let id = handle.id();
        pool.release(handle).unwrap();
        assert!(matches!(
            pool.release(copy),
            Err(PipelineError::DoubleRelease(h)) if h == id
        ));
        assert_eq!(pool.free_slots(), 2);
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn test_stale_handle_rejected_after_reuse() {
        let pool = pool(1, ExhaustionPolicy::ReturnError);
        let old = pool.acquire(AcquireSource::Pixels(&frame(1))).unwrap();
        let stale = duplicate(&old);
        pool.release(old).unwrap();
        let new = pool.acquire(AcquireSource::Pixels(&frame(2))).unwrap();
        assert_eq!(stale.slot(), new.slot());

        // The generation check refuses the old checkout's view of the slot.
        assert!(matches!(
            pool.resolve(&stale),
            Err(PipelineError::InvalidHandle { .. })
        ));
        assert!(matches!(
            pool.release(stale),
            Err(PipelineError::DoubleRelease(_))
        ));
        // The new holder is unaffected.
        assert!(pool.resolve(&new).unwrap().iter().all(|&b| b == 2));
    }

    #[test]
    fn test_foreign_handle_rejected() {
        let a = pool(1, ExhaustionPolicy::ReturnError);
        let b = pool(1, ExhaustionPolicy::ReturnError);
        let handle = a.acquire(AcquireSource::Pixels(&frame(0))).unwrap();
        assert!(matches!(
            b.resolve(&handle),
            Err(PipelineError::InvalidHandle { .. })
        ));
        assert!(matches!(
            b.release(handle),
            Err(PipelineError::InvalidHandle { .. })
        ));
    }

    #[test]
    fn test_layout_mismatch() {
        let pool = pool(1, ExhaustionPolicy::ReturnError);
        assert!(matches!(
            pool.acquire(AcquireSource::Pixels(&[0u8; 3])),
            Err(PipelineError::LayoutMismatch {
                expected: 16,
                actual: 3
            })
        ));
        assert!(FrameBufferPool::from_sample(
            &[0u8; 5],
            FrameLayout::new(4, 4, 1),
            FramePoolConfig::default()
        )
        .is_err());
    }

    #[test]
    fn test_resolve_mut_writes_slot() {
        let pool = pool(1, ExhaustionPolicy::ReturnError);
        let mut handle = pool.acquire(AcquireSource::Pixels(&frame(0))).unwrap();
        {
            let mut view = pool.resolve_mut(&mut handle).unwrap();
            view[3] = 42;
        }
        assert_eq!(pool.resolve(&handle).unwrap()[3], 42);
        pool.release(handle).unwrap();
    }

    #[test]
    fn test_reissued_slot_is_visible_only_to_new_owner() {
        let pool = pool(1, ExhaustionPolicy::ReturnError);
        let first = pool.acquire(AcquireSource::Pixels(&frame(1))).unwrap();
        let first_id = first.id();
        assert!(pool.resolve(&first).unwrap().iter().all(|&b| b == 1));
        pool.release(first).unwrap();

        let mut second = pool.acquire(AcquireSource::Pixels(&frame(2))).unwrap();
        assert_eq!(second.slot(), first_id.slot());
        pool.resolve_mut(&mut second).unwrap()[0] = 9;
        let view = pool.resolve(&second).unwrap();
        assert_eq!(view[0], 9);
        assert!(view[1..].iter().all(|&b| b == 2));
        pool.release(second).unwrap();
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn test_checked_out_and_free_are_disjoint() {
        let pool = pool(4, ExhaustionPolicy::ReturnError);
        let mut held: Vec<FrameHandle> = Vec::new();
        // Deterministic interleaving of acquires and releases.
        let script = [true, true, false, true, true, true, false, false, true, false];
        for (step, acquire) in script.iter().enumerate() {
            if *acquire && held.len() < pool.capacity() {
                held.push(pool.acquire(AcquireSource::Pixels(&frame(step as u8))).unwrap());
            } else if !held.is_empty() {
                pool.release(held.remove(0)).unwrap();
            }

            let checked_out: HashSet<usize> = held.iter().map(|h| h.slot()).collect();
            assert_eq!(checked_out.len(), held.len(), "slot shared by two handles");
            assert_eq!(pool.outstanding(), held.len());
            assert_eq!(pool.free_slots() + pool.outstanding(), pool.capacity());
        }
    }

    #[test]
    fn test_concurrent_acquire_release() {
        let pool = pool(3, ExhaustionPolicy::Block { timeout_ms: None });
        let workers: Vec<_> = (0..6)
            .map(|worker| {
                let pool = pool.clone();
                thread::spawn(move || {
                    for _ in 0..200 {
                        let handle = pool
                            .acquire(AcquireSource::Pixels(&frame(worker as u8)))
                            .unwrap();
                        assert!(pool
                            .resolve(&handle)
                            .unwrap()
                            .iter()
                            .all(|&b| b == worker as u8));
                        pool.release(handle).unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(pool.free_slots(), 3);
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn test_shutdown_requires_no_outstanding() {
        let pool = pool(2, ExhaustionPolicy::ReturnError);
        let handle = pool.acquire(AcquireSource::Pixels(&frame(0))).unwrap();
        assert!(matches!(
            pool.shutdown(),
            Err(PipelineError::PoolBusy { outstanding: 1 })
        ));
        assert!(!pool.is_shut_down());

        pool.release(handle).unwrap();
        pool.shutdown().unwrap();
        pool.shutdown().unwrap();
        assert!(pool.is_shut_down());
        assert!(matches!(
            pool.acquire(AcquireSource::Pixels(&frame(0))),
            Err(PipelineError::PoolClosed)
        ));
    }

    #[test]
    fn test_shutdown_wakes_blocked_acquire() {
        let pool = pool(1, ExhaustionPolicy::Block { timeout_ms: None });
        let handle = pool.acquire(AcquireSource::Pixels(&frame(0))).unwrap();

        let waiter = {
            let pool = pool.clone();
            thread::spawn(move || pool.acquire(AcquireSource::Pixels(&frame(1))))
        };
        thread::sleep(Duration::from_millis(50));
        pool.release(handle).unwrap();
        // The waiter takes the released slot.
        let taken = waiter.join().unwrap().unwrap();
        pool.release(taken).unwrap();
        pool.shutdown().unwrap();

        let late = {
            let pool = pool.clone();
            thread::spawn(move || pool.acquire(AcquireSource::Pixels(&frame(1))))
        };
        assert!(matches!(late.join().unwrap(), Err(PipelineError::PoolClosed)));
    }
}
