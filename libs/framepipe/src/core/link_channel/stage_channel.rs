// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};

use crate::core::envelope::{Envelope, Terminal};
use crate::core::pool::FrameBufferPool;
use crate::core::Result;

/// Channel sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageChannelConfig {
    /// Data envelopes kept before the oldest is evicted. 1 keeps only the latest.
    pub capacity: usize,
}

impl Default for StageChannelConfig {
    fn default() -> Self {
        Self { capacity: 1 }
    }
}

/// Result of one publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOutcome {
    /// Unconsumed data envelopes evicted to make room.
    pub evicted: usize,
    /// `false` when the envelope was dropped instead of queued.
    pub delivered: bool,
}

/// Counters for logs and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageChannelStats {
    pub published: u64,
    pub evicted: u64,
    pub dropped_after_close: u64,
    pub queued: usize,
}

struct ChannelState {
    queue: VecDeque<Envelope>,
    /// Data envelopes in `queue`; terminals are not counted.
    data_len: usize,
    producers: usize,
    consumers: usize,
    producers_closed: usize,
    terminal_delivered: bool,
    stats: StageChannelStats,
}

struct StageChannelInner {
    name: String,
    capacity: usize,
    pool: Option<FrameBufferPool>,
    state: Mutex<ChannelState>,
    ready: Condvar,
}

impl StageChannelInner {
    /// Return the frames of envelopes removed from the channel.
    ///
    /// Runs after the channel lock is dropped. The first release failure is
    /// reported; the remaining frames are still released.
    fn release_all(&self, envelopes: Vec<Envelope>) -> Result<()> {
        let mut first_error = None;
        for mut envelope in envelopes {
            if let Err(e) = envelope.release_frame(self.pool.as_ref()) {
                tracing::error!(
                    "[{}] Failed to release frame of envelope #{}: {}",
                    self.name,
                    envelope.sequence(),
                    e
                );
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Bounded queue of envelopes between stages.
///
/// A full channel never blocks the producer: the oldest unconsumed data
/// envelope is evicted and its frame returned to the pool. Terminal
/// envelopes are aggregated across producers and replicated once per
/// consumer, so every consumer sees exactly one terminal.
pub struct StageChannel {
    inner: Arc<StageChannelInner>,
}

impl Clone for StageChannel {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl StageChannel {
    pub fn new(
        name: impl Into<String>,
        config: &StageChannelConfig,
        pool: Option<FrameBufferPool>,
    ) -> Self {
        Self {
            inner: Arc::new(StageChannelInner {
                name: name.into(),
                capacity: config.capacity.max(1),
                pool,
                state: Mutex::new(ChannelState {
                    queue: VecDeque::new(),
                    data_len: 0,
                    producers: 0,
                    consumers: 0,
                    producers_closed: 0,
                    terminal_delivered: false,
                    stats: StageChannelStats::default(),
                }),
                ready: Condvar::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Register a producer. All producers must be registered before any of
    /// them closes.
    pub fn sender(&self) -> ChannelSender {
        self.inner.state.lock().producers += 1;
        ChannelSender {
            channel: self.clone(),
        }
    }

    /// Register a consumer. Each registered consumer receives its own copy of
    /// the terminal envelope.
    pub fn receiver(&self) -> ChannelReceiver {
        self.inner.state.lock().consumers += 1;
        ChannelReceiver {
            channel: self.clone(),
        }
    }

    /// Envelopes currently queued, terminals included.
    pub fn len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().terminal_delivered
    }

    pub fn stats(&self) -> StageChannelStats {
        let state = self.inner.state.lock();
        StageChannelStats {
            queued: state.queue.len(),
            ..state.stats
        }
    }

    fn publish(&self, envelope: Envelope) -> Result<PublishOutcome> {
        let mut removed = Vec::new();
        let outcome = {
            let mut state = self.inner.state.lock();
            state.stats.published += 1;

            match envelope.terminal_marker().cloned() {
                Some(terminal) => self.publish_terminal(&mut state, terminal),
                None if state.terminal_delivered => {
                    state.stats.dropped_after_close += 1;
                    tracing::debug!(
                        "[{}] Dropping envelope #{} published after close",
                        self.inner.name,
                        envelope.sequence()
                    );
                    removed.push(envelope);
                    PublishOutcome::default()
                }
                None => {
                    while state.data_len >= self.inner.capacity {
                        let Some(position) = state.queue.iter().position(|e| !e.is_terminal())
                        else {
                            break;
                        };
                        if let Some(evicted) = state.queue.remove(position) {
                            state.data_len -= 1;
                            tracing::trace!(
                                "[{}] Evicting stale envelope #{}",
                                self.inner.name,
                                evicted.sequence()
                            );
                            removed.push(evicted);
                        }
                    }
                    let evicted = removed.len();
                    state.stats.evicted += evicted as u64;
                    state.queue.push_back(envelope);
                    state.data_len += 1;
                    self.inner.ready.notify_one();
                    PublishOutcome {
                        evicted,
                        delivered: true,
                    }
                }
            }
        };

        self.inner.release_all(removed)?;
        Ok(outcome)
    }

    fn publish_terminal(&self, state: &mut ChannelState, terminal: Terminal) -> PublishOutcome {
        state.producers_closed += 1;
        if state.terminal_delivered {
            return PublishOutcome::default();
        }

        let deliver = match &terminal {
            Terminal::CloseWithError(_) => true,
            Terminal::Close => state.producers_closed >= state.producers,
        };
        if !deliver {
            tracing::debug!(
                "[{}] Close from producer {}/{}, waiting for the rest",
                self.inner.name,
                state.producers_closed,
                state.producers
            );
            return PublishOutcome::default();
        }

        for _ in 0..state.consumers.max(1) {
            state.queue.push_back(Envelope::terminal(terminal.clone()));
        }
        state.terminal_delivered = true;
        self.inner.ready.notify_all();
        tracing::debug!(
            "[{}] Terminal delivered to {} consumer(s)",
            self.inner.name,
            state.consumers.max(1)
        );
        PublishOutcome {
            evicted: 0,
            delivered: true,
        }
    }

    fn pop(&self, state: &mut ChannelState) -> Option<Envelope> {
        let envelope = state.queue.pop_front()?;
        if !envelope.is_terminal() {
            state.data_len -= 1;
        }
        Some(envelope)
    }

    fn recv_timeout(&self, timeout: Duration) -> Option<Envelope> {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        loop {
            if let Some(envelope) = self.pop(&mut state) {
                return Some(envelope);
            }
            if self.inner.ready.wait_until(&mut state, deadline).timed_out() {
                return self.pop(&mut state);
            }
        }
    }

    fn try_recv(&self) -> Option<Envelope> {
        let mut state = self.inner.state.lock();
        self.pop(&mut state)
    }

    /// Remove everything still queued and release the frames.
    ///
    /// Returns the number of envelopes removed.
    pub fn drain(&self) -> Result<usize> {
        let drained: Vec<Envelope> = {
            let mut state = self.inner.state.lock();
            state.data_len = 0;
            state.queue.drain(..).collect()
        };
        let count = drained.len();
        if count > 0 {
            tracing::debug!("[{}] Drained {} envelope(s)", self.inner.name, count);
        }
        self.inner.release_all(drained)?;
        Ok(count)
    }
}

impl std::fmt::Debug for StageChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageChannel")
            .field("name", &self.inner.name)
            .field("capacity", &self.inner.capacity)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Producer side of a [`StageChannel`].
pub struct ChannelSender {
    channel: StageChannel,
}

impl ChannelSender {
    /// Queue `envelope`, evicting stale data if the channel is full.
    ///
    /// Errors only when releasing an evicted frame fails; the new envelope is
    /// queued regardless.
    pub fn publish(&self, envelope: Envelope) -> Result<PublishOutcome> {
        self.channel.publish(envelope)
    }

    pub fn channel(&self) -> &StageChannel {
        &self.channel
    }
}

/// Consumer side of a [`StageChannel`].
pub struct ChannelReceiver {
    channel: StageChannel,
}

impl ChannelReceiver {
    /// Wait up to `timeout` for the next envelope.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Envelope> {
        self.channel.recv_timeout(timeout)
    }

    pub fn try_recv(&self) -> Option<Envelope> {
        self.channel.try_recv()
    }

    pub fn channel(&self) -> &StageChannel {
        &self.channel
    }
}
