// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Observability for the pipeline consumer.

mod frame_stats;

pub use frame_stats::{FrameStats, FrameStatsSnapshot};
