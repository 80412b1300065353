// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod builder;
mod pipeline;
mod shutdown;
mod status;

pub use builder::{PipelineBuilder, SegmenterFactory};
pub use pipeline::{Pipeline, StopHandle};
pub use shutdown::ShutdownReport;
pub use status::PipelineStatus;
