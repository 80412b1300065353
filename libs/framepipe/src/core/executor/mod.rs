// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod capture_runner;
mod pacing;
mod stage;
mod stage_runner;
mod timing;

pub use capture_runner::{CaptureRunner, CAPTURE_STAGE_ID};
pub use pacing::{DiscardThrottle, PacingConfig};
pub use stage::{Disposition, FnStage, Stage, StageContext};
pub use stage_runner::{StageExit, StageReport, StageRunner};
pub use timing::StageTimer;

pub(crate) use stage_runner::panic_message;
