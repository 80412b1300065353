// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::Arc;
use std::time::Duration;

use crate::core::executor::{StageExit, StageReport};
use crate::core::PipelineError;

/// What [`Pipeline::shutdown`](super::Pipeline::shutdown) observed.
#[derive(Debug, Clone, Default)]
pub struct ShutdownReport {
    /// Reports of the stages that stopped in time, in startup order.
    pub stages: Vec<StageReport>,
    /// Stages still running at the hard timeout. Their threads are detached.
    pub abandoned: Vec<String>,
    /// Envelopes left in channels and released during teardown.
    pub drained: usize,
    /// `true` when the pool was torn down or no pool was in use.
    pub pool_shut_down: bool,
    pub elapsed: Duration,
}

impl ShutdownReport {
    /// Every stage stopped in time and none failed.
    pub fn is_clean(&self) -> bool {
        self.abandoned.is_empty() && !self.stages.iter().any(|s| s.exit.is_failure())
    }

    /// Error of the first stage that failed itself.
    pub fn first_failure(&self) -> Option<&Arc<PipelineError>> {
        self.stages.iter().find_map(|s| match &s.exit {
            StageExit::Failed(e) => Some(e),
            _ => None,
        })
    }

    pub fn stage(&self, stage_id: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage_id == stage_id)
    }
}
