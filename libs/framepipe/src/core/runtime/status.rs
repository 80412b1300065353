// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

/// Pipeline lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineStatus {
    #[default]
    Running,
    /// A terminal envelope reached the driver; stage threads are exiting.
    Closed,
    Stopping,
    Stopped,
}
