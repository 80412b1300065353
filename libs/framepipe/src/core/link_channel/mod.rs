// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod stage_channel;

pub use stage_channel::{
    ChannelReceiver, ChannelSender, PublishOutcome, StageChannel, StageChannelConfig,
    StageChannelStats,
};
