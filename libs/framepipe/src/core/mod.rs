// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

pub mod config;
pub mod envelope;
pub mod error;
pub mod executor;
pub mod frames;
pub mod link_channel;
pub mod observability;
pub mod pool;
pub mod prelude;
pub mod runtime;
pub mod sources;
pub mod stages;
pub mod traits;

pub use config::{PipelineConfig, StagesConfig};
pub use envelope::*;
pub use error::*;
pub use executor::*;
pub use frames::*;
pub use link_channel::*;
pub use observability::*;
pub use pool::*;
pub use runtime::*;
pub use sources::*;
pub use stages::*;
pub use traits::*;
