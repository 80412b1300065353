// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod synthetic;

pub use synthetic::{SyntheticSource, BACKGROUND_LEVEL, TARGET_LEVEL};
