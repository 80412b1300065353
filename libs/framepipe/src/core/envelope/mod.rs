// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

#[allow(clippy::module_inception)]
mod envelope;
mod payload;

pub use envelope::{Envelope, Terminal};
pub use payload::{EnvelopePayload, Payload, PayloadKind};
