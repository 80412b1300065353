// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use serde::{Deserialize, Serialize};

use crate::core::frames::{FrameData, PoseData, SegmentationData, TrackingData};

/// Payload kinds an envelope can carry, one payload per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    Frame,
    Tracking,
    Pose,
    Segmentation,
}

impl PayloadKind {
    pub(crate) const COUNT: usize = 4;

    pub const ALL: [PayloadKind; Self::COUNT] = [
        PayloadKind::Frame,
        PayloadKind::Tracking,
        PayloadKind::Pose,
        PayloadKind::Segmentation,
    ];

    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

/// Not `Clone`: the frame payload owns a pool handle.
#[derive(Debug)]
pub enum Payload {
    Frame(FrameData),
    Tracking(TrackingData),
    Pose(PoseData),
    Segmentation(SegmentationData),
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Frame(_) => PayloadKind::Frame,
            Payload::Tracking(_) => PayloadKind::Tracking,
            Payload::Pose(_) => PayloadKind::Pose,
            Payload::Segmentation(_) => PayloadKind::Segmentation,
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Payload types with typed access through an envelope.
///
/// Sealed: the payload set is closed.
pub trait EnvelopePayload: sealed::Sealed + Sized {
    const KIND: PayloadKind;

    #[doc(hidden)]
    fn into_payload(self) -> Payload;

    #[doc(hidden)]
    fn from_payload(payload: &Payload) -> Option<&Self>;

    #[doc(hidden)]
    fn from_payload_mut(payload: &mut Payload) -> Option<&mut Self>;

    #[doc(hidden)]
    fn take_from(payload: Payload) -> Option<Self>;
}

macro_rules! envelope_payload {
    ($ty:ty, $variant:ident) => {
        impl sealed::Sealed for $ty {}

        impl EnvelopePayload for $ty {
            const KIND: PayloadKind = PayloadKind::$variant;

            fn into_payload(self) -> Payload {
                Payload::$variant(self)
            }

            fn from_payload(payload: &Payload) -> Option<&Self> {
                match payload {
                    Payload::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn from_payload_mut(payload: &mut Payload) -> Option<&mut Self> {
                match payload {
                    Payload::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn take_from(payload: Payload) -> Option<Self> {
                match payload {
                    Payload::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

envelope_payload!(FrameData, Frame);
envelope_payload!(TrackingData, Tracking);
envelope_payload!(PoseData, Pose);
envelope_payload!(SegmentationData, Segmentation);
