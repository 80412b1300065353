// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use super::target_registry::{TargetRegistry, TargetRegistryConfig};
use crate::core::envelope::{Envelope, PayloadKind};
use crate::core::executor::{Disposition, Stage, StageContext};
use crate::core::frames::TrackingData;
use crate::core::traits::Tracker;
use crate::core::Result;

pub const TRACKING_STAGE_ID: &str = "tracker";

/// Runs the tracker on every frame and adds `TrackingData`.
pub struct TrackingStage {
    tracker: Box<dyn Tracker>,
    registry: TargetRegistry,
}

impl TrackingStage {
    pub fn new(tracker: Box<dyn Tracker>, config: TargetRegistryConfig) -> Self {
        Self {
            tracker,
            registry: TargetRegistry::new(config),
        }
    }
}

impl Stage for TrackingStage {
    fn id(&self) -> &str {
        TRACKING_STAGE_ID
    }

    fn required_payloads(&self) -> &[PayloadKind] {
        &[PayloadKind::Frame]
    }

    fn process(&mut self, envelope: &mut Envelope, ctx: &mut StageContext) -> Result<Disposition> {
        let tracking = {
            let image = ctx.frame(envelope)?;
            let layout = image.layout();
            let detections = self.tracker.track(&image)?;
            let frame_index = self.registry.current_frame();
            let targets = self.registry.update(&detections, layout.width, layout.height);
            tracing::trace!(
                "[{}] #{}: {} detection(s), {} live target(s)",
                TRACKING_STAGE_ID,
                envelope.sequence(),
                detections.len(),
                targets.len()
            );
            TrackingData {
                targets,
                frame_index,
            }
        };
        envelope.insert(tracking)?;
        Ok(Disposition::Publish)
    }
}
