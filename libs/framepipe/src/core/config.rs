// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Pipeline configuration, loadable from TOML, YAML or JSON.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::executor::PacingConfig;
use crate::core::frames::BodyPart;
use crate::core::link_channel::StageChannelConfig;
use crate::core::pool::{ExhaustionPolicy, FramePoolConfig};
use crate::core::stages::TargetRegistryConfig;
use crate::core::{PipelineError, Result};

/// Worker stage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagesConfig {
    /// Competing segmentation workers on the tracked-frame channel.
    pub segmentation_workers: usize,
    /// Run pose estimation between tracking and segmentation.
    pub pose: bool,
    /// Segmentation runs at `1 / down_scale` resolution.
    pub down_scale: f32,
    /// Initial body part for segmentation prompts.
    pub body_part: BodyPart,
    pub min_box_area: i64,
    pub max_aspect_ratio: f32,
    pub padding_ratio: f32,
    pub grace_frames: u64,
}

impl Default for StagesConfig {
    fn default() -> Self {
        let registry = TargetRegistryConfig::default();
        Self {
            segmentation_workers: 2,
            pose: true,
            down_scale: registry.down_scale,
            body_part: BodyPart::All,
            min_box_area: registry.min_box_area,
            max_aspect_ratio: registry.max_aspect_ratio,
            padding_ratio: registry.padding_ratio,
            grace_frames: registry.grace_frames,
        }
    }
}

impl StagesConfig {
    pub fn registry_config(&self) -> TargetRegistryConfig {
        TargetRegistryConfig {
            min_box_area: self.min_box_area,
            max_aspect_ratio: self.max_aspect_ratio,
            padding_ratio: self.padding_ratio,
            grace_frames: self.grace_frames,
            down_scale: self.down_scale,
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub pool: FramePoolConfig,
    /// Share frames through the pool; `false` copies every frame inline.
    pub use_pool: bool,
    pub channel: StageChannelConfig,
    pub pacing: PacingConfig,
    pub stages: StagesConfig,
    /// Hard bound on `Pipeline::shutdown`.
    pub shutdown_timeout_ms: u64,
    /// Samples kept by the consumer's frame stats.
    pub stats_window: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pool: FramePoolConfig::default(),
            use_pool: true,
            channel: StageChannelConfig::default(),
            pacing: PacingConfig::default(),
            stages: StagesConfig::default(),
            shutdown_timeout_ms: 2000,
            stats_window: 100,
        }
    }
}

impl PipelineConfig {
    /// Load from a file, picking the format from its extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let config = match extension.as_deref() {
            Some("toml") => Self::from_toml_str(&content),
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            Some("json") => serde_json::from_str(&content).map_err(|e| {
                PipelineError::Configuration(format!("Invalid JSON config: {}", e))
            }),
            _ => Err(PipelineError::Configuration(format!(
                "Unsupported config format: {}",
                path.display()
            ))),
        }?;

        config.validate()?;
        tracing::info!("Loaded pipeline config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| PipelineError::Configuration(format!("Invalid TOML config: {}", e)))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| PipelineError::Configuration(format!("Invalid YAML config: {}", e)))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |message: &str| Err(PipelineError::Configuration(message.to_string()));

        if self.use_pool && self.pool.capacity == 0 {
            return fail("pool.capacity must be at least 1");
        }
        if let ExhaustionPolicy::Block {
            timeout_ms: Some(0),
        } = self.pool.exhaustion_policy
        {
            return fail("pool.exhaustion_policy timeout must be positive (use return_error instead)");
        }
        if self.channel.capacity == 0 {
            return fail("channel.capacity must be at least 1");
        }
        if self.stages.segmentation_workers == 0 {
            return fail("stages.segmentation_workers must be at least 1");
        }
        if self.stages.down_scale.is_nan() || self.stages.down_scale < 1.0 {
            return fail("stages.down_scale must be >= 1.0");
        }
        if self.stages.max_aspect_ratio.is_nan() || self.stages.max_aspect_ratio <= 0.0 {
            return fail("stages.max_aspect_ratio must be positive");
        }
        if self.stages.padding_ratio < 0.0 {
            return fail("stages.padding_ratio must not be negative");
        }
        if self.pacing.grow_secs < 0.0 || self.pacing.decay_secs < 0.0 || self.pacing.threshold_secs < 0.0 {
            return fail("pacing constants must not be negative");
        }
        if self.stats_window == 0 {
            return fail("stats_window must be at least 1");
        }
        Ok(())
    }
}
