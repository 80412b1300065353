// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! framepipe runtime binary
//!
//! Runs the full pipeline against a synthetic camera with the model-free
//! reference collaborators and consumes the tracked, segmented frames.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use framepipe::core::traits::Segmenter;
use framepipe::{
    BodyPart, BoxSegmenter, CenterTracker, Envelope, FrameLayout, NullPoseEstimator, Pipeline,
    PipelineBuilder, PipelineConfig, SyntheticSource,
};
use tracing_appender::non_blocking::WorkerGuard;

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "framepipe-runtime")]
#[command(author, version, about = "framepipe pipeline driver", long_about = None)]
struct Args {
    /// Pipeline config file (TOML, YAML or JSON)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Synthetic frame width
    #[arg(long, default_value = "640")]
    width: u32,

    /// Synthetic frame height
    #[arg(long, default_value = "480")]
    height: u32,

    /// Bytes per pixel
    #[arg(long, default_value = "3")]
    channels: u32,

    /// Capture rate of the synthetic camera
    #[arg(long, default_value = "30")]
    fps: f64,

    /// Stop after this many captured frames
    #[arg(long)]
    frames: Option<u64>,

    /// Stop after this many seconds
    #[arg(long, value_name = "SECS")]
    duration: Option<f64>,

    /// Override the number of segmentation workers
    #[arg(long)]
    workers: Option<usize>,

    /// Skip pose estimation
    #[arg(long)]
    no_pose: bool,

    /// Copy frames inline instead of sharing them through the pool
    #[arg(long)]
    no_pool: bool,

    /// Body part used to narrow segmentation prompts
    #[arg(long, value_enum)]
    body_part: Option<BodyPartArg>,

    /// Seconds between stats log lines
    #[arg(long, default_value = "5")]
    stats_interval: f64,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Write every consumed frame as raw bytes into this directory
    #[arg(long, value_name = "DIR")]
    dump_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum BodyPartArg {
    All,
    LeftArm,
    RightArm,
    BothArms,
    OnlyFace,
}

impl From<BodyPartArg> for BodyPart {
    fn from(arg: BodyPartArg) -> Self {
        match arg {
            BodyPartArg::All => BodyPart::All,
            BodyPartArg::LeftArm => BodyPart::LeftArm,
            BodyPartArg::RightArm => BodyPart::RightArm,
            BodyPartArg::BothArms => BodyPart::BothArms,
            BodyPartArg::OnlyFace => BodyPart::OnlyFace,
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

fn setup_logging(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::prelude::*;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let directory = path.parent().filter(|p| !p.as_os_str().is_empty());
            let directory = directory.unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow!("Invalid log file path: {}", path.display()))?;
            std::fs::create_dir_all(directory)
                .with_context(|| format!("Failed to create {}", directory.display()))?;

            let appender = tracing_appender::rolling::never(directory, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_thread_names(true))
        .with(file_layer)
        .init();

    Ok(guard)
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if let Some(workers) = args.workers {
        config.stages.segmentation_workers = workers;
    }
    if args.no_pose {
        config.stages.pose = false;
    }
    if args.no_pool {
        config.use_pool = false;
    }
    if let Some(part) = args.body_part {
        config.stages.body_part = part.into();
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Consumer
// ---------------------------------------------------------------------------

fn dump_frame(pipeline: &Pipeline, envelope: &Envelope, dir: &Path, index: u64) -> Result<()> {
    let view = pipeline.frame_view(envelope)?;
    let path = dir.join(format!("frame_{:06}.raw", index));
    std::fs::write(&path, view.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn consume(pipeline: &mut Pipeline, args: &Args) -> Result<u64> {
    let stop = pipeline.stop_handle();
    let deadline = args
        .duration
        .map(|secs| Instant::now() + Duration::from_secs_f64(secs.max(0.0)));
    let stats_interval = Duration::from_secs_f64(args.stats_interval.max(0.1));
    let mut last_stats = Instant::now();
    let mut consumed = 0u64;

    loop {
        if deadline.is_some_and(|d| Instant::now() >= d) && !stop.is_stopped() {
            tracing::info!("Duration reached, stopping capture");
            stop.stop();
        }

        let Some(envelope) = pipeline.recv(Duration::from_millis(100)) else {
            if pipeline.is_closed() {
                break;
            }
            continue;
        };
        if envelope.is_terminal() {
            break;
        }

        let dumped = match &args.dump_dir {
            Some(dir) => dump_frame(pipeline, &envelope, dir, consumed),
            None => Ok(()),
        };
        pipeline.release(envelope)?;
        dumped?;
        consumed += 1;

        if last_stats.elapsed() >= stats_interval {
            let snapshot = serde_json::to_string(&pipeline.stats_snapshot())?;
            tracing::info!("Consumed {} frame(s), stats {}", consumed, snapshot);
            last_stats = Instant::now();
        }
    }

    Ok(consumed)
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = setup_logging(args.log_file.as_deref())?;

    let config = load_config(&args)?;
    if let Some(dir) = &args.dump_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let layout = FrameLayout::new(args.width, args.height, args.channels);
    let source = SyntheticSource::new(layout).with_fps(args.fps);

    let mut pipeline = PipelineBuilder::new(config)
        .source(source)
        .tracker(CenterTracker::default())
        .pose_estimator(NullPoseEstimator)
        .segmenter_factory(|_| Ok(Box::new(BoxSegmenter) as Box<dyn Segmenter>))
        .max_frames(args.frames)
        .start()
        .context("Failed to start pipeline")?;

    let stop = pipeline.stop_handle();
    ctrlc::set_handler(move || stop.stop()).context("Failed to install Ctrl+C handler")?;
    println!("Press Ctrl+C to stop");

    let consumed = consume(&mut pipeline, &args);
    let stats = pipeline.stats_snapshot();
    let report = pipeline.shutdown();

    for stage in &report.stages {
        tracing::info!(
            "[{}] {:?}: processed {}, published {}, discarded {}, evicted {} in {:?}",
            stage.stage_id,
            stage.exit,
            stage.processed,
            stage.published,
            stage.discarded,
            stage.evicted,
            stage.elapsed
        );
    }
    if !report.abandoned.is_empty() {
        tracing::warn!("Abandoned stage(s): {}", report.abandoned.join(", "));
    }

    let consumed = consumed?;
    println!(
        "Consumed {} frame(s); {}",
        consumed,
        serde_json::to_string_pretty(&stats)?
    );

    if let Some(error) = pipeline.terminal_error() {
        return Err(anyhow!("Pipeline closed with error: {}", error));
    }
    Ok(())
}
