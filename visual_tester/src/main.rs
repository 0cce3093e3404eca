mod frames;
mod overlay;
mod results;
mod scene;

use anyhow::{Context, Result};
use burrow_vision::core_modules::ground::GroundProfileSource;
use burrow_vision::{AnalysisStatus, BurrowPipeline, PipelineConfig};
use frames::FrameSource;
use results::SummaryRecord;
use scene::Scene;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

struct Args {
    input: PathBuf,
    scene: PathBuf,
    output: PathBuf,
    config: Option<PathBuf>,
}

impl Args {
    fn parse() -> Option<Self> {
        let mut args = env::args_os().skip(1).map(PathBuf::from);
        Some(Self {
            input: args.next()?,
            scene: args.next()?,
            output: args.next()?,
            config: args.next(),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "burrow_vision=info,visual_tester=info".into()),
        )
        .init();

    // --- 1. Argument Parsing ---
    let Some(args) = Args::parse() else {
        println!("Usage: visual_tester <frame_dir_or_video> <scene.json> <output_dir> [config.yaml]");
        return Ok(());
    };

    // --- 2. Interrupt Handling ---
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping after the current frame");
                stop.store(true, Ordering::Relaxed);
            }
        });
    }

    // --- 3. Analysis ---
    // The pipeline is synchronous, so it runs on the blocking pool while the
    // signal handler keeps listening.
    tokio::task::spawn_blocking(move || analyze(&args, &stop)).await?
}

fn analyze(args: &Args, stop: &AtomicBool) -> Result<()> {
    // --- 1. Inputs ---
    let config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    let scene = Scene::load(&args.scene)?;
    let ground = scene.ground_timeline()?;
    let frames = FrameSource::open(&args.input)?;
    let (width, height) = frames.dimensions();

    let overlay_dir = args.output.join("frames");
    fs::create_dir_all(&overlay_dir)
        .with_context(|| format!("failed to create {}", overlay_dir.display()))?;

    // --- 2. Frame Loop ---
    let mut pipeline = BurrowPipeline::new(config, scene.colors, width, height)?;
    let outcome = pipeline.run_with(frames, &ground, stop, |pipeline, frame, report| {
        if let Some(profile) = ground.profile_at(report.frame_index) {
            let canvas = overlay::render(pipeline, frame, profile);
            overlay::save(&canvas, &overlay_path(&overlay_dir, report.frame_index));
        }
    });

    // --- 3. Results ---
    // Tracks are written even if the run failed part way through.
    let tracks_path = args.output.join("tracks.json");
    results::write_tracks(pipeline.tracks(), &tracks_path)?;
    let summary = outcome?;

    let record = SummaryRecord::new(&summary, pipeline.tracks());
    results::write_summary(&record, &args.output.join("summary.json"))?;

    match summary.status {
        AnalysisStatus::Finished => info!(
            frames = summary.frames_analyzed,
            tracks = record.tracks,
            fps = summary.processing_fps,
            "analysis finished, results in {}",
            args.output.display()
        ),
        AnalysisStatus::Interrupted => warn!(
            frames = summary.frames_analyzed,
            tracks = record.tracks,
            "analysis interrupted, partial results in {}",
            args.output.display()
        ),
    }
    Ok(())
}

fn overlay_path(dir: &Path, frame_index: u64) -> PathBuf {
    dir.join(format!("frame_{frame_index:06}.png"))
}
