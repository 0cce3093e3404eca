// THEORY:
// The `pipeline` module is the top-level API of the burrow tracker. It owns all
// state that persists across frames (background, burrow mask, tracks) and runs
// the per-frame stages in a fixed order. Every stage reads state the previous
// frame committed, so frames are processed strictly one after another.
//
// `run` wraps `process_frame` in the outer frame loop. It can be interrupted
// between frames through a shared stop flag; whatever was committed up to the
// last completed frame stays valid and can be persisted.

use crate::config::{ColorStats, PipelineConfig};
use crate::core_modules::background::{BackgroundImage, BackgroundModel};
use crate::core_modules::burrow::Burrow;
use crate::core_modules::burrow_mask::{BurrowMask, MaskUpdate};
use crate::core_modules::chunk::{ChunkFilter, extract_chunks};
use crate::core_modules::connectivity::{ConnectivityParams, ConnectivityResolver};
use crate::core_modules::ground::{GroundProfile, GroundProfileSource};
use crate::core_modules::tracker::{BurrowTrackList, FirstIntersectingMatcher, TrackMatcher, TrackUpdate};
use crate::error::{BurrowError, Result};
use image::GrayImage;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// What happened to a single frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub frame_index: u64,
    /// The mask was seeded from this frame.
    pub seeded: bool,
    pub mask_update: MaskUpdate,
    pub chunk_count: usize,
    /// Regions erased from the mask for being too bright.
    pub cleared_regions: usize,
    pub burrow_count: usize,
    pub merges: usize,
    pub tracks: TrackUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnalysisStatus {
    Finished,
    Interrupted,
}

/// Statistics of one call to `BurrowPipeline::run`.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSummary {
    pub status: AnalysisStatus,
    pub frames_analyzed: u64,
    /// Index of the last completed frame, if any.
    pub last_frame_index: Option<u64>,
    pub processing_time: Duration,
    pub processing_fps: f64,
}

/// The burrow tracker for one video.
pub struct BurrowPipeline {
    config: PipelineConfig,
    colors: ColorStats,
    dimensions: (u32, u32),
    background: BackgroundModel,
    mask: BurrowMask,
    mask_seeded: bool,
    chunk_filter: ChunkFilter,
    resolver: ConnectivityResolver,
    matcher: Box<dyn TrackMatcher>,
    tracks: BurrowTrackList,
}

impl BurrowPipeline {
    pub fn new(config: PipelineConfig, colors: ColorStats, width: u32, height: u32) -> Result<Self> {
        config.validate()?;
        colors.validate()?;
        if width == 0 || height == 0 {
            return Err(BurrowError::InvalidConfig(format!(
                "frame size must be non-zero, got {width}x{height}"
            )));
        }

        let chunk_filter = ChunkFilter {
            area_min: config.area_min,
            brightness_limit: colors.blend(config.brightness_rejection_fraction),
            ground_point_distance: config.ground_point_distance,
        };
        let resolver = ConnectivityResolver::new(ConnectivityParams::from(&config));

        Ok(Self {
            background: BackgroundModel::new(config.adaptation_rate),
            mask: BurrowMask::empty(width, height),
            mask_seeded: false,
            chunk_filter,
            resolver,
            matcher: Box::new(FirstIntersectingMatcher),
            tracks: BurrowTrackList::new(),
            dimensions: (width, height),
            config,
            colors,
        })
    }

    /// Replaces the default first-intersecting track association.
    pub fn with_matcher(mut self, matcher: Box<dyn TrackMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    /// Runs all stages on one frame and commits their results.
    pub fn process_frame(
        &mut self,
        frame_index: u64,
        frame: &GrayImage,
        ground: &GroundProfile,
    ) -> Result<FrameReport> {
        if frame.dimensions() != self.dimensions {
            return Err(BurrowError::DimensionMismatch {
                expected: self.dimensions,
                actual: frame.dimensions(),
            });
        }
        let (width, height) = self.dimensions;

        // Stage 1: Background
        let background = self.background.update(frame)?;

        // Stage 2: Burrow mask
        let ground_mask = ground.mask(width, height);
        let seeded = !self.mask_seeded;
        if seeded {
            self.mask =
                BurrowMask::initialize_from_first_frame(frame, ground, &self.colors, &self.config);
            self.mask_seeded = true;
        }
        let mask_update = self.mask.update(
            frame,
            background,
            &ground_mask,
            self.colors.change_threshold(),
            self.config.mask_safety_fraction,
        )?;
        if let MaskUpdate::SkippedCorruptFrame {
            changed_pixels,
            ground_pixels,
        } = mask_update
        {
            warn!(frame_index, changed_pixels, ground_pixels, "too much change, mask update skipped");
        }

        // Stage 3: Chunks
        let extraction = extract_chunks(&self.mask, frame, ground, &self.chunk_filter);
        self.mask.clear_regions(&extraction.too_bright);
        let chunk_count = extraction.chunks.len();

        // Stage 4: Connectivity
        let outlines = extraction.chunks.into_iter().map(|chunk| chunk.outline).collect();
        let resolution = self.resolver.resolve(outlines, ground.line());
        for outline in &resolution.painted {
            self.mask.commit_outline(outline);
        }
        let burrow_count = resolution.burrows.len();

        // Stage 5: Tracks
        let tracks = self
            .tracks
            .update(frame_index, resolution.burrows, self.matcher.as_ref());

        debug!(
            frame_index,
            chunks = chunk_count,
            burrows = burrow_count,
            merges = resolution.merges,
            new_tracks = tracks.created.len(),
            "processed frame"
        );

        Ok(FrameReport {
            frame_index,
            seeded,
            mask_update,
            chunk_count,
            cleared_regions: extraction.too_bright.len(),
            burrow_count,
            merges: resolution.merges,
            tracks,
        })
    }

    /// Processes `frames` in order until they run out or `stop` is raised.
    pub fn run<I>(
        &mut self,
        frames: I,
        ground: &impl GroundProfileSource,
        stop: &AtomicBool,
    ) -> Result<AnalysisSummary>
    where
        I: IntoIterator<Item = GrayImage>,
    {
        self.run_with(frames, ground, stop, |_, _, _| {})
    }

    /// Like `run`, but hands every frame and its report to `on_frame` once the
    /// frame has been committed.
    pub fn run_with<I, F>(
        &mut self,
        frames: I,
        ground: &impl GroundProfileSource,
        stop: &AtomicBool,
        mut on_frame: F,
    ) -> Result<AnalysisSummary>
    where
        I: IntoIterator<Item = GrayImage>,
        F: FnMut(&Self, &GrayImage, &FrameReport),
    {
        let start = Instant::now();
        let mut frames_analyzed = 0u64;
        let mut last_frame_index = None;
        let mut status = AnalysisStatus::Finished;
        info!(
            width = self.dimensions.0,
            height = self.dimensions.1,
            "starting burrow analysis"
        );

        for (iteration, frame) in frames.into_iter().enumerate() {
            if stop.load(Ordering::Relaxed) {
                status = AnalysisStatus::Interrupted;
                break;
            }

            let frame_index = iteration as u64 * self.config.frame_period;
            let profile = ground
                .profile_at(frame_index)
                .ok_or(BurrowError::MissingGround(frame_index))?;
            let report = self.process_frame(frame_index, &frame, profile)?;
            on_frame(self, &frame, &report);

            frames_analyzed += 1;
            last_frame_index = Some(frame_index);
            if frames_analyzed % self.config.progress_log_interval.max(1) == 0 {
                debug!(frame_index, tracks = self.tracks.len(), "analysis progress");
            }
        }

        let processing_time = start.elapsed();
        let seconds = processing_time.as_secs_f64();
        let processing_fps = if seconds > 0.0 {
            frames_analyzed as f64 / seconds
        } else {
            0.0
        };
        info!(
            ?status,
            frames_analyzed,
            tracks = self.tracks.len(),
            seconds,
            "burrow analysis stopped"
        );

        Ok(AnalysisSummary {
            status,
            frames_analyzed,
            last_frame_index,
            processing_time,
            processing_fps,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    pub fn mask(&self) -> &BurrowMask {
        &self.mask
    }

    pub fn background(&self) -> Option<&BackgroundImage> {
        self.background.image()
    }

    pub fn tracks(&self) -> &BurrowTrackList {
        &self.tracks
    }

    /// Latest outline of every active track, for rendering.
    pub fn active_burrows(&self) -> impl Iterator<Item = &Burrow> {
        self.tracks.active_burrows()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn colors() -> ColorStats {
        ColorStats {
            sand_mean: 100.0,
            sand_std: 5.0,
            sky_mean: 200.0,
            sky_std: 5.0,
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            area_min: 50,
            burrow_width: 10.0,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = PipelineConfig {
            frame_period: 0,
            ..config()
        };
        assert!(matches!(
            BurrowPipeline::new(config, colors(), 40, 30),
            Err(BurrowError::InvalidConfig(_))
        ));
    }

    #[test]
    fn out_of_range_colors_are_rejected() {
        let colors = ColorStats {
            sky_mean: 1e12,
            ..colors()
        };
        assert!(matches!(
            BurrowPipeline::new(config(), colors, 40, 30),
            Err(BurrowError::InvalidConfig(_))
        ));
    }

    #[test]
    fn run_processes_every_frame() {
        let mut pipeline = BurrowPipeline::new(config(), colors(), 40, 30).unwrap();
        let ground = GroundProfile::flat(10.0, 40);
        let frames = vec![GrayImage::from_pixel(40, 30, Luma([100])); 4];

        let summary = pipeline.run(frames, &ground, &AtomicBool::new(false)).unwrap();

        assert_eq!(summary.status, AnalysisStatus::Finished);
        assert_eq!(summary.frames_analyzed, 4);
        assert_eq!(summary.last_frame_index, Some(3));
        assert!(pipeline.background().is_some());
    }

    #[test]
    fn frame_size_is_checked_before_any_state_changes() {
        let mut pipeline = BurrowPipeline::new(config(), colors(), 40, 30).unwrap();
        let ground = GroundProfile::flat(10.0, 40);
        let result = pipeline.process_frame(0, &GrayImage::new(41, 30), &ground);
        assert!(matches!(result, Err(BurrowError::DimensionMismatch { .. })));
        assert!(pipeline.background().is_none());
    }

    #[test]
    fn uniform_scene_has_no_burrows() {
        let mut pipeline = BurrowPipeline::new(config(), colors(), 40, 30).unwrap();
        let ground = GroundProfile::flat(10.0, 40);
        let frame = GrayImage::from_pixel(40, 30, Luma([100]));

        let first = pipeline.process_frame(0, &frame, &ground).unwrap();
        assert!(first.seeded);
        assert_eq!(first.mask_update, MaskUpdate::Updated { added_pixels: 0 });
        let second = pipeline.process_frame(1, &frame, &ground).unwrap();
        assert!(!second.seeded);
        assert_eq!(second.chunk_count, 0);
        assert!(pipeline.tracks().is_empty());
        assert_eq!(pipeline.mask().set_pixels(), 0);
    }

    #[test]
    fn missing_ground_profile_stops_the_run() {
        struct NoGround;
        impl GroundProfileSource for NoGround {
            fn profile_at(&self, _: u64) -> Option<&GroundProfile> {
                None
            }
        }

        let mut pipeline = BurrowPipeline::new(config(), colors(), 40, 30).unwrap();
        let frames = vec![GrayImage::new(40, 30)];
        let result = pipeline.run(frames, &NoGround, &AtomicBool::new(false));
        assert!(matches!(result, Err(BurrowError::MissingGround(0))));
    }

    #[test]
    fn frame_indices_follow_the_period() {
        let config = PipelineConfig {
            frame_period: 5,
            ..config()
        };
        let mut pipeline = BurrowPipeline::new(config, colors(), 40, 30).unwrap();
        let ground = GroundProfile::flat(10.0, 40);
        let frames = vec![GrayImage::from_pixel(40, 30, Luma([100])); 3];

        let mut indices = Vec::new();
        let summary = pipeline
            .run_with(frames, &ground, &AtomicBool::new(false), |_, _, report| {
                indices.push(report.frame_index)
            })
            .unwrap();

        assert_eq!(indices, vec![0, 5, 10]);
        assert_eq!(summary.status, AnalysisStatus::Finished);
        assert_eq!(summary.frames_analyzed, 3);
        assert_eq!(summary.last_frame_index, Some(10));
    }
}
