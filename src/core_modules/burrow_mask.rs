// THEORY:
// The `BurrowMask` is the long-term memory of the burrow tracker: a binary raster
// marking every pixel currently believed to be excavated. It is never recomputed
// from scratch. Each frame it accretes newly darkened regions, is closed to fuse
// nearby fragments, and is pruned to the ground region.
//
// Key architectural principles:
// 1.  **Few, named mutation points**: the raster only changes through `update`,
//     `clear_regions` and `commit_outline`. Chunk extraction and connectivity
//     resolution are pure and hand back what should be written.
// 2.  **Soft failure**: a frame in which too much of the ground darkens at once is
//     almost always a lighting flicker. Such frames leave the mask untouched and
//     report `MaskUpdate::SkippedCorruptFrame` instead of raising an error.
// 3.  **Always binary**: every mutation writes either 0 or `MASK_ON`.

use crate::config::{ColorStats, PipelineConfig};
use crate::core_modules::background::BackgroundImage;
use crate::core_modules::geometry::Outline;
use crate::core_modules::ground::{GroundProfile, MASK_ON};
use crate::error::{BurrowError, Result};
use geo::Coord;
use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::drawing::draw_polygon_mut;
use imageproc::morphology::{close, erode, open};
use imageproc::point::Point;
use imageproc::region_labelling::{Connectivity, connected_components};
use tracing::debug;

/// A bootstrap mask whose largest region exceeds this many times `area_min` has
/// swallowed sand or sky and is thresholded again more strictly.
const INITIAL_AREA_FACTOR: usize = 10;

/// Outcome of folding one frame into the mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskUpdate {
    /// The mask absorbed the frame's excavation.
    Updated { added_pixels: usize },
    /// Too many pixels changed at once; the mask was left as it was.
    SkippedCorruptFrame {
        changed_pixels: usize,
        ground_pixels: usize,
    },
}

/// One 8-connected region of a binary raster.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Region {
    pub pixels: Vec<(u32, u32)>,
    pub min: (u32, u32),
    pub max: (u32, u32),
}

impl Region {
    fn push(&mut self, x: u32, y: u32) {
        if self.pixels.is_empty() {
            self.min = (x, y);
            self.max = (x, y);
        } else {
            self.min = (self.min.0.min(x), self.min.1.min(y));
            self.max = (self.max.0.max(x), self.max.1.max(y));
        }
        self.pixels.push((x, y));
    }

    pub fn area(&self) -> usize {
        self.pixels.len()
    }

    pub fn centroid(&self) -> Coord<f64> {
        let n = self.pixels.len().max(1) as f64;
        let (sx, sy) = self
            .pixels
            .iter()
            .fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + x as f64, sy + y as f64));
        Coord { x: sx / n, y: sy / n }
    }

    pub fn mean_intensity(&self, frame: &GrayImage) -> f64 {
        if self.pixels.is_empty() {
            return 0.0;
        }
        let total: u64 = self
            .pixels
            .iter()
            .map(|&(x, y)| frame.get_pixel(x, y)[0] as u64)
            .sum();
        total as f64 / self.pixels.len() as f64
    }
}

/// Splits the set pixels of `mask` into connected regions, in label order.
pub fn find_regions(mask: &GrayImage) -> Vec<Region> {
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));
    let mut regions: Vec<Region> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0] as usize;
        if label == 0 {
            continue;
        }
        if label > regions.len() {
            regions.resize_with(label, Region::default);
        }
        regions[label - 1].push(x, y);
    }
    regions.retain(|region| !region.pixels.is_empty());
    regions
}

/// The persistent burrow raster.
#[derive(Debug, Clone, PartialEq)]
pub struct BurrowMask {
    pixels: GrayImage,
}

impl BurrowMask {
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            pixels: GrayImage::new(width, height),
        }
    }

    /// Seeds the mask from the raw first frame, before the background has any history.
    ///
    /// Pixels darker than a sand/sky blend are taken as pre-dug burrow. The
    /// threshold is lowered one grey level at a time until no region is larger than
    /// `INITIAL_AREA_FACTOR * area_min`, then regions whose centroid lies farther
    /// than `ground_point_distance` from the ground line are dropped.
    pub fn initialize_from_first_frame(
        frame: &GrayImage,
        ground: &GroundProfile,
        colors: &ColorStats,
        config: &PipelineConfig,
    ) -> Self {
        let (width, height) = frame.dimensions();
        let radius = (config.ground_point_distance / 2.0).floor().clamp(0.0, 255.0) as u8;
        let allowed = erode(&ground.mask(width, height), Norm::L1, radius);
        let area_limit = INITIAL_AREA_FACTOR * config.area_min;

        // Above 255 every pixel is already below the threshold.
        let mut threshold = colors.blend(config.initial_threshold_fraction).min(256.0);
        let (pixels, regions) = loop {
            let pixels = threshold_below(frame, &allowed, threshold);
            let regions = find_regions(&pixels);
            let largest = regions.iter().map(Region::area).max().unwrap_or(0);
            if largest <= area_limit {
                break (pixels, regions);
            }
            threshold -= 1.0;
        };
        debug!(threshold, regions = regions.len(), "seeded burrow mask");

        let mut mask = Self { pixels };
        let too_deep: Vec<Region> = regions
            .into_iter()
            .filter(|region| ground.distance_to(region.centroid()) > config.ground_point_distance)
            .collect();
        mask.clear_regions(&too_deep);
        mask
    }

    /// Folds the excavation visible in `frame` into the mask.
    pub fn update(
        &mut self,
        frame: &GrayImage,
        background: &BackgroundImage,
        ground_mask: &GrayImage,
        change_threshold: f64,
        safety_fraction: f64,
    ) -> Result<MaskUpdate> {
        for dimensions in [frame.dimensions(), background.dimensions(), ground_mask.dimensions()] {
            if dimensions != self.pixels.dimensions() {
                return Err(BurrowError::DimensionMismatch {
                    expected: self.pixels.dimensions(),
                    actual: dimensions,
                });
            }
        }

        // --- 1. Pixels that became darker than the background ---
        let limit = -(change_threshold as f32);
        let mut excavated = GrayImage::new(frame.width(), frame.height());
        let mut changed_pixels = 0;
        for ((out, &value), &bg) in excavated
            .iter_mut()
            .zip(frame.as_raw())
            .zip(background.as_raw())
        {
            if value as f32 - bg < limit {
                *out = MASK_ON;
                changed_pixels += 1;
            }
        }

        // --- 2. Safety check against flicker ---
        let ground_pixels = count_set(ground_mask);
        if changed_pixels as f64 > safety_fraction * ground_pixels as f64 {
            return Ok(MaskUpdate::SkippedCorruptFrame {
                changed_pixels,
                ground_pixels,
            });
        }

        // --- 3. Accrete, fuse, prune ---
        let excavated = open(&excavated, Norm::L1, 1);
        let mut added_pixels = 0;
        for (current, &new) in self.pixels.iter_mut().zip(excavated.as_raw()) {
            if new != 0 && *current == 0 {
                *current = MASK_ON;
                added_pixels += 1;
            }
        }
        self.pixels = close(&self.pixels, Norm::L1, 1);
        self.prune(ground_mask);

        Ok(MaskUpdate::Updated { added_pixels })
    }

    /// Clears every pixel outside `ground_mask`.
    pub fn prune(&mut self, ground_mask: &GrayImage) {
        for (current, &ground) in self.pixels.iter_mut().zip(ground_mask.as_raw()) {
            if ground == 0 {
                *current = 0;
            }
        }
    }

    pub fn clear_regions(&mut self, regions: &[Region]) {
        for region in regions {
            for &(x, y) in &region.pixels {
                self.pixels.put_pixel(x, y, Luma([0]));
            }
        }
    }

    /// Fills `outline` into the mask so later frames start from the resolved shape.
    pub fn commit_outline(&mut self, outline: &Outline) {
        let mut polygon: Vec<Point<i32>> = outline
            .exterior()
            .coords()
            .map(|c| Point::new(c.x.round() as i32, c.y.round() as i32))
            .collect();
        polygon.dedup();
        while polygon.len() > 1 && polygon.first() == polygon.last() {
            polygon.pop();
        }
        if polygon.len() >= 3 {
            draw_polygon_mut(&mut self.pixels, &polygon, Luma([MASK_ON]));
        }
    }

    pub fn image(&self) -> &GrayImage {
        &self.pixels
    }

    pub fn is_set(&self, x: u32, y: u32) -> bool {
        self.pixels.get_pixel(x, y)[0] != 0
    }

    pub fn set_pixels(&self) -> usize {
        count_set(&self.pixels)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}

impl From<GrayImage> for BurrowMask {
    /// Wraps an existing raster; any non-zero pixel counts as burrow.
    fn from(mut pixels: GrayImage) -> Self {
        for value in pixels.iter_mut() {
            if *value != 0 {
                *value = MASK_ON;
            }
        }
        Self { pixels }
    }
}

fn count_set(mask: &GrayImage) -> usize {
    mask.as_raw().iter().filter(|&&v| v != 0).count()
}

fn threshold_below(frame: &GrayImage, allowed: &GrayImage, threshold: f64) -> GrayImage {
    let mut mask = GrayImage::new(frame.width(), frame.height());
    for ((out, &value), &ok) in mask.iter_mut().zip(frame.as_raw()).zip(allowed.as_raw()) {
        if ok != 0 && (value as f64) < threshold {
            *out = MASK_ON;
        }
    }
    mask
}
