// THEORY:
// A `Chunk` is one connected region of the burrow mask, reduced to its outer
// outline for the current frame. Chunks are transient: they are extracted anew
// every frame and have no identity across frames.
//
// Extraction is a filter over the mask's connected regions:
// 1.  **Size**: regions smaller than `area_min` pixels are noise.
// 2.  **Colour**: a region whose mean frame intensity is brighter than a sand/sky
//     blend cannot be a dark burrow. These regions are reported back so the
//     caller can erase them from the persistent mask for good.
// 3.  **Depth**: a region whose centroid lies within half the ground-point
//     distance of the ground line is indistinguishable from surface noise.
// Survivors are traced into an outline. A trace that collapses to a line or a
// point is dropped for this frame.

use crate::core_modules::burrow_mask::{BurrowMask, Region, find_regions};
use crate::core_modules::geometry::{self, Outline};
use crate::core_modules::ground::{GroundProfile, MASK_ON};
use geo::Coord;
use image::{GrayImage, Luma};
use imageproc::contours::{BorderType, find_contours};

/// Candidate burrow outline extracted from the mask in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Traced outer contour, one vertex per boundary pixel.
    pub outline: Outline,
    /// Number of mask pixels in the region.
    pub area: usize,
    pub centroid: Coord<f64>,
    /// Mean intensity of the frame inside the region.
    pub mean_intensity: f64,
}

/// Thresholds applied to every region of the mask.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkFilter {
    pub area_min: usize,
    /// Regions brighter than this (on average) are not burrows.
    pub brightness_limit: f64,
    pub ground_point_distance: f64,
}

/// Result of one extraction pass.
#[derive(Debug, Clone, Default)]
pub struct ChunkExtraction {
    pub chunks: Vec<Chunk>,
    /// Regions rejected for being too bright; they should be cleared from the mask.
    pub too_bright: Vec<Region>,
    pub too_small: usize,
    pub too_shallow: usize,
    pub degenerate: usize,
}

/// Reduces `mask` to chunk outlines without modifying it.
pub fn extract_chunks(
    mask: &BurrowMask,
    frame: &GrayImage,
    ground: &GroundProfile,
    filter: &ChunkFilter,
) -> ChunkExtraction {
    let mut extraction = ChunkExtraction::default();

    for region in find_regions(mask.image()) {
        if region.area() < filter.area_min {
            extraction.too_small += 1;
            continue;
        }

        let mean_intensity = region.mean_intensity(frame);
        if mean_intensity > filter.brightness_limit {
            extraction.too_bright.push(region);
            continue;
        }

        let centroid = region.centroid();
        if ground.distance_to(centroid) < filter.ground_point_distance / 2.0 {
            extraction.too_shallow += 1;
            continue;
        }

        match trace_outline(&region) {
            Some(outline) => extraction.chunks.push(Chunk {
                outline,
                area: region.area(),
                centroid,
                mean_intensity,
            }),
            None => extraction.degenerate += 1,
        }
    }

    extraction
}

/// Traces the outer boundary of a single region.
///
/// The region is copied into a padded crop of its bounding box so the tracer sees
/// exactly one component.
pub fn trace_outline(region: &Region) -> Option<Outline> {
    let (x0, y0) = region.min;
    let width = region.max.0 - x0 + 3;
    let height = region.max.1 - y0 + 3;
    let mut crop = GrayImage::new(width, height);
    for &(x, y) in &region.pixels {
        crop.put_pixel(x - x0 + 1, y - y0 + 1, Luma([MASK_ON]));
    }

    let contour = find_contours::<i32>(&crop)
        .into_iter()
        .find(|contour| contour.border_type == BorderType::Outer && contour.parent.is_none())?;
    let points = contour
        .points
        .iter()
        .map(|p| Coord {
            x: (p.x - 1) as f64 + x0 as f64,
            y: (p.y - 1) as f64 + y0 as f64,
        })
        .collect();
    geometry::outline_from_points(points)
}
