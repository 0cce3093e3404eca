// THEORY:
// The ground reference separates sky from sand. It is estimated elsewhere and is
// read-only here: the burrow tracker only asks where the surface is, how far a
// point lies from it, and which pixels lie below it.
//
// Burrows may only exist below the surface, so the ground mask doubles as the
// pruning mask for the persistent burrow raster.

use crate::core_modules::geometry;
use crate::error::{BurrowError, Result};
use geo::{Coord, LineString};
use image::{GrayImage, Luma};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;

/// Value used for "set" pixels in every binary raster of this crate.
pub const MASK_ON: u8 = 255;

/// The sky/ground boundary for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundProfile {
    line: LineString<f64>,
}

impl GroundProfile {
    /// Builds a profile from at least two points; points are ordered left to right.
    pub fn new(points: impl IntoIterator<Item = (f64, f64)>) -> Result<Self> {
        let mut coords: Vec<Coord<f64>> = points
            .into_iter()
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .map(|(x, y)| Coord { x, y })
            .collect();
        coords.sort_by(|a, b| a.x.total_cmp(&b.x));
        coords.dedup();
        if coords.len() < 2 {
            return Err(BurrowError::DegenerateGround(coords.len()));
        }
        Ok(Self {
            line: LineString::from(coords),
        })
    }

    /// Flat ground at height `y` spanning `[0, width]`.
    pub fn flat(y: f64, width: u32) -> Self {
        Self {
            line: LineString::from(vec![(0.0, y), (width as f64, y)]),
        }
    }

    pub fn line(&self) -> &LineString<f64> {
        &self.line
    }

    pub fn points(&self) -> &[Coord<f64>] {
        &self.line.0
    }

    pub fn distance_to(&self, point: Coord<f64>) -> f64 {
        geometry::point_line_distance(point, &self.line)
    }

    pub fn project(&self, point: Coord<f64>) -> Coord<f64> {
        geometry::project_onto(&self.line, point)
    }

    /// Binary mask of the region below the ground line.
    ///
    /// The profile is closed through the right, bottom and left image edges,
    /// continuing its end points horizontally to the borders.
    pub fn mask(&self, width: u32, height: u32) -> GrayImage {
        let mut mask = GrayImage::new(width, height);
        let points = self.points();
        let (first, last) = (points[0], points[points.len() - 1]);

        let mut polygon: Vec<Point<i32>> = points.iter().map(|c| to_pixel(*c)).collect();
        polygon.push(to_pixel(Coord { x: width as f64, y: last.y }));
        polygon.push(to_pixel(Coord { x: width as f64, y: height as f64 }));
        polygon.push(to_pixel(Coord { x: 0.0, y: height as f64 }));
        polygon.push(to_pixel(Coord { x: 0.0, y: first.y }));

        polygon.dedup();
        while polygon.len() > 1 && polygon.first() == polygon.last() {
            polygon.pop();
        }
        if polygon.len() >= 3 {
            draw_polygon_mut(&mut mask, &polygon, Luma([MASK_ON]));
        }
        mask
    }
}

fn to_pixel(c: Coord<f64>) -> Point<i32> {
    Point::new(c.x.round() as i32, c.y.round() as i32)
}

/// Anything that can hand out the ground profile for a given frame index.
pub trait GroundProfileSource {
    fn profile_at(&self, frame_index: u64) -> Option<&GroundProfile>;
}

impl GroundProfileSource for GroundProfile {
    fn profile_at(&self, _frame_index: u64) -> Option<&GroundProfile> {
        Some(self)
    }
}

/// Ground profiles keyed by the first frame they apply to.
#[derive(Debug, Clone, Default)]
pub struct GroundTimeline {
    keyframes: Vec<(u64, GroundProfile)>,
}

impl GroundTimeline {
    pub fn new(mut keyframes: Vec<(u64, GroundProfile)>) -> Self {
        keyframes.sort_by_key(|(start, _)| *start);
        Self { keyframes }
    }

    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }
}

impl GroundProfileSource for GroundTimeline {
    /// Latest keyframe starting at or before `frame_index`.
    fn profile_at(&self, frame_index: u64) -> Option<&GroundProfile> {
        let upto = self
            .keyframes
            .partition_point(|(start, _)| *start <= frame_index);
        upto.checked_sub(1).map(|i| &self.keyframes[i].1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_needs_two_points() {
        assert!(matches!(
            GroundProfile::new([(1.0, 2.0)]),
            Err(BurrowError::DegenerateGround(1))
        ));
        assert!(GroundProfile::new([(5.0, 2.0), (1.0, 3.0)]).is_ok());
    }

    #[test]
    fn points_are_sorted_left_to_right() {
        let ground = GroundProfile::new([(30.0, 5.0), (0.0, 4.0), (10.0, 6.0)]).unwrap();
        let xs: Vec<f64> = ground.points().iter().map(|c| c.x).collect();
        assert_eq!(xs, vec![0.0, 10.0, 30.0]);
    }

    #[test]
    fn mask_covers_everything_below_the_line() {
        let ground = GroundProfile::flat(10.0, 40);
        let mask = ground.mask(40, 30);
        assert_eq!(mask.get_pixel(20, 5)[0], 0);
        assert_eq!(mask.get_pixel(20, 15)[0], MASK_ON);
        assert_eq!(mask.get_pixel(0, 29)[0], MASK_ON);
        assert_eq!(mask.get_pixel(39, 29)[0], MASK_ON);
    }

    #[test]
    fn mask_follows_a_sloped_profile() {
        let ground = GroundProfile::new([(10.0, 5.0), (50.0, 25.0)]).unwrap();
        let mask = ground.mask(60, 40);
        // left of the profile the first height continues to the border
        assert_eq!(mask.get_pixel(2, 8)[0], MASK_ON);
        assert_eq!(mask.get_pixel(2, 2)[0], 0);
        // right of the profile the last height continues to the border
        assert_eq!(mask.get_pixel(58, 20)[0], 0);
        assert_eq!(mask.get_pixel(58, 30)[0], MASK_ON);
    }

    #[test]
    fn distance_and_projection() {
        let ground = GroundProfile::flat(10.0, 100);
        let point = Coord { x: 30.0, y: 18.0 };
        assert!((ground.distance_to(point) - 8.0).abs() < 1e-9);
        assert_eq!(ground.project(point), Coord { x: 30.0, y: 10.0 });
    }

    #[test]
    fn timeline_returns_latest_keyframe() {
        let timeline = GroundTimeline::new(vec![
            (10, GroundProfile::flat(20.0, 50)),
            (0, GroundProfile::flat(10.0, 50)),
        ]);
        assert_eq!(timeline.profile_at(0), Some(&GroundProfile::flat(10.0, 50)));
        assert_eq!(timeline.profile_at(9), Some(&GroundProfile::flat(10.0, 50)));
        assert_eq!(timeline.profile_at(25), Some(&GroundProfile::flat(20.0, 50)));

        let late = GroundTimeline::new(vec![(5, GroundProfile::flat(10.0, 50))]);
        assert!(late.profile_at(4).is_none());
    }
}
