use crate::core_modules::geometry::{self, Outline};
use geo::{Area, Centroid, Coord, Intersects, LineString};

/// A ground-connected burrow outline for a single frame.
///
/// Burrows have no identity of their own; `BurrowTrack` links them across frames.
#[derive(Debug, Clone, PartialEq)]
pub struct Burrow {
    outline: Outline,
}

impl Burrow {
    pub fn new(outline: Outline) -> Self {
        Self { outline }
    }

    pub fn outline(&self) -> &Outline {
        &self.outline
    }

    pub fn points(&self) -> &[Coord<f64>] {
        &self.outline.exterior().0
    }

    pub fn area(&self) -> f64 {
        self.outline.unsigned_area()
    }

    pub fn centroid(&self) -> Option<Coord<f64>> {
        self.outline.centroid().map(Into::into)
    }

    pub fn intersects(&self, other: &Burrow) -> bool {
        self.outline.intersects(&other.outline)
    }

    pub fn distance_to_line(&self, line: &LineString<f64>) -> f64 {
        geometry::line_outline_distance(line, &self.outline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::geometry::tests::dense_rect;

    #[test]
    fn overlapping_burrows_intersect() {
        let a = Burrow::new(dense_rect(0, 0, 10, 10));
        let b = Burrow::new(dense_rect(8, 8, 20, 20));
        let c = Burrow::new(dense_rect(30, 30, 40, 40));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn burrow_measures() {
        let burrow = Burrow::new(dense_rect(0, 0, 10, 4));
        assert!((burrow.area() - 40.0).abs() < 1e-9);
        assert_eq!(burrow.centroid(), Some(Coord { x: 5.0, y: 2.0 }));
        let ground = LineString::from(vec![(0.0, -3.0), (10.0, -3.0)]);
        assert!((burrow.distance_to_line(&ground) - 3.0).abs() < 1e-9);
    }
}
