// THEORY:
// Polygon helpers shared by chunk extraction, the connectivity resolver and the
// tracker. Outlines are `geo::Polygon<f64>` in pixel coordinates (x to the right,
// y downwards). Raster-to-vector conversion of noisy masks regularly produces
// self-touching or zero-area rings, so every helper that builds or cleans an
// outline returns `Option` and callers drop `None` for the current frame.
//
// All distance queries go through this module so that the rest of the crate
// never depends on which `geo` distance API is in use.

use geo::{
    Area, BooleanOps, Closest, ClosestPoint, ConvexHull, Coord, Distance, Euclidean, LineString,
    MultiPoint, MultiPolygon, Point, Polygon, RemoveRepeatedPoints,
};

/// Amount by which bridge geometry is grown so unions overlap instead of touching.
pub const BRIDGE_BUFFER: f64 = 0.1;

/// Outlines with less area than this are treated as degenerate.
const MIN_OUTLINE_AREA: f64 = 1e-6;

pub type Outline = Polygon<f64>;

/// Builds a simple outline from an ordered ring of points.
pub fn outline_from_points(points: Vec<Coord<f64>>) -> Option<Outline> {
    if points.len() < 3 {
        return None;
    }
    let outline = Polygon::new(LineString::from(points), vec![]).remove_repeated_points();
    is_usable(&outline).then_some(outline)
}

fn is_usable(outline: &Outline) -> bool {
    outline.exterior().0.len() >= 4 && outline.unsigned_area() > MIN_OUTLINE_AREA
}

/// Resolves self-intersections into a single valid outline.
///
/// A ring pinched at a vertex splits into several parts; they are closed with
/// their convex hull so no part of the burrow is dropped.
pub fn regularize_polygon(polygon: &Outline) -> Option<Outline> {
    enclosing_outline(&polygon.union(polygon))
}

/// Drops holes and repeated vertices, keeping only the outer ring.
pub fn regularize_outline(polygon: Outline) -> Option<Outline> {
    let outline = Polygon::new(polygon.exterior().clone(), vec![]).remove_repeated_points();
    is_usable(&outline).then_some(outline)
}

/// Single outline enclosing all `parts`.
///
/// A union that fell apart into several pieces is closed with its convex hull,
/// so no merged region is ever lost.
pub fn enclosing_outline(parts: &MultiPolygon<f64>) -> Option<Outline> {
    let mut usable = parts.iter().filter(|part| part.unsigned_area() > MIN_OUTLINE_AREA);
    match (usable.next(), usable.next()) {
        (None, _) => None,
        (Some(single), None) => regularize_outline(single.clone()),
        (Some(_), Some(_)) => regularize_outline(parts.convex_hull()),
    }
}

/// Union of two outlines reduced to one enclosing outline.
pub fn merge_outlines(a: &Outline, b: &Outline) -> Option<Outline> {
    enclosing_outline(&a.union(b))
}

/// Convex hull of `points`, grown by `BRIDGE_BUFFER` in every direction.
///
/// Growing the input points keeps the hull two-dimensional even when all points
/// are collinear.
pub fn bridge_hull(points: &[Coord<f64>]) -> Outline {
    let spread: Vec<Point<f64>> = points
        .iter()
        .flat_map(|c| {
            [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)]
                .into_iter()
                .map(move |(dx, dy)| Point::new(c.x + dx * BRIDGE_BUFFER, c.y + dy * BRIDGE_BUFFER))
        })
        .collect();
    MultiPoint::new(spread).convex_hull()
}

pub fn point_line_distance(point: Coord<f64>, line: &LineString<f64>) -> f64 {
    Euclidean::distance(&Point::from(point), line)
}

pub fn point_outline_distance(point: Coord<f64>, outline: &Outline) -> f64 {
    Euclidean::distance(&Point::from(point), outline)
}

pub fn line_distance(a: &LineString<f64>, b: &LineString<f64>) -> f64 {
    Euclidean::distance(a, b)
}

pub fn line_outline_distance(line: &LineString<f64>, outline: &Outline) -> f64 {
    Euclidean::distance(line, outline)
}

pub fn outline_distance(a: &Outline, b: &Outline) -> f64 {
    Euclidean::distance(a, b)
}

/// Point on `line` closest to `point`.
pub fn project_onto(line: &LineString<f64>, point: Coord<f64>) -> Coord<f64> {
    match line.closest_point(&Point::from(point)) {
        Closest::Intersection(p) | Closest::SinglePoint(p) => p.into(),
        Closest::Indeterminate => point,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use geo::{Contains, Intersects};

    /// Rectangle outline with a vertex at every integer position along its edges,
    /// the way a traced raster contour looks.
    pub(crate) fn dense_rect(x0: i32, y0: i32, x1: i32, y1: i32) -> Outline {
        let mut points = Vec::new();
        for x in x0..x1 {
            points.push(Coord { x: x as f64, y: y0 as f64 });
        }
        for y in y0..y1 {
            points.push(Coord { x: x1 as f64, y: y as f64 });
        }
        for x in (x0 + 1..=x1).rev() {
            points.push(Coord { x: x as f64, y: y1 as f64 });
        }
        for y in (y0 + 1..=y1).rev() {
            points.push(Coord { x: x0 as f64, y: y as f64 });
        }
        outline_from_points(points).expect("rectangle is not degenerate")
    }

    #[test]
    fn collinear_points_do_not_form_an_outline() {
        let points = vec![
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 1.0, y: 0.0 },
            Coord { x: 2.0, y: 0.0 },
        ];
        assert!(outline_from_points(points).is_none());
    }

    #[test]
    fn bridge_hull_of_a_segment_has_area() {
        let hull = bridge_hull(&[Coord { x: 0.0, y: 0.0 }, Coord { x: 0.0, y: 10.0 }]);
        assert!(hull.unsigned_area() > 1.9);
        assert!(hull.contains(&Point::new(0.0, 5.0)));
    }

    #[test]
    fn overlapping_outlines_merge_into_one() {
        let a = dense_rect(0, 0, 10, 10);
        let b = dense_rect(5, 5, 15, 15);
        let merged = merge_outlines(&a, &b).unwrap();
        assert!(merged.contains(&Point::new(2.0, 2.0)));
        assert!(merged.contains(&Point::new(13.0, 13.0)));
        assert!((merged.unsigned_area() - 175.0).abs() < 1e-3);
    }

    #[test]
    fn disjoint_outlines_are_closed_by_their_hull() {
        let a = dense_rect(0, 0, 10, 10);
        let b = dense_rect(20, 0, 30, 10);
        let merged = merge_outlines(&a, &b).unwrap();
        assert!(merged.contains(&Point::new(15.0, 5.0)));
    }

    #[test]
    fn regularizing_drops_holes() {
        let ring = dense_rect(0, 0, 20, 20).exterior().clone();
        let hole = dense_rect(5, 5, 10, 10).exterior().clone();
        let outline = regularize_outline(Polygon::new(ring, vec![hole])).unwrap();
        assert!(outline.interiors().is_empty());
        assert!(outline.intersects(&Point::new(7.0, 7.0)));
    }

    #[test]
    fn pinched_outline_keeps_both_lobes() {
        // Two squares touching at (10, 10), traced as one ring.
        let ring = vec![
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 10.0, y: 0.0 },
            Coord { x: 10.0, y: 10.0 },
            Coord { x: 20.0, y: 10.0 },
            Coord { x: 20.0, y: 20.0 },
            Coord { x: 10.0, y: 20.0 },
            Coord { x: 10.0, y: 10.0 },
            Coord { x: 0.0, y: 10.0 },
        ];
        let pinched = Polygon::new(LineString::from(ring), vec![]);

        let outline = regularize_polygon(&pinched).unwrap();

        assert!(outline.contains(&Point::new(5.0, 5.0)));
        assert!(outline.contains(&Point::new(15.0, 15.0)));
        assert!(outline.unsigned_area() >= 200.0 - 1e-6);
    }

    #[test]
    fn distances_cover_every_geometry_pair() {
        let line = LineString::from(vec![(0.0, 0.0), (100.0, 0.0)]);
        let square = dense_rect(10, 5, 20, 15);
        let other = dense_rect(30, 5, 40, 15);
        assert!((point_outline_distance(Coord { x: 25.0, y: 10.0 }, &square) - 5.0).abs() < 1e-9);
        assert!((line_outline_distance(&line, &square) - 5.0).abs() < 1e-9);
        assert!((outline_distance(&square, &other) - 10.0).abs() < 1e-9);
        assert!((line_distance(&line, square.exterior()) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn projection_lands_on_the_line() {
        let line = LineString::from(vec![(0.0, 10.0), (100.0, 10.0)]);
        let projected = project_onto(&line, Coord { x: 40.0, y: 25.0 });
        assert!((projected.x - 40.0).abs() < 1e-9);
        assert!((projected.y - 10.0).abs() < 1e-9);
        assert!((point_line_distance(Coord { x: 40.0, y: 25.0 }, &line) - 15.0).abs() < 1e-9);
    }
}
