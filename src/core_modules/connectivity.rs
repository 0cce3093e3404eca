// THEORY:
// The `ConnectivityResolver` turns the loose chunks of one frame into burrows that
// all reach the surface. A burrow is dug from the surface, so a chunk floating in
// the sand is either a burrow whose connecting tunnel has not been detected yet,
// or a piece of a burrow next to it. The resolver makes that explicit by adding
// bridge geometry.
//
// Algorithm (greedy single-linkage agglomeration onto the ground):
// 1.  **Distances**: every chunk's distance to the ground line and the pairwise
//     distances between chunk outlines are computed once up front.
// 2.  **Direct links**: a chunk at least as close to the ground as to any other
//     chunk is linked to the ground. Equal distances resolve towards the ground.
// 3.  **Fallback**: if no chunk qualified, the chunk closest to the ground is
//     linked to it anyway, so the agglomeration below has a seed.
// 4.  **Merging**: while unlinked chunks remain, the closest (unlinked, linked)
//     pair is bridged and merged. A disjoint set tracks which chunks now share a
//     merged outline; the outline is stored once, at the set's representative.
// 5.  **Output**: one burrow per set, in order of the set's first chunk.
// Every iteration links exactly one chunk, so the loop runs at most N - 1 times.
//
// Bridging clusters the chunk's boundary points that face the target, so a burrow
// with two separate exits gets two bridges rather than one wide hull between them.

use crate::config::PipelineConfig;
use crate::core_modules::burrow::Burrow;
use crate::core_modules::disjoint_set::DisjointSet;
use crate::core_modules::geometry::{self, Outline};
use geo::{Coord, LineString};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectivityParams {
    pub burrow_width: f64,
    pub cluster_distance: f64,
    /// Chunks closer than this to the ground already touch it and need no bridge.
    pub connection_tolerance: f64,
}

impl From<&PipelineConfig> for ConnectivityParams {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            burrow_width: config.burrow_width,
            cluster_distance: config.cluster_distance(),
            connection_tolerance: config.connection_tolerance,
        }
    }
}

/// A chunk outline extended towards a structure.
#[derive(Debug, Clone)]
pub struct Bridge {
    pub outline: Outline,
    /// One hull per cluster of exit points.
    pub hulls: Vec<Outline>,
}

/// Everything the resolver produced for one frame.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub burrows: Vec<Burrow>,
    /// Outlines that should be filled into the burrow mask.
    pub painted: Vec<Outline>,
    pub direct_links: usize,
    pub forced_link: bool,
    pub merges: usize,
}

pub struct ConnectivityResolver {
    params: ConnectivityParams,
}

impl ConnectivityResolver {
    pub fn new(params: ConnectivityParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ConnectivityParams {
        &self.params
    }

    /// Links every chunk outline to `ground`, directly or through other chunks.
    pub fn resolve(&self, chunks: Vec<Outline>, ground: &LineString<f64>) -> Resolution {
        let mut resolution = Resolution::default();
        let n = chunks.len();
        if n == 0 {
            return resolution;
        }

        // --- 1. Distance matrix ---
        let ground_dist: Vec<f64> = chunks
            .iter()
            .map(|chunk| geometry::line_distance(ground, chunk.exterior()))
            .collect();
        let mut chunk_dist = vec![vec![f64::INFINITY; n]; n];
        for i in 0..n {
            for j in i + 1..n {
                let d = geometry::line_distance(chunks[i].exterior(), chunks[j].exterior());
                chunk_dist[i][j] = d;
                chunk_dist[j][i] = d;
            }
        }

        let mut sets = DisjointSet::new(n);
        let mut outlines = chunks;
        let mut connected = Vec::with_capacity(n);
        let mut disconnected = Vec::with_capacity(n);

        // --- 2. Chunks that reach the ground on their own ---
        for k in 0..n {
            let nearest_chunk = chunk_dist[k].iter().copied().fold(f64::INFINITY, f64::min);
            if ground_dist[k] <= nearest_chunk {
                if ground_dist[k] > self.params.connection_tolerance {
                    let bridge = self.connect_to_structure(&outlines[k], ground);
                    resolution.painted.push(bridge.outline.clone());
                    outlines[k] = bridge.outline;
                }
                resolution.direct_links += 1;
                connected.push(k);
            } else {
                disconnected.push(k);
            }
        }

        // --- 3. Guarantee a seed ---
        if connected.is_empty() {
            let k = first_min_index(&ground_dist);
            trace!(chunk = k, distance = ground_dist[k], "forcing ground link");
            let bridge = self.connect_to_structure(&outlines[k], ground);
            resolution.painted.push(bridge.outline.clone());
            outlines[k] = bridge.outline;
            resolution.forced_link = true;
            disconnected.retain(|&i| i != k);
            connected.push(k);
        }

        // --- 4. Merge the rest onto connected structures ---
        while !disconnected.is_empty() {
            let (slot, target) = nearest_pair(&disconnected, &connected, &chunk_dist);
            let chunk = disconnected.remove(slot);
            let target_root = sets.find(target);
            trace!(chunk, target, distance = chunk_dist[chunk][target], "merging chunk");

            let structure = outlines[target_root].exterior().clone();
            let bridge = self.connect_to_structure(&outlines[sets.find(chunk)], &structure);
            let target_outline = geometry::regularize_polygon(&outlines[target_root])
                .unwrap_or_else(|| outlines[target_root].clone());
            let merged = geometry::merge_outlines(&bridge.outline, &target_outline)
                .unwrap_or(target_outline);

            let root = sets.union(chunk, target);
            resolution.painted.push(merged.clone());
            outlines[root] = merged;
            connected.push(chunk);
            resolution.merges += 1;
        }

        // --- 5. One burrow per merged set ---
        for group in sets.groups() {
            let root = sets.find(group[0]);
            resolution.burrows.push(Burrow::new(outlines[root].clone()));
        }
        resolution
    }

    /// Extends `chunk` with one bridge hull per exit towards `structure`.
    ///
    /// Each hull spans a cluster of exit points and their projections onto the
    /// structure. Degenerate unions leave the outline as it was.
    pub fn connect_to_structure(&self, chunk: &Outline, structure: &LineString<f64>) -> Bridge {
        let mut outline = geometry::regularize_polygon(chunk).unwrap_or_else(|| chunk.clone());
        let clusters = exit_clusters(chunk, structure, &self.params);

        let mut hulls = Vec::with_capacity(clusters.len());
        for cluster in &clusters {
            let mut points = Vec::with_capacity(cluster.len() * 2);
            for &point in cluster {
                points.push(point);
                points.push(geometry::project_onto(structure, point));
            }
            let hull = geometry::bridge_hull(&points);
            if let Some(extended) = geometry::merge_outlines(&outline, &hull) {
                outline = extended;
            }
            hulls.push(hull);
        }

        Bridge { outline, hulls }
    }
}

/// Boundary points of `chunk` facing `structure`, grouped into separate exits.
///
/// A point faces the structure when it lies less than half a burrow width farther
/// away than the closest boundary point. Points within `cluster_distance` of each
/// other (transitively) form one exit. The closest point always qualifies, so a
/// non-empty ring yields at least one exit.
pub fn exit_clusters(
    chunk: &Outline,
    structure: &LineString<f64>,
    params: &ConnectivityParams,
) -> Vec<Vec<Coord<f64>>> {
    let ring = &chunk.exterior().0;
    let measured: Vec<(Coord<f64>, f64)> = ring[..ring.len().saturating_sub(1)]
        .iter()
        .map(|&point| (point, geometry::point_line_distance(point, structure)))
        .collect();
    let closest = measured.iter().map(|&(_, d)| d).fold(f64::INFINITY, f64::min);
    let reach = closest + params.burrow_width / 2.0;
    let exits: Vec<Coord<f64>> = measured
        .into_iter()
        .filter(|&(_, d)| d < reach)
        .map(|(point, _)| point)
        .collect();

    let mut sets = DisjointSet::new(exits.len());
    for i in 0..exits.len() {
        for j in i + 1..exits.len() {
            let gap = (exits[i].x - exits[j].x).hypot(exits[i].y - exits[j].y);
            if gap <= params.cluster_distance {
                sets.union(i, j);
            }
        }
    }
    sets.groups()
        .into_iter()
        .map(|group| group.into_iter().map(|i| exits[i]).collect())
        .collect()
}

fn first_min_index(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &value) in values.iter().enumerate() {
        if value < values[best] {
            best = i;
        }
    }
    best
}

/// Closest (disconnected, connected) pair, scanning row by row; the first minimum wins.
fn nearest_pair(disconnected: &[usize], connected: &[usize], dist: &[Vec<f64>]) -> (usize, usize) {
    let mut best = (0, connected[0]);
    let mut best_dist = f64::INFINITY;
    for (slot, &a) in disconnected.iter().enumerate() {
        for &b in connected {
            if dist[a][b] < best_dist {
                best_dist = dist[a][b];
                best = (slot, b);
            }
        }
    }
    best
}
