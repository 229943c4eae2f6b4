//! k-point sets: uniform Brillouin-zone grids, polyline paths through
//! high-symmetry points, and square patches around a point.

use crate::model::KPoint;
use serde::{Deserialize, Serialize};

/// `kp_num²` points `(i/kp_num)·v1 + (j/kp_num)·v2` with `i` as the outer
/// index. The corner at the origin is included, the opposite one is not.
pub fn uniform_grid(v1: &KPoint, v2: &KPoint, kp_num: usize) -> Vec<KPoint> {
    let n = kp_num as f64;
    let mut points = Vec::with_capacity(kp_num * kp_num);
    for i in 0..kp_num {
        for j in 0..kp_num {
            points.push(v1 * (i as f64 / n) + v2 * (j as f64 / n));
        }
    }
    points
}

/// `count` evenly spaced points from `start` towards `end`; `end` itself is
/// only included when asked for.
pub fn segment(start: &KPoint, end: &KPoint, count: usize, include_end: bool) -> Vec<KPoint> {
    let step = (end - start) / count.max(1) as f64;
    let mut points: Vec<KPoint> = (0..count).map(|i| start + step * i as f64).collect();
    if include_end {
        points.push(*end);
    }
    points
}

/// Named vertices of a band-structure path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighSymmetryPath {
    pub labels: Vec<String>,
    pub vertices: Vec<KPoint>,
}

impl HighSymmetryPath {
    pub fn new(points: Vec<(&str, KPoint)>) -> Self {
        let (labels, vertices) = points
            .into_iter()
            .map(|(label, k)| (label.to_string(), k))
            .unzip();
        HighSymmetryPath { labels, vertices }
    }

    /// Samples the path with `density` points per unit length.
    pub fn sample(&self, density: f64, include_last: bool) -> KPath {
        let mut path = polyline(&self.vertices, density, include_last);
        path.labels = self.labels.clone();
        path
    }
}

/// A sampled polyline, kept per segment so each segment can be evaluated
/// as one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KPath {
    pub segments: Vec<Vec<KPoint>>,
    /// Cumulative point counts, i.e. the index of every vertex along the
    /// flattened path.
    pub label_positions: Vec<usize>,
    pub labels: Vec<String>,
}

impl KPath {
    pub fn len(&self) -> usize {
        self.segments.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn points(&self) -> impl Iterator<Item = &KPoint> {
        self.segments.iter().flatten()
    }
}

/// Each segment `p_i → p_{i+1}` gets `⌊|p_{i+1} − p_i|·density⌋` points
/// starting at `p_i`. The final vertex is appended as a segment of its own
/// when `include_last` is set.
pub fn polyline(vertices: &[KPoint], density: f64, include_last: bool) -> KPath {
    let density = density.max(0.0);
    let mut segments = Vec::with_capacity(vertices.len());
    let mut label_positions = vec![0];
    let mut total = 0;

    for pair in vertices.windows(2) {
        let count = ((pair[1] - pair[0]).norm() * density).floor() as usize;
        segments.push(segment(&pair[0], &pair[1], count, false));
        total += count;
        label_positions.push(total);
    }

    if include_last {
        if let Some(last) = vertices.last() {
            segments.push(vec![*last]);
        }
    }

    KPath {
        segments,
        label_positions,
        labels: Vec::new(),
    }
}

/// `(density+1)²` points `center + s·δ + t·R90·δ` with
/// `s, t ∈ linspace(−1, 1, density+1)`, `t` varying fastest.
pub fn patch(center: &KPoint, delta: &KPoint, density: usize) -> Vec<KPoint> {
    let rotated = KPoint::new(-delta.y, delta.x);
    let steps = linspace(-1.0, 1.0, density + 1);
    steps
        .iter()
        .flat_map(|&s| steps.iter().map(move |&t| center + delta * s + rotated * t))
        .collect()
}

fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (count - 1) as f64;
            (0..count).map(|i| start + step * i as f64).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_point_grid_is_origin() {
        let grid = uniform_grid(&KPoint::new(1.0, 0.0), &KPoint::new(0.3, 2.0), 1);
        assert_eq!(grid, vec![KPoint::zeros()]);
    }

    #[test]
    fn test_grid_is_half_open() {
        let v1 = KPoint::new(1.0, 0.0);
        let v2 = KPoint::new(0.0, 1.0);
        let grid = uniform_grid(&v1, &v2, 4);
        assert_eq!(grid.len(), 16);
        assert_eq!(grid[1], KPoint::new(0.0, 0.25));
        assert_eq!(grid[4], KPoint::new(0.25, 0.0));
        assert!(grid.iter().all(|k| k.x < 1.0 && k.y < 1.0));
        assert!(uniform_grid(&v1, &v2, 0).is_empty());
    }

    #[test]
    fn test_polyline_counts_and_labels() {
        let vertices = [
            KPoint::new(0.0, 0.0),
            KPoint::new(1.0, 0.0),
            KPoint::new(1.0, 0.55),
        ];
        let path = polyline(&vertices, 10.0, false);
        assert_eq!(path.segments.len(), 2);
        assert_eq!(path.segments[0].len(), 10);
        assert_eq!(path.segments[1].len(), 5);
        assert_eq!(path.label_positions, vec![0, 10, 15]);
        assert_eq!(path.segments[0][0], vertices[0]);
        assert!(path.points().all(|k| *k != vertices[2]));

        let closed = polyline(&vertices, 10.0, true);
        assert_eq!(closed.len(), 16);
        assert_eq!(closed.points().last(), Some(&vertices[2]));
    }

    #[test]
    fn test_zero_density_path_is_empty() {
        let path = polyline(&[KPoint::zeros(), KPoint::new(1.0, 1.0)], 0.0, false);
        assert!(path.is_empty());
        assert_eq!(path.label_positions, vec![0, 0]);
    }

    #[test]
    fn test_patch_spans_rotated_square() {
        let center = KPoint::new(1.0, 1.0);
        let delta = KPoint::new(0.1, 0.0);
        let points = patch(&center, &delta, 2);
        assert_eq!(points.len(), 9);
        assert!((points[0] - KPoint::new(0.9, 0.9)).norm() < 1e-12);
        assert!((points[4] - center).norm() < 1e-12);
        assert!((points[8] - KPoint::new(1.1, 1.1)).norm() < 1e-12);
    }
}
