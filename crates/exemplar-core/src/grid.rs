//! Shared cell-centre coordinates for a fidelity comparison.

use crate::geo::Bounds;

/// Longitude and latitude cell centres over one bounding box.
///
/// `lat_centers[0]` is the northernmost strip, matching raster row order.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonGrid {
    pub bounds: Bounds,
    pub lon_centers: Vec<f64>,
    pub lat_centers: Vec<f64>,
}

/// Per-axis minimum of two `(width, height)` resolutions.
pub fn comparison_size(simulated: (usize, usize), exemplar: (usize, usize)) -> (usize, usize) {
    (simulated.0.min(exemplar.0), simulated.1.min(exemplar.1))
}

/// `n + 1` evenly spaced values from `start` to `stop`, both inclusive.
fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    let step = (stop - start) / n as f64;
    (0..=n)
        .map(|i| if i == n { stop } else { start + step * i as f64 })
        .collect()
}

fn midpoints(edges: &[f64]) -> Vec<f64> {
    edges.windows(2).map(|e| (e[0] + e[1]) / 2.0).collect()
}

impl ComparisonGrid {
    pub fn new(bounds: Bounds, width: usize, height: usize) -> Self {
        let lon_edges = linspace(bounds.west, bounds.east, width);
        let lat_edges = linspace(bounds.north, bounds.south, height);
        Self {
            bounds,
            lon_centers: midpoints(&lon_edges),
            lat_centers: midpoints(&lat_edges),
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.lon_centers.len()
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.lat_centers.len()
    }

    /// Spacing between adjacent longitude centres (0 for a single column).
    pub fn lon_step(&self) -> f64 {
        match self.lon_centers.as_slice() {
            [a, b, ..] => (b - a).abs(),
            _ => 0.0,
        }
    }

    /// Spacing between adjacent latitude centres (0 for a single row).
    pub fn lat_step(&self) -> f64 {
        match self.lat_centers.as_slice() {
            [a, b, ..] => (b - a).abs(),
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn centres_are_edge_midpoints_north_first() {
        let g = ComparisonGrid::new(Bounds::new(10.0, 14.0, 0.0, 2.0), 4, 2);
        assert_eq!(g.lon_centers, vec![10.5, 11.5, 12.5, 13.5]);
        assert_eq!(g.lat_centers, vec![1.5, 0.5]);
        assert_abs_diff_eq!(g.lon_step(), 1.0);
        assert_abs_diff_eq!(g.lat_step(), 1.0);
    }

    #[test]
    fn comparison_size_is_pairwise_minimum() {
        assert_eq!(comparison_size((1024, 512), (2048, 1024)), (1024, 512));
        assert_eq!(comparison_size((300, 900), (512, 512)), (300, 512));
    }

    #[test]
    fn single_cell_axis_has_zero_step() {
        let g = ComparisonGrid::new(Bounds::new(0.0, 1.0, 0.0, 1.0), 1, 3);
        assert_eq!(g.width(), 1);
        assert_eq!(g.lon_step(), 0.0);
        assert_eq!(g.height(), 3);
    }
}
