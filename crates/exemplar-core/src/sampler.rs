//! Bilinear resampling of a heightfield onto a [`ComparisonGrid`].
//!
//! Query coordinates become fractional source indices in one of two ways:
//!
//! ```text
//!   Matched:     col = (lon − west)/(east − west) · W − 0.5
//!                row = (north − lat)/(north − south) · H − 0.5
//!   Normalized:  col = ((lon + 180)/360) · W − 0.5
//!                row = ((90 − lat)/180) · H − 0.5
//! ```
//!
//! Matched treats the source as covering exactly the grid's bounding box;
//! Normalized treats it as a full-sphere equirectangular raster. Row indices
//! always clamp. Column indices wrap modulo `W` (both neighbours) for global
//! sources and clamp for box-relative ones, whose east and west edges are
//! not neighbours.

use crate::geo::Bounds;
use crate::grid::ComparisonGrid;
use crate::heightfield::HeightField;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingMode {
    /// Source extent is the comparison bounding box.
    Matched,
    /// Source is a global lon/lat raster.
    Normalized,
}

impl SamplingMode {
    /// Matched only when the simulated raster already has the grid's shape
    /// and the box has a non-zero extent on both axes.
    pub fn for_simulated(field: &HeightField, grid: &ComparisonGrid) -> Self {
        let same_shape = field.width == grid.width() && field.height == grid.height();
        if same_shape && has_extent(&grid.bounds) {
            Self::Matched
        } else {
            Self::Normalized
        }
    }
}

/// How column indices outside `[0, W − 1]` are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnEdge {
    Wrap,
    Clamp,
}

impl ColumnEdge {
    /// Clamp for a box-relative read, wrap whenever global indices are used.
    pub fn for_mode(mode: SamplingMode, bounds: &Bounds) -> Self {
        match mode {
            SamplingMode::Matched if has_extent(bounds) => Self::Clamp,
            _ => Self::Wrap,
        }
    }
}

fn has_extent(b: &Bounds) -> bool {
    b.lon_range() != 0.0 && b.lat_range() != 0.0
}

/// Fractional `(col, row)` of `(lon, lat)` in a `width × height` source.
pub fn source_index(
    mode: SamplingMode,
    bounds: &Bounds,
    width: usize,
    height: usize,
    lon: f64,
    lat: f64,
) -> (f64, f64) {
    let (w, h) = (width as f64, height as f64);
    match mode {
        SamplingMode::Matched if has_extent(bounds) => (
            (lon - bounds.west) / bounds.lon_range() * w - 0.5,
            (bounds.north - lat) / bounds.lat_range() * h - 0.5,
        ),
        _ => (
            (lon + 180.0) / 360.0 * w - 0.5,
            (90.0 - lat) / 180.0 * h - 0.5,
        ),
    }
}

/// Bilinear read at fractional indices. Rows clamp; columns follow `columns`.
pub fn bilinear_at(field: &HeightField, col: f64, row: f64, columns: ColumnEdge) -> f64 {
    let (w, h) = (field.width, field.height);
    let (col, col0, col1) = match columns {
        ColumnEdge::Wrap => {
            let col = col.rem_euclid(w as f64);
            let col0 = (col.floor() as usize).min(w - 1);
            (col, col0, (col0 + 1) % w)
        }
        ColumnEdge::Clamp => {
            let col = col.clamp(0.0, (w - 1) as f64);
            let col0 = col.floor() as usize;
            (col, col0, (col0 + 1).min(w - 1))
        }
    };
    let fc = col - col0 as f64;

    let row = row.clamp(0.0, (h - 1) as f64);
    let row0 = row.floor() as usize;
    let row1 = (row0 + 1).min(h - 1);
    let fr = row - row0 as f64;

    let top = (1.0 - fc) * field.get(row0, col0) + fc * field.get(row0, col1);
    let bottom = (1.0 - fc) * field.get(row1, col0) + fc * field.get(row1, col1);
    (1.0 - fr) * top + fr * bottom
}

/// Resample `field` onto every cell centre of `grid`.
pub fn sample_to_grid(field: &HeightField, grid: &ComparisonGrid, mode: SamplingMode) -> HeightField {
    let columns = ColumnEdge::for_mode(mode, &grid.bounds);
    let mut out = HeightField::new(grid.width(), grid.height(), f64::NAN);
    for (row, &lat) in grid.lat_centers.iter().enumerate() {
        for (col, &lon) in grid.lon_centers.iter().enumerate() {
            let (c, r) = source_index(mode, &grid.bounds, field.width, field.height, lon, lat);
            out.set(row, col, bilinear_at(field, c, r, columns));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn field(width: usize, height: usize) -> HeightField {
        let data = (0..width * height).map(|i| (i * 7 % 31) as f64 * 3.5).collect();
        HeightField::from_data(data, width, height).unwrap()
    }

    #[test]
    fn matched_sampling_reproduces_cell_centres() {
        let src = field(6, 4);
        let grid = ComparisonGrid::new(Bounds::new(86.0, 87.5, 27.0, 28.0), 6, 4);
        assert_eq!(SamplingMode::for_simulated(&src, &grid), SamplingMode::Matched);
        let out = sample_to_grid(&src, &grid, SamplingMode::Matched);
        for (a, b) in src.data.iter().zip(&out.data) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-9);
        }
    }

    #[test]
    fn normalized_sampling_of_global_raster_reproduces_cell_centres() {
        let src = field(8, 4);
        let grid = ComparisonGrid::new(Bounds::new(-180.0, 180.0, -90.0, 90.0), 8, 4);
        let out = sample_to_grid(&src, &grid, SamplingMode::Normalized);
        for (a, b) in src.data.iter().zip(&out.data) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-9);
        }
    }

    #[test]
    fn shape_mismatch_falls_back_to_normalized() {
        let src = field(16, 8);
        let grid = ComparisonGrid::new(Bounds::new(0.0, 1.0, 0.0, 1.0), 4, 4);
        assert_eq!(SamplingMode::for_simulated(&src, &grid), SamplingMode::Normalized);
    }

    #[test]
    fn columns_wrap_and_rows_clamp() {
        let src = HeightField::from_data(vec![0.0, 10.0, 20.0, 30.0, 40.0, 50.0], 3, 2).unwrap();
        // halfway between the last and first column
        assert_abs_diff_eq!(bilinear_at(&src, 2.5, 0.0, ColumnEdge::Wrap), 10.0);
        assert_abs_diff_eq!(bilinear_at(&src, -0.5, 0.0, ColumnEdge::Wrap), 10.0);
        // rows above and below clamp to the edge rows
        assert_abs_diff_eq!(bilinear_at(&src, 1.0, -3.0, ColumnEdge::Wrap), 10.0);
        assert_abs_diff_eq!(bilinear_at(&src, 1.0, 9.0, ColumnEdge::Wrap), 40.0);
    }

    #[test]
    fn clamped_columns_hold_the_edge_value() {
        let src = HeightField::from_data(vec![0.0, 10.0, 20.0, 30.0, 40.0, 50.0], 3, 2).unwrap();
        assert_abs_diff_eq!(bilinear_at(&src, 2.5, 0.0, ColumnEdge::Clamp), 20.0);
        assert_abs_diff_eq!(bilinear_at(&src, -0.5, 1.0, ColumnEdge::Clamp), 30.0);
        assert_abs_diff_eq!(bilinear_at(&src, 1.5, 0.0, ColumnEdge::Clamp), 15.0);
    }

    #[test]
    fn regional_source_wider_grid_does_not_blend_across_edges() {
        // east edge is high, west edge is low
        let src = HeightField::from_data(vec![0.0, 0.0, 0.0, 900.0], 4, 1).unwrap();
        let bounds = Bounds::new(10.0, 11.0, 0.0, 1.0);
        assert_eq!(ColumnEdge::for_mode(SamplingMode::Matched, &bounds), ColumnEdge::Clamp);
        let grid = ComparisonGrid::new(bounds, 8, 1);
        let out = sample_to_grid(&src, &grid, SamplingMode::Matched);
        assert_abs_diff_eq!(out.get(0, 0), 0.0);
        assert_abs_diff_eq!(out.get(0, 7), 900.0);
    }

    #[test]
    fn degenerate_box_uses_normalized_indices() {
        let b = Bounds::new(10.0, 10.0, 0.0, 1.0);
        let (c, r) = source_index(SamplingMode::Matched, &b, 360, 180, 10.0, 0.0);
        assert_abs_diff_eq!(c, 189.5);
        assert_abs_diff_eq!(r, 89.5);
    }
}
