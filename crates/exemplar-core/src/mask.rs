//! Interior validity mask for fidelity scoring.
//!
//! Three structural rules, applied only when masking is enabled:
//!
//! 1. Geographic padding: `pad = max(2 · step, 0.05 · range)` per axis; cells
//!    whose centre lies within `pad` of the box edge are excluded. The rule
//!    for an axis applies only when it has more than two cells and a non-zero
//!    range.
//! 2. Index margin: the outer `max(1, ceil(0.1 · n))` rows and columns are
//!    excluded, only when both axes are longer than twice their margin.
//! 3. Low-fill rule: cells where the simulated value is at or below
//!    `baseline + 50 m` (baseline = simulated minimum) while the exemplar is
//!    above it are excluded.
//!
//! The mask never looks at the simulated − exemplar difference. An empty
//! result falls back to the full grid.

use crate::grid::ComparisonGrid;
use crate::heightfield::HeightField;

/// Height above the simulated minimum below which unfilled cells are ignored.
pub const LOW_FILL_MARGIN_M: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MaskOptions {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InteriorMask {
    /// Row-major, `true` = scored.
    pub cells: Vec<bool>,
    pub width: usize,
    pub height: usize,
    pub lon_padding: f64,
    pub lat_padding: f64,
    /// Set when every candidate was excluded and the full grid was used.
    pub fell_back: bool,
}

impl InteriorMask {
    pub fn full(width: usize, height: usize, lon_padding: f64, lat_padding: f64) -> Self {
        Self {
            cells: vec![true; width * height],
            width,
            height,
            lon_padding,
            lat_padding,
            fell_back: false,
        }
    }

    #[inline]
    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.cells[row * self.width + col]
    }

    pub fn count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    pub fn valid_fraction(&self) -> f64 {
        if self.cells.is_empty() {
            return 0.0;
        }
        self.count() as f64 / self.cells.len() as f64
    }
}

/// Geographic paddings `(lon, lat)` for `grid`, reported even when masking is off.
pub fn paddings(grid: &ComparisonGrid) -> (f64, f64) {
    let b = &grid.bounds;
    (
        (grid.lon_step() * 2.0).max(b.lon_range().abs() * 0.05),
        (grid.lat_step() * 2.0).max(b.lat_range().abs() * 0.05),
    )
}

fn index_margin(n: usize) -> usize {
    ((n as f64 * 0.10).ceil() as usize).max(1)
}

pub fn compute_mask(
    grid: &ComparisonGrid,
    simulated: &HeightField,
    exemplar: &HeightField,
    options: MaskOptions,
) -> InteriorMask {
    let (width, height) = (grid.width(), grid.height());
    let (lon_padding, lat_padding) = paddings(grid);
    let mut mask = InteriorMask::full(width, height, lon_padding, lat_padding);
    if !options.enabled {
        return mask;
    }

    let b = &grid.bounds;
    let lon_ok: Vec<bool> = if width > 2 && b.lon_range() != 0.0 {
        grid.lon_centers
            .iter()
            .map(|&lon| lon >= b.west + lon_padding && lon <= b.east - lon_padding)
            .collect()
    } else {
        vec![true; width]
    };
    let lat_ok: Vec<bool> = if height > 2 && b.lat_range() != 0.0 {
        grid.lat_centers
            .iter()
            .map(|&lat| lat >= b.south + lat_padding && lat <= b.north - lat_padding)
            .collect()
    } else {
        vec![true; height]
    };

    let (col_margin, row_margin) = (index_margin(width), index_margin(height));
    let use_margin = width > col_margin * 2 && height > row_margin * 2;
    let in_margin = |row: usize, col: usize| {
        !use_margin
            || (row >= row_margin
                && row < height - row_margin
                && col >= col_margin
                && col < width - col_margin)
    };

    let threshold = simulated.min_elevation() + LOW_FILL_MARGIN_M;
    for row in 0..height {
        for col in 0..width {
            let sim = simulated.get(row, col);
            let ex = exemplar.get(row, col);
            let low_fill = sim <= threshold && ex > threshold;
            mask.cells[row * width + col] = lon_ok[col] && lat_ok[row] && in_margin(row, col) && !low_fill;
        }
    }

    if mask.count() == 0 {
        mask.cells.fill(true);
        mask.fell_back = true;
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Bounds;
    use approx::assert_abs_diff_eq;

    fn grid(n: usize) -> ComparisonGrid {
        ComparisonGrid::new(Bounds::new(0.0, 1.0, 0.0, 1.0), n, n)
    }

    #[test]
    fn disabled_mask_is_full_but_reports_padding() {
        let g = grid(20);
        let f = HeightField::new(20, 20, 100.0);
        let m = compute_mask(&g, &f, &f, MaskOptions::default());
        assert_eq!(m.count(), 400);
        assert!(!m.fell_back);
        // 2 · 0.05 step beats 5% of a unit range
        assert_abs_diff_eq!(m.lon_padding, 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(m.lat_padding, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn enabled_mask_drops_perimeter() {
        let g = grid(20);
        let f = HeightField::new(20, 20, 100.0);
        let m = compute_mask(&g, &f, &f, MaskOptions { enabled: true });
        assert!(!m.contains(0, 0));
        assert!(!m.contains(1, 10));
        assert!(m.contains(10, 10));
        assert!(m.count() < 400 && m.count() > 0);
    }

    #[test]
    fn low_fill_cells_are_excluded_without_looking_at_difference() {
        let g = grid(20);
        let mut sim = HeightField::new(20, 20, 500.0);
        sim.set(10, 10, 0.0);
        let mut ex = HeightField::new(20, 20, 500.0);
        // huge difference, but structural rules keep this cell
        ex.set(9, 9, 5000.0);
        let m = compute_mask(&g, &sim, &ex, MaskOptions { enabled: true });
        assert!(!m.contains(10, 10));
        assert!(m.contains(9, 9));
    }

    #[test]
    fn empty_mask_falls_back_to_full_grid() {
        let g = grid(3);
        let sim = HeightField::new(3, 3, 0.0);
        let ex = HeightField::new(3, 3, 1000.0);
        let m = compute_mask(&g, &sim, &ex, MaskOptions { enabled: true });
        assert!(m.fell_back);
        assert_eq!(m.count(), 9);
        assert_eq!(m.valid_fraction(), 1.0);
    }
}
