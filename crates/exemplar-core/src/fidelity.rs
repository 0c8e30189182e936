//! Fidelity metrics between a simulated heightfield and an exemplar patch.
//!
//! Both rasters are first resampled onto a shared [`ComparisonGrid`] whose
//! size is the per-axis minimum of the two resolutions. The simulated raster
//! uses matched sampling when it already has the grid's shape and the
//! normalized (global) fallback otherwise; the exemplar, whose extent is the
//! bounding box by construction, is always sampled box-relative.
//!
//! Every statistic below is taken over the interior mask only:
//!
//!   diff            = simulated − exemplar
//!   mean_diff       = mean(diff)
//!   max_abs_diff    = max |diff|, with its grid cell, lon/lat and both values
//!   hypsometric     = percentiles 0, 5, …, 100 (linear interpolation)
//!   gradients       = central differences, one-sided at borders, on each
//!                     raster with unmasked cells replaced by the masked mean
//!   slope           = √(gx² + gy²), direction = atan2(gy, gx) in degrees
//!   slope histogram = 20 bins over [0, max(max slope, 1e-6)], last bin closed,
//!                     normalized to fractions
//!   orientation     = orientation_delta(sim_dir, ex_dir): mean, σ, p90

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::geo::Bounds;
use crate::gradient::gradient_components;
use crate::grid::{comparison_size, ComparisonGrid};
use crate::guardrail::{evaluate, GuardrailCheck, GuardrailThresholds};
use crate::heightfield::HeightField;
use crate::mask::{compute_mask, InteriorMask, MaskOptions};
use crate::sampler::{sample_to_grid, SamplingMode};

/// Percentile positions of the hypsometric curve.
pub const HYPSOMETRIC_STEPS: usize = 21;
/// Number of slope histogram bins (edges = bins + 1).
pub const SLOPE_BINS: usize = 20;

/// Where the largest masked difference occurs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiffLocation {
    pub row: usize,
    pub col: usize,
    pub lon: f64,
    pub lat: f64,
    pub simulated_m: f64,
    pub exemplar_m: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FidelityResult {
    pub mean_diff_m: f64,
    /// NaN when no masked cell has a finite difference.
    pub max_abs_diff_m: f64,
    pub max_location: Option<DiffLocation>,
    pub orientation_mean_deg: f64,
    pub orientation_std_deg: f64,
    pub orientation_p90_deg: f64,
    pub mask_lon_padding_deg: f64,
    pub mask_lat_padding_deg: f64,
    pub mask_valid_fraction: f64,
    pub mask_fell_back: bool,
    pub percentiles: Vec<f64>,
    pub simulated_hypsometric_m: Vec<f64>,
    pub exemplar_hypsometric_m: Vec<f64>,
    pub slope_bin_edges: Vec<f64>,
    pub simulated_slope_hist: Vec<f64>,
    pub exemplar_slope_hist: Vec<f64>,
    pub thresholds: GuardrailThresholds,
    pub guardrails: Vec<GuardrailCheck>,
}

/// Inputs that shape a comparison besides the two rasters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComparisonOptions {
    pub mask: MaskOptions,
    pub thresholds: GuardrailThresholds,
}

impl Default for ComparisonOptions {
    fn default() -> Self {
        Self {
            mask: MaskOptions::default(),
            thresholds: GuardrailThresholds::default(),
        }
    }
}

/// Everything produced by one comparison run.
#[derive(Debug, Clone)]
pub struct Comparison {
    pub grid: ComparisonGrid,
    pub simulated: HeightField,
    pub exemplar: HeightField,
    pub mask: InteriorMask,
    pub result: FidelityResult,
}

impl Comparison {
    /// `simulated − exemplar` inside the mask, NaN elsewhere.
    pub fn masked_diff(&self) -> HeightField {
        let data = self
            .simulated
            .data
            .iter()
            .zip(&self.exemplar.data)
            .zip(&self.mask.cells)
            .map(|((s, e), &m)| if m { s - e } else { f64::NAN })
            .collect();
        HeightField {
            data,
            width: self.grid.width(),
            height: self.grid.height(),
        }
    }
}

/// Align, mask and score `simulated` against `exemplar` over `bounds`.
///
/// `exemplar_resolution` is the exemplar's nominal `(width, height)`, usually
/// from library metadata; it defaults to the decoded raster's shape upstream.
/// Fails with a geometry error on an inverted or non-finite box.
pub fn compare(
    simulated: &HeightField,
    exemplar: &HeightField,
    exemplar_resolution: (usize, usize),
    bounds: Bounds,
    options: &ComparisonOptions,
) -> Result<Comparison> {
    bounds.validate_ordered()?;
    let (width, height) = comparison_size((simulated.width, simulated.height), exemplar_resolution);
    let grid = ComparisonGrid::new(bounds, width, height);

    let sim_mode = SamplingMode::for_simulated(simulated, &grid);
    let sim_tile = sample_to_grid(simulated, &grid, sim_mode);
    let ex_tile = sample_to_grid(exemplar, &grid, SamplingMode::Matched);
    let mask = compute_mask(&grid, &sim_tile, &ex_tile, options.mask);

    info!(
        width,
        height,
        sampling = ?sim_mode,
        mask_enabled = options.mask.enabled,
        valid_px = mask.count(),
        total_px = mask.cells.len(),
        "aligned rasters on comparison grid"
    );

    let result = score(&grid, &sim_tile, &ex_tile, &mask, &options.thresholds);
    Ok(Comparison {
        grid,
        simulated: sim_tile,
        exemplar: ex_tile,
        mask,
        result,
    })
}

/// Compute every metric for two already-aligned rasters.
pub fn score(
    grid: &ComparisonGrid,
    simulated: &HeightField,
    exemplar: &HeightField,
    mask: &InteriorMask,
    thresholds: &GuardrailThresholds,
) -> FidelityResult {
    let width = grid.width();
    let masked = |field: &HeightField| -> Vec<f64> {
        field
            .data
            .iter()
            .zip(&mask.cells)
            .filter(|&(_, &m)| m)
            .map(|(v, _)| *v)
            .collect()
    };

    // difference statistics
    let mut diff_sum = 0.0;
    let mut diff_n = 0usize;
    let mut max_abs = f64::NAN;
    let mut max_location = None;
    for (i, (&s, &e)) in simulated.data.iter().zip(&exemplar.data).enumerate() {
        if !mask.cells[i] {
            continue;
        }
        let d = s - e;
        if !d.is_finite() {
            continue;
        }
        diff_sum += d;
        diff_n += 1;
        if max_abs.is_nan() || d.abs() > max_abs {
            max_abs = d.abs();
            let (row, col) = (i / width, i % width);
            max_location = Some(DiffLocation {
                row,
                col,
                lon: grid.lon_centers[col],
                lat: grid.lat_centers[row],
                simulated_m: s,
                exemplar_m: e,
            });
        }
    }
    let mean_diff = if diff_n > 0 {
        diff_sum / diff_n as f64
    } else {
        f64::NAN
    };

    // hypsometry
    let percentiles: Vec<f64> = (0..HYPSOMETRIC_STEPS).map(|i| i as f64 * 5.0).collect();
    let sim_masked = masked(simulated);
    let ex_masked = masked(exemplar);
    let sim_hyp = percentiles_of(&sim_masked, &percentiles);
    let ex_hyp = percentiles_of(&ex_masked, &percentiles);

    // gradients on mean-filled rasters
    let (sim_slope, sim_dir) = gradients(&fill_unmasked(simulated, mask, nan_mean(&sim_masked)));
    let (ex_slope, ex_dir) = gradients(&fill_unmasked(exemplar, mask, nan_mean(&ex_masked)));
    let sim_slope_m = masked(&sim_slope);
    let ex_slope_m = masked(&ex_slope);

    let max_slope = sim_slope_m
        .iter()
        .chain(&ex_slope_m)
        .copied()
        .filter(|v| v.is_finite())
        .fold(1e-6f64, f64::max);
    let edges = bin_edges(0.0, max_slope, SLOPE_BINS);
    let sim_hist = normalized_histogram(&sim_slope_m, &edges);
    let ex_hist = normalized_histogram(&ex_slope_m, &edges);

    let deltas: Vec<f64> = masked(&sim_dir)
        .into_iter()
        .zip(masked(&ex_dir))
        .map(|(a, b)| orientation_delta(a, b))
        .filter(|d| d.is_finite())
        .collect();
    let (orientation_mean, orientation_std) = mean_std(&deltas);
    let orientation_p90 = percentile(&sorted(&deltas), 90.0);

    FidelityResult {
        mean_diff_m: mean_diff,
        max_abs_diff_m: max_abs,
        max_location,
        orientation_mean_deg: orientation_mean,
        orientation_std_deg: orientation_std,
        orientation_p90_deg: orientation_p90,
        mask_lon_padding_deg: mask.lon_padding,
        mask_lat_padding_deg: mask.lat_padding,
        mask_valid_fraction: mask.valid_fraction(),
        mask_fell_back: mask.fell_back,
        percentiles,
        simulated_hypsometric_m: sim_hyp,
        exemplar_hypsometric_m: ex_hyp,
        slope_bin_edges: edges,
        simulated_slope_hist: sim_hist,
        exemplar_slope_hist: ex_hist,
        thresholds: *thresholds,
        guardrails: evaluate(mean_diff, max_abs, thresholds),
    }
}

/// Angular difference between two directions, folded into `[0°, 90°]`.
pub fn orientation_delta(a_deg: f64, b_deg: f64) -> f64 {
    let mut d = (a_deg - b_deg).abs().rem_euclid(360.0);
    if d > 180.0 {
        d = 360.0 - d;
    }
    if d > 90.0 {
        d = 180.0 - d;
    }
    d
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v: Vec<f64> = values.iter().copied().filter(|x| !x.is_nan()).collect();
    v.sort_by(f64::total_cmp);
    v
}

/// Linear-interpolated percentile of pre-sorted, NaN-free data.
/// NaN for empty input.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = (p / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        }
    }
}

fn percentiles_of(values: &[f64], ps: &[f64]) -> Vec<f64> {
    let s = sorted(values);
    ps.iter().map(|&p| percentile(&s, p)).collect()
}

fn nan_mean(values: &[f64]) -> f64 {
    let (sum, n) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

/// Population mean and standard deviation; NaN pair for empty input.
fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, var.sqrt())
}

fn fill_unmasked(field: &HeightField, mask: &InteriorMask, fill: f64) -> HeightField {
    let data = field
        .data
        .iter()
        .zip(&mask.cells)
        .map(|(&v, &m)| if m && !v.is_nan() { v } else { fill })
        .collect();
    HeightField {
        data,
        width: field.width,
        height: field.height,
    }
}

/// Per-cell slope magnitude and direction (degrees) in grid units.
pub fn gradients(field: &HeightField) -> (HeightField, HeightField) {
    let (gx, gy) = gradient_components(field);
    let grid = |data: Vec<f64>| HeightField {
        data,
        width: field.width,
        height: field.height,
    };
    let slope = gx.iter().zip(&gy).map(|(x, y)| x.hypot(*y)).collect();
    let direction = gx.iter().zip(&gy).map(|(x, y)| y.atan2(*x).to_degrees()).collect();
    (grid(slope), grid(direction))
}

fn bin_edges(lo: f64, hi: f64, bins: usize) -> Vec<f64> {
    let step = (hi - lo) / bins as f64;
    (0..=bins)
        .map(|i| if i == bins { hi } else { lo + step * i as f64 })
        .collect()
}

/// Histogram over `edges` (last bin closed), normalized by total count.
fn normalized_histogram(values: &[f64], edges: &[f64]) -> Vec<f64> {
    let bins = edges.len().saturating_sub(1);
    let mut counts = vec![0usize; bins];
    let (Some(&lo), Some(&hi)) = (edges.first(), edges.last()) else {
        return Vec::new();
    };
    for &v in values {
        if !(lo..=hi).contains(&v) {
            continue;
        }
        // first edge strictly above v, minus one
        let idx = edges.partition_point(|&e| e <= v).saturating_sub(1).min(bins - 1);
        counts[idx] += 1;
    }
    let total = counts.iter().sum::<usize>().max(1) as f64;
    counts.into_iter().map(|c| c as f64 / total).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn orientation_delta_is_symmetric_and_bounded() {
        let cases = [(0.0, 0.0, 0.0), (10.0, 350.0, 20.0), (0.0, 180.0, 0.0), (-45.0, 45.0, 90.0), (30.0, 170.0, 40.0)];
        for (a, b, want) in cases {
            assert_abs_diff_eq!(orientation_delta(a, b), want, epsilon = 1e-9);
            assert_abs_diff_eq!(orientation_delta(b, a), want, epsilon = 1e-9);
        }
        for a in (-360..=360).step_by(17) {
            for b in (-180..=180).step_by(23) {
                let d = orientation_delta(a as f64, b as f64);
                assert!((0.0..=90.0).contains(&d), "{a} {b} -> {d}");
            }
        }
    }

    #[test]
    fn percentile_matches_linear_interpolation() {
        let s = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&s, 0.0), 1.0);
        assert_eq!(percentile(&s, 100.0), 5.0);
        assert_abs_diff_eq!(percentile(&s, 90.0), 4.6, epsilon = 1e-12);
        assert_abs_diff_eq!(percentile(&[10.0, 20.0], 25.0), 12.5);
        assert!(percentile(&[], 50.0).is_nan());
    }

    #[test]
    fn gradients_use_central_and_one_sided_differences() {
        let f = HeightField::from_data(vec![0.0, 1.0, 4.0, 9.0], 4, 1).unwrap();
        let (slope, dir) = gradients(&f);
        assert_eq!(slope.data, vec![1.0, 2.0, 4.0, 5.0]);
        assert!(dir.data.iter().all(|d| *d == 0.0));
    }

    #[test]
    fn histogram_closes_last_bin() {
        let edges = bin_edges(0.0, 2.0, 4);
        let h = normalized_histogram(&[0.0, 0.5, 1.99, 2.0], &edges);
        assert_eq!(h, vec![0.25, 0.25, 0.0, 0.5]);
    }

    #[test]
    fn identical_rasters_score_zero() {
        let data: Vec<f64> = (0..64).map(|i| ((i % 8) * 20 + (i / 8) * 5) as f64).collect();
        let field = HeightField::from_data(data, 8, 8).unwrap();
        let bounds = Bounds::new(86.0, 87.0, 27.0, 28.0);
        let cmp = compare(&field, &field, (8, 8), bounds, &ComparisonOptions::default()).unwrap();
        let r = &cmp.result;
        assert_abs_diff_eq!(r.mean_diff_m, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(r.max_abs_diff_m, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(r.orientation_mean_deg, 0.0, epsilon = 1e-9);
        assert_eq!(r.simulated_hypsometric_m.len(), HYPSOMETRIC_STEPS);
        assert_eq!(r.slope_bin_edges.len(), SLOPE_BINS + 1);
        assert_abs_diff_eq!(r.simulated_slope_hist.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert_eq!(r.simulated_hypsometric_m, r.exemplar_hypsometric_m);
        assert!(r.guardrails.iter().all(|g| g.verdict == crate::guardrail::Verdict::Pass));
    }

    #[test]
    fn offset_raster_reports_mean_and_location() {
        let ex = HeightField::new(4, 4, 100.0);
        let mut sim = HeightField::new(4, 4, 130.0);
        sim.set(2, 1, 300.0);
        let bounds = Bounds::new(0.0, 4.0, 0.0, 4.0);
        let cmp = compare(&sim, &ex, (4, 4), bounds, &ComparisonOptions::default()).unwrap();
        let r = &cmp.result;
        assert_abs_diff_eq!(r.mean_diff_m, (15.0 * 30.0 + 200.0) / 16.0, epsilon = 1e-9);
        assert_abs_diff_eq!(r.max_abs_diff_m, 200.0, epsilon = 1e-9);
        let loc = r.max_location.unwrap();
        assert_eq!((loc.row, loc.col), (2, 1));
        assert_abs_diff_eq!(loc.lon, 1.5);
        assert_abs_diff_eq!(loc.lat, 1.5);
        assert_abs_diff_eq!(loc.simulated_m, 300.0, epsilon = 1e-9);
        let verdicts: Vec<_> = r.guardrails.iter().map(|g| g.verdict).collect();
        use crate::guardrail::Verdict::*;
        assert_eq!(verdicts, vec![Pass, Fail, Pass]);
    }

    #[test]
    fn masked_diff_blanks_excluded_cells() {
        let ex = HeightField::new(20, 20, 100.0);
        let sim = HeightField::new(20, 20, 120.0);
        let options = ComparisonOptions {
            mask: MaskOptions { enabled: true },
            ..ComparisonOptions::default()
        };
        let cmp = compare(&sim, &ex, (20, 20), Bounds::new(0.0, 1.0, 0.0, 1.0), &options).unwrap();
        let diff = cmp.masked_diff();
        assert!(diff.get(0, 0).is_nan());
        assert_abs_diff_eq!(diff.get(10, 10), 20.0, epsilon = 1e-9);
        assert!(cmp.result.mask_valid_fraction < 1.0);
    }

    #[test]
    fn inverted_box_is_a_geometry_error() {
        let field = HeightField::new(4, 4, 0.0);
        let bounds = Bounds::new(87.0, 86.0, 27.0, 28.0);
        let err = compare(&field, &field, (4, 4), bounds, &ComparisonOptions::default()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Geometry);
    }

    #[test]
    fn exemplar_narrower_than_its_nominal_width_is_not_wrapped() {
        // 4-wide regional exemplar declared 8 wide: the west column must stay
        // at the west edge value instead of blending in the east edge.
        let ex = HeightField::from_data(vec![0.0, 0.0, 0.0, 800.0].repeat(8), 4, 8).unwrap();
        let sim = HeightField::new(8, 8, 0.0);
        let bounds = Bounds::new(0.0, 1.0, 0.0, 1.0);
        let cmp = compare(&sim, &ex, (8, 8), bounds, &ComparisonOptions::default()).unwrap();
        assert_abs_diff_eq!(cmp.exemplar.get(3, 0), 0.0);
        assert_abs_diff_eq!(cmp.exemplar.get(3, 7), 800.0);
    }
}
