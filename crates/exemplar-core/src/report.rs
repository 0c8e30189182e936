//! Fidelity outputs: the `category,metric,value` CSV and the three-panel
//! comparison PNG (simulated | exemplar | signed difference).

use std::fs;
use std::path::Path;

use image::{ImageFormat, Rgb, RgbImage};

use crate::error::{ExemplarError, Result};
use crate::fidelity::FidelityResult;
use crate::heightfield::HeightField;

pub const METRICS_HEADER: &str = "category,metric,value";

#[derive(Debug, Clone, PartialEq)]
pub struct MetricRow {
    pub category: &'static str,
    pub metric: &'static str,
    pub value: String,
}

fn row(category: &'static str, metric: &'static str, value: String) -> MetricRow {
    MetricRow {
        category,
        metric,
        value,
    }
}

fn fixed(v: f64) -> String {
    if v.is_nan() {
        "nan".to_string()
    } else {
        format!("{v:.6}")
    }
}

/// `|`-joined list of 6-decimal values.
pub fn join_values(values: &[f64]) -> String {
    values.iter().map(|v| fixed(*v)).collect::<Vec<_>>().join("|")
}

/// Every row written to the metrics CSV, in output order.
pub fn metric_rows(r: &FidelityResult) -> Vec<MetricRow> {
    let loc = r.max_location;
    let nan = f64::NAN;
    vec![
        row("summary", "mean_diff_m", fixed(r.mean_diff_m)),
        row("summary", "max_abs_diff_m", fixed(r.max_abs_diff_m)),
        row("summary", "orientation_mean_deg", fixed(r.orientation_mean_deg)),
        row("summary", "orientation_std_deg", fixed(r.orientation_std_deg)),
        row("summary", "orientation_p90_deg", fixed(r.orientation_p90_deg)),
        row("summary", "mask_lon_padding_deg", fixed(r.mask_lon_padding_deg)),
        row("summary", "mask_lat_padding_deg", fixed(r.mask_lat_padding_deg)),
        row("summary", "mask_valid_fraction", fixed(r.mask_valid_fraction)),
        row("summary", "max_abs_diff_lon_deg", fixed(loc.map_or(nan, |l| l.lon))),
        row("summary", "max_abs_diff_lat_deg", fixed(loc.map_or(nan, |l| l.lat))),
        row("summary", "max_abs_diff_stage_m", fixed(loc.map_or(nan, |l| l.simulated_m))),
        row("summary", "max_abs_diff_exemplar_m", fixed(loc.map_or(nan, |l| l.exemplar_m))),
        row("hypsometric", "percentiles", join_values(&r.percentiles)),
        row("hypsometric", "stage_b_m", join_values(&r.simulated_hypsometric_m)),
        row("hypsometric", "exemplar_m", join_values(&r.exemplar_hypsometric_m)),
        row("slope_histogram", "bin_edges", join_values(&r.slope_bin_edges)),
        row("slope_histogram", "stage_b_norm_counts", join_values(&r.simulated_slope_hist)),
        row("slope_histogram", "exemplar_norm_counts", join_values(&r.exemplar_slope_hist)),
        row("summary", "mean_diff_threshold_m", fixed(r.thresholds.mean_diff_m)),
        row("summary", "interior_diff_threshold_m", fixed(r.thresholds.interior_diff_m)),
        row("summary", "spike_warning_threshold_m", fixed(r.thresholds.spike_warning_m)),
    ]
}

pub fn metrics_csv(r: &FidelityResult) -> String {
    let mut out = String::from(METRICS_HEADER);
    out.push('\n');
    for m in metric_rows(r) {
        out.push_str(&format!("{},{},{}\n", m.category, m.metric, m.value));
    }
    out
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ExemplarError::io(parent, e))?;
    }
    Ok(())
}

pub fn write_metrics_csv(path: &Path, r: &FidelityResult) -> Result<()> {
    ensure_parent(path)?;
    fs::write(path, metrics_csv(r)).map_err(|e| ExemplarError::io(path, e))
}

#[inline]
fn to_u8(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0) as u8
}

/// Three equal panels side by side.
///
/// The gray panels share one `[vmin, vmax]` stretch (NaN drawn as `vmin`).
/// The difference panel is scaled by its largest magnitude (NaN drawn as 0):
/// negative shades to blue, zero is white, positive shades to red.
pub fn comparison_image(simulated: &HeightField, exemplar: &HeightField, diff: &HeightField) -> RgbImage {
    let (w, h) = (simulated.width, simulated.height);
    let finite = |f: &HeightField| f.data.iter().copied().filter(|v| v.is_finite()).collect::<Vec<_>>();
    let values: Vec<f64> = finite(simulated).into_iter().chain(finite(exemplar)).collect();
    let vmin = values.iter().copied().fold(f64::INFINITY, f64::min);
    let vmax = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (vmin, vmax) = if !vmin.is_finite() || !vmax.is_finite() {
        (0.0, 1.0)
    } else if (vmax - vmin).abs() <= 1e-9 * vmax.abs().max(vmin.abs()).max(1.0) {
        (vmin, vmin + 1.0)
    } else {
        (vmin, vmax)
    };

    let max_abs = diff
        .data
        .iter()
        .filter(|v| v.is_finite())
        .fold(0.0f64, |m, v| m.max(v.abs()));
    let max_abs = if max_abs == 0.0 { 1.0 } else { max_abs };

    let gray = |f: &HeightField, row: usize, col: usize| {
        let v = f.get(row, col);
        let v = if v.is_nan() { vmin } else { v };
        let g = to_u8((v - vmin) / (vmax - vmin));
        Rgb([g, g, g])
    };

    let mut img = RgbImage::new((w * 3) as u32, h as u32);
    for row in 0..h {
        for col in 0..w {
            img.put_pixel(col as u32, row as u32, gray(simulated, row, col));
            if row < exemplar.height && col < exemplar.width {
                img.put_pixel((w + col) as u32, row as u32, gray(exemplar, row, col));
            }
            let d = diff.get(row, col);
            let n = if d.is_finite() { (d / max_abs).clamp(-1.0, 1.0) } else { 0.0 };
            img.put_pixel(
                (2 * w + col) as u32,
                row as u32,
                Rgb([to_u8(1.0 + n), to_u8(1.0 - n.abs()), to_u8(1.0 - n)]),
            );
        }
    }
    img
}

pub fn save_comparison_image(path: &Path, img: &RgbImage) -> Result<()> {
    ensure_parent(path)?;
    img.save_with_format(path, ImageFormat::Png)
        .map_err(|source| ExemplarError::Image {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fidelity::{compare, ComparisonOptions};
    use crate::geo::Bounds;

    fn result() -> FidelityResult {
        let ex = HeightField::new(4, 4, 100.0);
        let sim = HeightField::new(4, 4, 110.0);
        compare(&sim, &ex, (4, 4), Bounds::new(0.0, 1.0, 0.0, 1.0), &ComparisonOptions::default())
            .unwrap()
            .result
    }

    #[test]
    fn csv_has_header_and_all_rows() {
        let csv = metrics_csv(&result());
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], METRICS_HEADER);
        assert_eq!(lines.len(), 22);
        assert!(lines.contains(&"summary,mean_diff_m,10.000000"));
        assert!(lines.contains(&"summary,spike_warning_threshold_m,750.000000"));
        let pct = lines.iter().find(|l| l.starts_with("hypsometric,percentiles,")).unwrap();
        assert_eq!(pct.split('|').count(), 21);
        assert!(pct.ends_with("|100.000000"));
    }

    #[test]
    fn diff_panel_colours_sign() {
        let sim = HeightField::new(2, 1, 10.0);
        let ex = HeightField::new(2, 1, 0.0);
        let diff = HeightField::from_data(vec![-5.0, 5.0], 2, 1).unwrap();
        let img = comparison_image(&sim, &ex, &diff);
        assert_eq!(img.dimensions(), (6, 1));
        assert_eq!(img.get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert_eq!(img.get_pixel(2, 0), &Rgb([0, 0, 0]));
        assert_eq!(img.get_pixel(4, 0), &Rgb([0, 0, 255]));
        assert_eq!(img.get_pixel(5, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn nan_difference_is_white() {
        let f = HeightField::new(1, 1, 3.0);
        let diff = HeightField::new(1, 1, f64::NAN);
        let img = comparison_image(&f, &f, &diff);
        assert_eq!(img.get_pixel(2, 0), &Rgb([255, 255, 255]));
        // flat stretch maps everything to vmin
        assert_eq!(img.get_pixel(0, 0), &Rgb([0, 0, 0]));
    }
}
