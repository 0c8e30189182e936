//! Dominant terrain grain direction from the smoothed structure tensor.
//!
//! For each cell:
//!
//! ```text
//!   Jxx = G * gx²,  Jyy = G * gy²,  Jxy = G * gx·gy      (G: Gaussian, σ = 3 px)
//!   θ   = ½ · atan2(2·Jxy, Jxx − Jyy)                      in [0°, 180°)
//! ```
//!
//! Cell angles are averaged as doubled angles weighted by gradient magnitude,
//! which resolves the 180° ambiguity. `strength` is the resultant length of
//! that mean, 0 (no preferred direction) to 1 (perfectly aligned).

use serde::{Deserialize, Serialize};

use crate::gradient::gradient_components;
use crate::heightfield::HeightField;

pub const DEFAULT_SIGMA_PX: f64 = 3.0;
/// Below this valid fraction no orientation is reported.
pub const MIN_VALID_FRACTION: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    pub orientation_deg: f64,
    pub strength: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Orientation {
    fn none(note: Option<&str>) -> Self {
        Self {
            orientation_deg: 0.0,
            strength: 0.0,
            note: note.map(str::to_string),
        }
    }

    /// Degrees to 2 decimals, strength to 4.
    pub fn rounded(&self) -> Self {
        Self {
            orientation_deg: (self.orientation_deg * 100.0).round() / 100.0,
            strength: (self.strength * 10_000.0).round() / 10_000.0,
            note: self.note.clone(),
        }
    }
}

/// Orientation of a raster whose missing cells are NaN.
///
/// Missing cells are filled with the median of the valid ones first.
pub fn dominant_orientation(field: &HeightField, sigma_px: f64) -> Orientation {
    let mut valid: Vec<f64> = field.data.iter().copied().filter(|v| v.is_finite()).collect();
    if field.data.is_empty() || (valid.len() as f64 / field.data.len() as f64) < MIN_VALID_FRACTION {
        return Orientation::none(Some("too_much_nodata"));
    }
    valid.sort_by(f64::total_cmp);
    let median = median_of_sorted(&valid);
    let filled = HeightField {
        data: field
            .data
            .iter()
            .map(|&v| if v.is_finite() { v } else { median })
            .collect(),
        width: field.width,
        height: field.height,
    };
    structure_tensor_orientation(&filled, sigma_px)
}

fn median_of_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

fn structure_tensor_orientation(field: &HeightField, sigma_px: f64) -> Orientation {
    let (w, h) = (field.width, field.height);
    let n = w * h;
    let (gx, gy) = gradient_components(field);

    let weights: Vec<f64> = gx.iter().zip(&gy).map(|(x, y)| x.hypot(*y)).collect();
    let total_weight: f64 = weights.iter().sum();
    if total_weight < 1e-6 {
        return Orientation::none(None);
    }

    let jxx = gaussian_blur(&gx.iter().map(|x| x * x).collect::<Vec<_>>(), w, h, sigma_px);
    let jyy = gaussian_blur(&gy.iter().map(|y| y * y).collect::<Vec<_>>(), w, h, sigma_px);
    let jxy = gaussian_blur(&gx.iter().zip(&gy).map(|(x, y)| x * y).collect::<Vec<_>>(), w, h, sigma_px);

    let mut sum_c = 0.0;
    let mut sum_s = 0.0;
    for i in 0..n {
        let angle = 0.5 * (2.0 * jxy[i]).atan2(jxx[i] - jyy[i] + 1e-12);
        let deg = (angle.to_degrees() + 180.0).rem_euclid(180.0);
        let theta = (deg * 2.0).to_radians();
        sum_c += weights[i] * theta.cos();
        sum_s += weights[i] * theta.sin();
    }
    let c = sum_c / (total_weight + 1e-12);
    let s = sum_s / (total_weight + 1e-12);

    Orientation {
        orientation_deg: (s.atan2(c).to_degrees() / 2.0).rem_euclid(180.0),
        strength: c.hypot(s),
        note: None,
    }
}

/// Normalized 1-D Gaussian kernel truncated at 4σ.
fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (4.0 * sigma + 0.5) as usize;
    let mut k: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-0.5 * x * x / (sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = k.iter().sum();
    k.iter_mut().for_each(|v| *v /= sum);
    k
}

/// Mirror an out-of-range index back inside `0..n`, repeating the edge sample.
fn reflect(i: isize, n: usize) -> usize {
    let n = n as isize;
    let period = 2 * n;
    let m = i.rem_euclid(period);
    (if m < n { m } else { period - 1 - m }) as usize
}

/// Separable Gaussian blur with reflected borders.
fn gaussian_blur(data: &[f64], width: usize, height: usize, sigma: f64) -> Vec<f64> {
    if sigma <= 0.0 {
        return data.to_vec();
    }
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as isize;

    let mut tmp = vec![0.0; data.len()];
    for row in 0..height {
        for col in 0..width {
            tmp[row * width + col] = kernel
                .iter()
                .enumerate()
                .map(|(k, w)| w * data[row * width + reflect(col as isize + k as isize - radius, width)])
                .sum();
        }
    }
    let mut out = vec![0.0; data.len()];
    for row in 0..height {
        for col in 0..width {
            out[row * width + col] = kernel
                .iter()
                .enumerate()
                .map(|(k, w)| w * tmp[reflect(row as isize + k as isize - radius, height) * width + col])
                .sum();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn field_from(f: impl Fn(usize, usize) -> f64, n: usize) -> HeightField {
        let mut hf = HeightField::new(n, n, 0.0);
        for r in 0..n {
            for c in 0..n {
                hf.set(r, c, f(r, c));
            }
        }
        hf
    }

    #[test]
    fn ridges_along_rows_point_across_them() {
        // elevation varies with column only: gradient along x, angle 0°
        let hf = field_from(|_, c| (c as f64 * 0.4).sin() * 100.0, 32);
        let o = dominant_orientation(&hf, DEFAULT_SIGMA_PX);
        let d = o.orientation_deg.min(180.0 - o.orientation_deg);
        assert!(d < 1.0, "{o:?}");
        assert!(o.strength > 0.99);
    }

    #[test]
    fn ridges_along_columns_give_ninety_degrees() {
        let hf = field_from(|r, _| (r as f64 * 0.4).sin() * 100.0, 32);
        let o = dominant_orientation(&hf, DEFAULT_SIGMA_PX);
        assert_abs_diff_eq!(o.orientation_deg, 90.0, epsilon = 1.0);
    }

    #[test]
    fn flat_and_empty_fields_have_no_orientation() {
        let flat = HeightField::new(16, 16, 250.0);
        assert_eq!(dominant_orientation(&flat, 3.0), Orientation::none(None));

        let mut holes = HeightField::new(10, 10, f64::NAN);
        holes.set(0, 0, 1.0);
        let o = dominant_orientation(&holes, 3.0);
        assert_eq!(o.note.as_deref(), Some("too_much_nodata"));
    }

    #[test]
    fn reflect_repeats_edge_samples() {
        assert_eq!(reflect(-1, 5), 0);
        assert_eq!(reflect(-2, 5), 1);
        assert_eq!(reflect(5, 5), 4);
        assert_eq!(reflect(6, 5), 3);
        assert_eq!(reflect(-12, 5), 1);
    }

    #[test]
    fn kernel_is_normalized_with_4_sigma_radius() {
        let k = gaussian_kernel(3.0);
        assert_eq!(k.len(), 25);
        assert_abs_diff_eq!(k.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }
}
