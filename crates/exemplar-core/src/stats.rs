//! Nodata-masked patch statistics.
//!
//! All accumulation is in f64. Standard deviation is the population form
//! (divide by N). The mean is clamped into `[min, max]` so that rounding on
//! near-constant patches can never break `min ≤ mean ≤ max`.

use serde::{Deserialize, Serialize};

use crate::error::{ExemplarError, Result};
use crate::raster::is_valid_sample;

/// Fraction of nodata above which a patch is flagged unusable.
/// A patch at exactly this fraction is still usable.
pub const NODATA_FRACTION_LIMIT: f64 = 0.10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatchStatistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stddev: f64,
}

/// Summarise the valid samples of `data`. Fails when none are valid.
pub fn compute_statistics(data: &[f32], nodata: Option<f32>) -> Result<PatchStatistics> {
    let mut count = 0usize;
    let mut sum = 0.0f64;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &v in data.iter().filter(|&&v| is_valid_sample(v, nodata)) {
        let v = v as f64;
        count += 1;
        sum += v;
        min = min.min(v);
        max = max.max(v);
    }
    if count == 0 {
        return Err(ExemplarError::DataIntegrity(format!(
            "all {} samples are nodata",
            data.len()
        )));
    }

    let n = count as f64;
    let mean = (sum / n).clamp(min, max);
    let variance = data
        .iter()
        .filter(|&&v| is_valid_sample(v, nodata))
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;

    Ok(PatchStatistics {
        min,
        max,
        mean,
        stddev: variance.max(0.0).sqrt(),
    })
}

/// Fraction of samples that are nodata or NaN. Empty input counts as 1.0.
pub fn nodata_fraction(data: &[f32], nodata: Option<f32>) -> f64 {
    if data.is_empty() {
        return 1.0;
    }
    let missing = data.iter().filter(|&&v| !is_valid_sample(v, nodata)).count();
    missing as f64 / data.len() as f64
}

/// True when `fraction` is within [`NODATA_FRACTION_LIMIT`].
pub fn is_usable(fraction: f64) -> bool {
    fraction <= NODATA_FRACTION_LIMIT
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn masks_sentinel_and_nan() {
        let data = [1.0, 2.0, -9999.0, 3.0, f32::NAN, 4.0];
        let s = compute_statistics(&data, Some(-9999.0)).unwrap();
        assert_eq!((s.min, s.max), (1.0, 4.0));
        assert_abs_diff_eq!(s.mean, 2.5);
        assert_abs_diff_eq!(s.stddev, 1.25f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn constant_patch_has_zero_stddev() {
        let data = [123.4f32; 50];
        let s = compute_statistics(&data, None).unwrap();
        assert!(s.min <= s.mean && s.mean <= s.max);
        assert_eq!(s.stddev, 0.0);
    }

    #[test]
    fn all_nodata_is_an_error_not_zero() {
        let err = compute_statistics(&[-1.0, -1.0], Some(-1.0)).unwrap_err();
        assert!(matches!(err, ExemplarError::DataIntegrity(_)));
        assert!(compute_statistics(&[f32::NAN], None).is_err());
    }

    #[test]
    fn exactly_ten_percent_nodata_is_usable() {
        let mut data = vec![5.0f32; 100];
        data[..10].fill(-32768.0);
        let fraction = nodata_fraction(&data, Some(-32768.0));
        assert_abs_diff_eq!(fraction, 0.10);
        assert!(is_usable(fraction));
        data[10] = -32768.0;
        assert!(!is_usable(nodata_fraction(&data, Some(-32768.0))));
    }
}
