//! Shared finite-difference gradient helpers used by the fidelity slope
//! metrics and the orientation estimator.
//! `pub(crate)` only, not re-exported from lib.rs.

use crate::heightfield::HeightField;

/// Difference along one axis of length `n` at index `i`: central
/// `(v[i+1] − v[i−1]) / 2` inside, one-sided at both ends, 0 when `n ≤ 1`.
pub(crate) fn central_diff(get: impl Fn(usize) -> f64, n: usize, i: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        _ if i == 0 => get(1) - get(0),
        _ if i == n - 1 => get(n - 1) - get(n - 2),
        _ => (get(i + 1) - get(i - 1)) / 2.0,
    }
}

/// Row-major `(gx, gy)` in grid units; `gy` grows southwards with the row index.
pub(crate) fn gradient_components(field: &HeightField) -> (Vec<f64>, Vec<f64>) {
    let (w, h) = (field.width, field.height);
    let mut gx = vec![0.0; w * h];
    let mut gy = vec![0.0; w * h];
    for row in 0..h {
        for col in 0..w {
            let i = row * w + col;
            gx[i] = central_diff(|c| field.get(row, c), w, col);
            gy[i] = central_diff(|r| field.get(r, col), h, row);
        }
    }
    (gx, gy)
}
