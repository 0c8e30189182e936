//! Reprojection of an extracted window onto a fixed `size × size` grid.
//!
//! The destination grid divides the window's geographic extent evenly. Each
//! destination cell centre is mapped back into source pixel space and
//! interpolated with the selected kernel. Nodata (and NaN) source samples never
//! contribute: kernel weights are renormalized over the valid contributors and
//! a cell without any valid contributor takes the source's nodata value.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ExemplarError, Result};
use crate::geo::Affine;
use crate::raster::RasterWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResamplingKernel {
    Nearest,
    #[default]
    Bilinear,
    Cubic,
    Average,
}

impl FromStr for ResamplingKernel {
    type Err = ExemplarError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "bilinear" => Ok(Self::Bilinear),
            "cubic" => Ok(Self::Cubic),
            "average" => Ok(Self::Average),
            other => Err(ExemplarError::Configuration(format!(
                "unknown resampling kernel '{other}' (expected nearest, bilinear, cubic or average)"
            ))),
        }
    }
}

impl fmt::Display for ResamplingKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Nearest => "nearest",
            Self::Bilinear => "bilinear",
            Self::Cubic => "cubic",
            Self::Average => "average",
        };
        f.write_str(name)
    }
}

/// Resample `window` to `size × size`. `size == 0` keeps the native grid.
pub fn resample(window: &RasterWindow, size: usize, kernel: ResamplingKernel) -> Result<RasterWindow> {
    let extent = window.bounds();
    extent.validate()?;
    if size == 0 {
        return Ok(window.clone());
    }

    let inverse = window
        .transform
        .inverse()
        .ok_or_else(|| ExemplarError::Geometry("window transform is not invertible".to_string()))?;
    let dest_transform = Affine::north_up(
        extent.west,
        extent.north,
        extent.lon_range() / size as f64,
        extent.lat_range() / size as f64,
    );

    let mut out = RasterWindow::empty(size, size, dest_transform, window.nodata);
    for row in 0..size {
        for col in 0..size {
            let value = match kernel {
                ResamplingKernel::Average => {
                    let (x0, y0) = dest_transform.apply(col as f64, row as f64);
                    let (x1, y1) = dest_transform.apply(col as f64 + 1.0, row as f64 + 1.0);
                    let (sc0, sr0) = inverse.apply(x0, y0);
                    let (sc1, sr1) = inverse.apply(x1, y1);
                    average(window, sc0.min(sc1), sc0.max(sc1), sr0.min(sr1), sr0.max(sr1))
                }
                _ => {
                    let (x, y) = dest_transform.apply(col as f64 + 0.5, row as f64 + 0.5);
                    let (sc, sr) = inverse.apply(x, y);
                    point_sample(window, sc, sr, kernel)
                }
            };
            if let Some(v) = value {
                out.set(row, col, v);
            }
        }
    }
    Ok(out)
}

/// Interpolate at pixel-edge coordinate `(col, row)`; `None` means fill.
fn point_sample(src: &RasterWindow, col: f64, row: f64, kernel: ResamplingKernel) -> Option<f32> {
    if col < 0.0 || row < 0.0 || col >= src.width as f64 || row >= src.height as f64 {
        return None;
    }
    // pixel-centre index space
    let (cx, cy) = (col - 0.5, row - 0.5);

    match kernel {
        ResamplingKernel::Nearest => {
            let v = src.get(row.floor() as usize, col.floor() as usize);
            src.is_valid(v).then_some(v)
        }
        ResamplingKernel::Bilinear => {
            let (x0, y0) = (cx.floor(), cy.floor());
            let (tx, ty) = (cx - x0, cy - y0);
            let taps = [
                (x0, y0, (1.0 - tx) * (1.0 - ty)),
                (x0 + 1.0, y0, tx * (1.0 - ty)),
                (x0, y0 + 1.0, (1.0 - tx) * ty),
                (x0 + 1.0, y0 + 1.0, tx * ty),
            ];
            weighted(src, taps)
        }
        ResamplingKernel::Cubic => {
            let (x0, y0) = (cx.floor(), cy.floor());
            let (tx, ty) = (cx - x0, cy - y0);
            let mut taps = [(0.0, 0.0, 0.0); 16];
            for (j, dy) in (-1..=2).enumerate() {
                for (i, dx) in (-1..=2).enumerate() {
                    let w = keys_cubic(dx as f64 - tx) * keys_cubic(dy as f64 - ty);
                    taps[j * 4 + i] = (x0 + dx as f64, y0 + dy as f64, w);
                }
            }
            weighted(src, taps)
        }
        ResamplingKernel::Average => average(src, col - 0.5, col + 0.5, row - 0.5, row + 0.5),
    }
}

/// Weighted sum over in-range, valid taps, renormalized by their total weight.
fn weighted<const N: usize>(src: &RasterWindow, taps: [(f64, f64, f64); N]) -> Option<f32> {
    let mut sum = 0.0f64;
    let mut weight = 0.0f64;
    for (x, y, w) in taps {
        if w == 0.0 || x < 0.0 || y < 0.0 {
            continue;
        }
        let (xi, yi) = (x as usize, y as usize);
        if xi >= src.width || yi >= src.height {
            continue;
        }
        let v = src.get(yi, xi);
        if !src.is_valid(v) {
            continue;
        }
        sum += w * v as f64;
        weight += w;
    }
    (weight.abs() > 1e-12).then(|| (sum / weight) as f32)
}

/// Keys cubic convolution kernel, a = −0.5.
fn keys_cubic(t: f64) -> f64 {
    const A: f64 = -0.5;
    let t = t.abs();
    if t <= 1.0 {
        (A + 2.0) * t.powi(3) - (A + 3.0) * t.powi(2) + 1.0
    } else if t < 2.0 {
        A * t.powi(3) - 5.0 * A * t.powi(2) + 8.0 * A * t - 4.0 * A
    } else {
        0.0
    }
}

/// Unweighted mean of valid source pixels overlapping `[c0, c1) × [r0, r1)`.
fn average(src: &RasterWindow, c0: f64, c1: f64, r0: f64, r1: f64) -> Option<f32> {
    let clamp_w = |v: f64| v.clamp(0.0, src.width as f64) as usize;
    let clamp_h = |v: f64| v.clamp(0.0, src.height as f64) as usize;
    let (col_lo, col_hi) = (clamp_w(c0.floor()), clamp_w(c1.ceil()));
    let (row_lo, row_hi) = (clamp_h(r0.floor()), clamp_h(r1.ceil()));

    let mut sum = 0.0f64;
    let mut count = 0usize;
    for row in row_lo..row_hi {
        for col in col_lo..col_hi {
            let v = src.get(row, col);
            if src.is_valid(v) {
                sum += v as f64;
                count += 1;
            }
        }
    }
    (count > 0).then(|| (sum / count as f64) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ramp(width: usize, height: usize) -> RasterWindow {
        let t = Affine::north_up(10.0, 20.0, 1.0 / width as f64, 1.0 / height as f64);
        let data = (0..width * height).map(|i| (i % width) as f32 * 10.0).collect();
        RasterWindow::from_data(data, width, height, t, Some(-32768.0)).unwrap()
    }

    #[test]
    fn output_is_square_at_requested_size() {
        let src = ramp(7, 5);
        for kernel in [
            ResamplingKernel::Nearest,
            ResamplingKernel::Bilinear,
            ResamplingKernel::Cubic,
            ResamplingKernel::Average,
        ] {
            let out = resample(&src, 16, kernel).unwrap();
            assert_eq!((out.width, out.height), (16, 16), "{kernel}");
            let (got, want) = (out.bounds(), src.bounds());
            assert_abs_diff_eq!(got.west, want.west, epsilon = 1e-9);
            assert_abs_diff_eq!(got.east, want.east, epsilon = 1e-9);
            assert_abs_diff_eq!(got.south, want.south, epsilon = 1e-9);
            assert_abs_diff_eq!(got.north, want.north, epsilon = 1e-9);
            assert_eq!(out.nodata, src.nodata);
        }
    }

    #[test]
    fn same_grid_bilinear_is_identity() {
        let src = ramp(8, 8);
        let out = resample(&src, 8, ResamplingKernel::Bilinear).unwrap();
        for (a, b) in src.data.iter().zip(&out.data) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-3);
        }
    }

    #[test]
    fn nodata_never_leaks_into_interpolation() {
        let mut src = ramp(4, 4);
        src.set(1, 1, -32768.0);
        let out = resample(&src, 8, ResamplingKernel::Bilinear).unwrap();
        assert!(out.data.iter().all(|v| *v == -32768.0 || (0.0..=30.0).contains(v)));

        let mut hole = ramp(2, 2);
        hole.data.fill(-32768.0);
        let filled = resample(&hole, 4, ResamplingKernel::Cubic).unwrap();
        assert!(filled.data.iter().all(|v| *v == -32768.0));
    }

    #[test]
    fn average_of_constant_block_is_constant() {
        let t = Affine::north_up(0.0, 1.0, 0.125, 0.125);
        let src = RasterWindow::from_data(vec![42.0; 64], 8, 8, t, None).unwrap();
        let out = resample(&src, 3, ResamplingKernel::Average).unwrap();
        assert!(out.data.iter().all(|v| (*v - 42.0).abs() < 1e-4));
    }

    #[test]
    fn zero_size_keeps_native_grid() {
        let src = ramp(5, 3);
        let out = resample(&src, 0, ResamplingKernel::Nearest).unwrap();
        assert_eq!((out.width, out.height), (5, 3));
    }

    #[test]
    fn kernel_names_parse() {
        assert_eq!("Cubic".parse::<ResamplingKernel>().unwrap(), ResamplingKernel::Cubic);
        assert!("lanczos".parse::<ResamplingKernel>().is_err());
        assert_eq!(ResamplingKernel::default().to_string(), "bilinear");
    }
}
