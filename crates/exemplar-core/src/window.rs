//! Geographic box → pixel window conversion and cropping.

use tracing::{debug, warn};

use crate::error::{ExemplarError, Result};
use crate::geo::Bounds;
use crate::raster::RasterWindow;

/// Integer pixel window. Offsets may be negative before clipping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub col_off: i64,
    pub row_off: i64,
    pub width: i64,
    pub height: i64,
}

impl PixelWindow {
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Intersect with a `width × height` raster.
    pub fn clip(&self, width: usize, height: usize) -> PixelWindow {
        let c0 = self.col_off.clamp(0, width as i64);
        let r0 = self.row_off.clamp(0, height as i64);
        let c1 = (self.col_off + self.width).clamp(0, width as i64);
        let r1 = (self.row_off + self.height).clamp(0, height as i64);
        PixelWindow {
            col_off: c0,
            row_off: r0,
            width: (c1 - c0).max(0),
            height: (r1 - r0).max(0),
        }
    }
}

#[inline]
fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

/// Convert `bounds` into a pixel window on `raster` through the inverse
/// transform. Lengths are rounded first, then offsets, both with
/// `floor(x + 0.5)`.
pub fn window_from_bounds(raster: &RasterWindow, bounds: &Bounds) -> Result<PixelWindow> {
    let inverse = raster
        .transform
        .inverse()
        .ok_or_else(|| ExemplarError::Geometry("source transform is not invertible".to_string()))?;

    let corners = [
        inverse.apply(bounds.west, bounds.north),
        inverse.apply(bounds.east, bounds.north),
        inverse.apply(bounds.west, bounds.south),
        inverse.apply(bounds.east, bounds.south),
    ];
    let col_min = corners.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let col_max = corners.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    let row_min = corners.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let row_max = corners.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);

    let width = round_half_up(col_max - col_min);
    let height = round_half_up(row_max - row_min);
    let col_off = round_half_up(col_min);
    let row_off = round_half_up(row_min);
    if ![width, height, col_off, row_off].iter().all(|v| v.is_finite()) {
        return Err(ExemplarError::Geometry("window coordinates are not finite".to_string()));
    }

    Ok(PixelWindow {
        col_off: col_off as i64,
        row_off: row_off as i64,
        width: width as i64,
        height: height as i64,
    })
}

/// Crop `bounds` out of `raster`, clipping to the raster extent.
pub fn extract_window(raster: &RasterWindow, bounds: &Bounds) -> Result<RasterWindow> {
    bounds.validate()?;
    let requested = window_from_bounds(raster, bounds)?;
    let window = requested.clip(raster.width, raster.height);
    if window.is_empty() {
        return Err(ExemplarError::Geometry(format!(
            "window {requested:?} does not overlap the {}×{} source raster",
            raster.width, raster.height
        )));
    }
    if window != requested {
        warn!(?requested, clipped = ?window, "window extends past the source raster, clipping");
    }
    debug!(?window, "extracting window");

    let (c0, r0) = (window.col_off as usize, window.row_off as usize);
    let (w, h) = (window.width as usize, window.height as usize);
    let mut data = Vec::with_capacity(w * h);
    for row in r0..r0 + h {
        let start = row * raster.width + c0;
        data.extend_from_slice(&raster.data[start..start + w]);
    }

    let transform = raster.transform.translated(c0 as f64, r0 as f64);
    RasterWindow::from_data(data, w, h, transform, raster.nodata)
}
