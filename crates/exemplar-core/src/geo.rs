//! Geographic bounding boxes and affine pixel↔degree transforms.
//! All coordinate math uses f64.

use serde::{Deserialize, Serialize};

use crate::error::{ExemplarError, Result};

/// Axis-aligned lon/lat box in degrees. Normalized means `west < east` and
/// `south < north`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub west: f64,
    pub east: f64,
    pub south: f64,
    pub north: f64,
}

impl Bounds {
    pub fn new(west: f64, east: f64, south: f64, north: f64) -> Self {
        Self {
            west,
            east,
            south,
            north,
        }
    }

    /// Build a box from upper-left / lower-right corners given in any order.
    pub fn from_corners(ul_lat: f64, ul_lon: f64, lr_lat: f64, lr_lon: f64) -> Self {
        Self {
            west: ul_lon.min(lr_lon),
            east: ul_lon.max(lr_lon),
            south: ul_lat.min(lr_lat),
            north: ul_lat.max(lr_lat),
        }
    }

    #[inline]
    pub fn lon_range(&self) -> f64 {
        self.east - self.west
    }

    #[inline]
    pub fn lat_range(&self) -> f64 {
        self.north - self.south
    }

    pub fn is_degenerate(&self) -> bool {
        let finite = [self.west, self.east, self.south, self.north]
            .iter()
            .all(|v| v.is_finite());
        !finite || self.east <= self.west || self.north <= self.south
    }

    /// Reject zero-area, inverted or non-finite boxes.
    pub fn validate(&self) -> Result<()> {
        if self.is_degenerate() {
            return Err(ExemplarError::Geometry(format!(
                "degenerate bounds: west={}, east={}, south={}, north={}",
                self.west, self.east, self.south, self.north
            )));
        }
        Ok(())
    }

    /// Reject inverted or non-finite boxes. Unlike [`Bounds::validate`], a
    /// zero extent is accepted.
    pub fn validate_ordered(&self) -> Result<()> {
        let finite = [self.west, self.east, self.south, self.north]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.east < self.west || self.north < self.south {
            return Err(ExemplarError::Geometry(format!(
                "inverted bounds: west={}, east={}, south={}, north={}",
                self.west, self.east, self.south, self.north
            )));
        }
        Ok(())
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            west: self.west.min(other.west),
            east: self.east.max(other.east),
            south: self.south.min(other.south),
            north: self.north.max(other.north),
        }
    }
}

/// Affine pixel → geographic transform, GDAL/rasterio coefficient order:
///
/// ```text
///   x = a·col + b·row + c
///   y = d·col + e·row + f
/// ```
///
/// For north-up rasters `b = d = 0` and `e < 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Affine {
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// North-up transform anchored at the (west, north) corner.
    pub fn north_up(west: f64, north: f64, x_res: f64, y_res: f64) -> Self {
        Self::new(x_res, 0.0, west, 0.0, -y_res.abs(), north)
    }

    /// Map a pixel-edge coordinate `(col, row)` to `(x, y)`.
    #[inline]
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.a * col + self.b * row + self.c,
            self.d * col + self.e * row + self.f,
        )
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.e - self.b * self.d
    }

    /// Geographic → pixel transform. `None` for singular transforms.
    pub fn inverse(&self) -> Option<Affine> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        Some(Affine {
            a: self.e / det,
            b: -self.b / det,
            c: (self.b * self.f - self.e * self.c) / det,
            d: -self.d / det,
            e: self.a / det,
            f: (self.d * self.c - self.a * self.f) / det,
        })
    }

    /// Transform of a sub-window whose top-left pixel is `(col_off, row_off)`.
    pub fn translated(&self, col_off: f64, row_off: f64) -> Affine {
        let (c, f) = self.apply(col_off, row_off);
        Affine { c, f, ..*self }
    }

    /// Geographic extent covered by a `width × height` raster.
    pub fn bounds(&self, width: usize, height: usize) -> Bounds {
        let (w, h) = (width as f64, height as f64);
        let corners = [
            self.apply(0.0, 0.0),
            self.apply(w, 0.0),
            self.apply(0.0, h),
            self.apply(w, h),
        ];
        let mut out = Bounds::new(f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY);
        for (x, y) in corners {
            out.west = out.west.min(x);
            out.east = out.east.max(x);
            out.south = out.south.min(y);
            out.north = out.north.max(y);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn corners_are_normalized_in_any_order() {
        let b = Bounds::from_corners(27.5, 87.0, 28.5, 86.0);
        assert_eq!(b, Bounds::new(86.0, 87.0, 27.5, 28.5));
        assert!(!b.is_degenerate());
    }

    #[test]
    fn zero_width_box_is_rejected() {
        let b = Bounds::from_corners(28.0, 86.0, 27.0, 86.0);
        assert!(b.is_degenerate());
        assert!(matches!(b.validate(), Err(ExemplarError::Geometry(_))));
        assert!(b.validate_ordered().is_ok());
    }

    #[test]
    fn inverted_box_fails_ordering() {
        let b = Bounds::new(87.0, 86.0, 27.0, 28.0);
        assert!(matches!(b.validate_ordered(), Err(ExemplarError::Geometry(_))));
        let b = Bounds::new(86.0, 87.0, 28.0, f64::NAN);
        assert!(b.validate_ordered().is_err());
    }

    #[test]
    fn inverse_round_trips() {
        let t = Affine::north_up(86.0, 28.0, 1.0 / 3600.0, 1.0 / 3600.0);
        let inv = t.inverse().unwrap();
        let (x, y) = t.apply(123.0, 456.0);
        let (col, row) = inv.apply(x, y);
        assert_abs_diff_eq!(col, 123.0, epsilon = 1e-6);
        assert_abs_diff_eq!(row, 456.0, epsilon = 1e-6);
    }

    #[test]
    fn singular_transform_has_no_inverse() {
        assert!(Affine::new(0.0, 0.0, 1.0, 0.0, 0.0, 1.0).inverse().is_none());
    }

    #[test]
    fn translated_window_keeps_resolution() {
        let t = Affine::north_up(10.0, 50.0, 0.5, 0.25);
        let w = t.translated(4.0, 2.0);
        assert_abs_diff_eq!(w.c, 12.0);
        assert_abs_diff_eq!(w.f, 49.5);
        assert_eq!((w.a, w.e), (t.a, t.e));
        let b = w.bounds(2, 4);
        assert_eq!(b, Bounds::new(12.0, 13.0, 48.5, 49.5));
    }
}
