use crate::error::{ExemplarError, Result};
use crate::geo::{Affine, Bounds};

/// A single-band georeferenced raster held in memory, row-major, row 0 = north.
///
/// Sample values are f32 metres; geometry stays in f64 via `transform`.
/// NaN is always treated as missing, in addition to the `nodata` sentinel.
#[derive(Debug, Clone)]
pub struct RasterWindow {
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
    pub transform: Affine,
    pub nodata: Option<f32>,
}

/// True when `v` is a real sample rather than a missing-data marker.
#[inline]
pub fn is_valid_sample(v: f32, nodata: Option<f32>) -> bool {
    !v.is_nan() && nodata.map_or(true, |nd| v != nd)
}

impl RasterWindow {
    /// A raster filled with its own missing-data value.
    pub fn empty(width: usize, height: usize, transform: Affine, nodata: Option<f32>) -> Self {
        Self {
            data: vec![nodata.unwrap_or(f32::NAN); width * height],
            width,
            height,
            transform,
            nodata,
        }
    }

    pub fn from_data(
        data: Vec<f32>,
        width: usize,
        height: usize,
        transform: Affine,
        nodata: Option<f32>,
    ) -> Result<Self> {
        if data.len() != width * height {
            return Err(ExemplarError::DataIntegrity(format!(
                "raster holds {} samples, expected {width}×{height}",
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            transform,
            nodata,
        })
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: f32) {
        self.data[row * self.width + col] = val;
    }

    #[inline]
    pub fn is_valid(&self, v: f32) -> bool {
        is_valid_sample(v, self.nodata)
    }

    pub fn bounds(&self) -> Bounds {
        self.transform.bounds(self.width, self.height)
    }

    /// `(x_deg, y_deg)` straight from the transform; `y_deg` is negative for
    /// north-up rasters.
    pub fn pixel_size(&self) -> (f64, f64) {
        (self.transform.a, self.transform.e)
    }

    /// Fraction of samples that are nodata or NaN. Empty rasters count as 1.0.
    pub fn nodata_fraction(&self) -> f64 {
        crate::stats::nodata_fraction(&self.data, self.nodata)
    }
}
