//! 16-bit grayscale PNG exemplars.
//!
//! A sample `v` encodes `min + v / 65535 · (max − min)` metres, where the
//! range comes from the library (or manifest) statistics.

use std::fs;
use std::path::Path;

use image::{DynamicImage, ImageBuffer, ImageFormat, Luma};

use crate::error::{ExemplarError, Result};
use crate::heightfield::HeightField;
use crate::library::LibraryEntry;
use crate::raster::RasterWindow;
use crate::stats::{compute_statistics, PatchStatistics};

pub const PNG16_MAX: f64 = 65535.0;

/// Decoded min/max may differ from the library range by less than this.
pub const RANGE_TOLERANCE_M: f64 = 1.0;
pub const MEAN_TOLERANCE_M: f64 = 10.0;
pub const STDDEV_TOLERANCE_M: f64 = 50.0;
/// A usable exemplar needs more relief than this standard deviation.
pub const MIN_RELIEF_STDDEV_M: f64 = 100.0;

fn image_err(path: &Path, source: image::ImageError) -> ExemplarError {
    ExemplarError::Image {
        path: path.to_path_buf(),
        source,
    }
}

/// Decode an exemplar PNG into metres. Multi-channel images keep channel 0.
pub fn load_png16(path: &Path, elevation_min: f64, elevation_max: f64) -> Result<HeightField> {
    let img = image::open(path).map_err(|e| image_err(path, e))?;
    let (width, height) = (img.width() as usize, img.height() as usize);
    let raw: Vec<u16> = match img {
        DynamicImage::ImageLuma16(buf) => buf.into_raw(),
        DynamicImage::ImageLuma8(buf) => buf.into_raw().into_iter().map(u16::from).collect(),
        other => other.to_rgb16().pixels().map(|p| p.0[0]).collect(),
    };
    let span = elevation_max - elevation_min;
    let data = raw
        .into_iter()
        .map(|v| elevation_min + v as f64 / PNG16_MAX * span)
        .collect();
    HeightField::from_data(data, width, height)
}

/// Outcome of one PNG16 export.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Png16Export {
    pub nodata_pixels: usize,
    pub total_pixels: usize,
}

impl Png16Export {
    pub fn nodata_fraction(&self) -> f64 {
        if self.total_pixels == 0 {
            return 0.0;
        }
        self.nodata_pixels as f64 / self.total_pixels as f64
    }
}

/// Scale `[min, max]` to `[0, 65535]`. Nodata is written as `min`; a
/// collapsed range (`max ≤ min`) encodes every pixel as 0.
pub fn encode_png16(raster: &RasterWindow, elevation_min: f64, elevation_max: f64) -> (Vec<u16>, usize) {
    let span = elevation_max - elevation_min;
    let mut nodata_pixels = 0usize;
    let encoded = raster
        .data
        .iter()
        .map(|&v| {
            let v = if raster.is_valid(v) {
                v as f64
            } else {
                nodata_pixels += 1;
                elevation_min
            };
            if span > 0.0 {
                ((v - elevation_min) / span * PNG16_MAX).clamp(0.0, PNG16_MAX) as u16
            } else {
                0
            }
        })
        .collect();
    (encoded, nodata_pixels)
}

pub fn export_png16(
    raster: &RasterWindow,
    elevation_min: f64,
    elevation_max: f64,
    path: &Path,
) -> Result<Png16Export> {
    let (encoded, nodata_pixels) = encode_png16(raster, elevation_min, elevation_max);
    let buf: ImageBuffer<Luma<u16>, Vec<u16>> =
        ImageBuffer::from_raw(raster.width as u32, raster.height as u32, encoded).ok_or_else(|| {
            ExemplarError::DataIntegrity(format!(
                "raster does not fill a {}×{} image",
                raster.width, raster.height
            ))
        })?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ExemplarError::io(parent, e))?;
    }
    buf.save_with_format(path, ImageFormat::Png)
        .map_err(|e| image_err(path, e))?;
    Ok(Png16Export {
        nodata_pixels,
        total_pixels: raster.data.len(),
    })
}

/// One decoded-versus-library comparison. `tolerance` is `None` for the
/// relief check, which passes when `decoded > expected`.
#[derive(Debug, Clone, PartialEq)]
pub struct Png16Check {
    pub name: &'static str,
    pub decoded: f64,
    pub expected: f64,
    pub tolerance: Option<f64>,
    pub passed: bool,
}

impl Png16Check {
    fn within(name: &'static str, decoded: f64, expected: f64, tolerance: f64) -> Self {
        Self {
            name,
            decoded,
            expected,
            tolerance: Some(tolerance),
            passed: (decoded - expected).abs() < tolerance,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Png16Validation {
    pub width: usize,
    pub height: usize,
    /// `(width, height)` the library records for this exemplar.
    pub expected_size: (usize, usize),
    pub statistics: PatchStatistics,
    pub checks: Vec<Png16Check>,
}

impl Png16Validation {
    pub fn dimensions_match(&self) -> bool {
        (self.width, self.height) == self.expected_size
    }

    pub fn passed(&self) -> bool {
        self.dimensions_match() && self.checks.iter().all(|c| c.passed)
    }
}

/// Decode an exemplar PNG with its library range and check it against the
/// library's recorded size and statistics. Mean and stddev checks are skipped
/// for entries that do not record them.
pub fn validate_png16(path: &Path, entry: &LibraryEntry) -> Result<Png16Validation> {
    let field = load_png16(path, entry.elevation_min_m, entry.elevation_max_m)?;
    let samples: Vec<f32> = field.data.iter().map(|&v| v as f32).collect();
    let statistics = compute_statistics(&samples, None)?;

    let mut checks = vec![
        Png16Check::within("min", statistics.min, entry.elevation_min_m, RANGE_TOLERANCE_M),
        Png16Check::within("max", statistics.max, entry.elevation_max_m, RANGE_TOLERANCE_M),
    ];
    if let Some(mean) = entry.elevation_mean_m {
        checks.push(Png16Check::within("mean", statistics.mean, mean, MEAN_TOLERANCE_M));
    }
    if let Some(stddev) = entry.elevation_stddev_m {
        checks.push(Png16Check::within("stddev", statistics.stddev, stddev, STDDEV_TOLERANCE_M));
    }
    checks.push(Png16Check {
        name: "relief",
        decoded: statistics.stddev,
        expected: MIN_RELIEF_STDDEV_M,
        tolerance: None,
        passed: statistics.stddev > MIN_RELIEF_STDDEV_M,
    });

    Ok(Png16Validation {
        width: field.width,
        height: field.height,
        expected_size: entry.resolution_or((field.width, field.height)),
        statistics,
        checks,
    })
}
