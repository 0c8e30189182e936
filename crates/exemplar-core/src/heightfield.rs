use std::fs;
use std::path::Path;

use crate::error::{ExemplarError, Result};

/// A 2D elevation grid in metres, row-major, row 0 = north.
/// Used for both sides of a fidelity comparison; values are f64 because every
/// downstream metric accumulates in f64. NaN marks a missing cell.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightField {
    /// Row-major elevation values in metres.
    pub data: Vec<f64>,
    pub width: usize,
    pub height: usize,
}

impl HeightField {
    /// Create a new HeightField filled with the given value.
    pub fn new(width: usize, height: usize, fill: f64) -> Self {
        Self {
            data: vec![fill; width * height],
            width,
            height,
        }
    }

    pub fn from_data(data: Vec<f64>, width: usize, height: usize) -> Result<Self> {
        if data.len() != width * height || data.is_empty() {
            return Err(ExemplarError::DataIntegrity(format!(
                "heightfield holds {} values, expected non-empty {width}×{height}",
                data.len()
            )));
        }
        Ok(Self { data, width, height })
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: f64) {
        self.data[row * self.width + col] = val;
    }

    /// Smallest non-NaN value, `NaN` when every cell is missing.
    pub fn min_elevation(&self) -> f64 {
        self.data
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .reduce(f64::min)
            .unwrap_or(f64::NAN)
    }

    /// Parse a raster written as CSV text: one row per line, comma-separated.
    /// Blank lines are ignored; every row must have the same width.
    pub fn from_csv_str(text: &str) -> Result<Self> {
        let mut data = Vec::new();
        let mut width = 0usize;
        let mut height = 0usize;

        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut row_len = 0usize;
            for field in line.split(',') {
                let v: f64 = field.trim().parse().map_err(|_| {
                    ExemplarError::DataIntegrity(format!(
                        "line {}: '{}' is not a number",
                        line_no + 1,
                        field.trim()
                    ))
                })?;
                data.push(v);
                row_len += 1;
            }
            if height == 0 {
                width = row_len;
            } else if row_len != width {
                return Err(ExemplarError::DataIntegrity(format!(
                    "line {}: expected {width} columns, found {row_len}",
                    line_no + 1
                )));
            }
            height += 1;
        }

        Self::from_data(data, width, height)
    }

    pub fn load_csv(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| ExemplarError::io(path, e))?;
        Self::from_csv_str(&text)
    }
}
