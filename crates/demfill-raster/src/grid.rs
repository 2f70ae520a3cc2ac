//! Single-band raster grid with an explicit no-data value.

use crate::{RasterError, Result};

/// Check whether `value` is the no-data value `nodata`.
///
/// A NaN no-data value matches any NaN sample.
#[inline]
pub fn is_nodata(value: f32, nodata: f32) -> bool {
    if nodata.is_nan() {
        value.is_nan()
    } else {
        value == nodata
    }
}

/// A `width` x `height` grid of `f32` samples in row-major order
/// (north to south, west to east).
#[derive(Debug, Clone, PartialEq)]
pub struct RasterGrid {
    width: usize,
    height: usize,
    nodata: f32,
    data: Vec<f32>,
}

impl RasterGrid {
    /// Create a grid with every cell set to `nodata`.
    pub fn filled(width: usize, height: usize, nodata: f32) -> Self {
        Self {
            width,
            height,
            nodata,
            data: vec![nodata; width * height],
        }
    }

    /// Wrap an existing sample buffer.
    pub fn from_vec(width: usize, height: usize, nodata: f32, data: Vec<f32>) -> Result<Self> {
        if data.len() != width * height {
            return Err(RasterError::DimensionMismatch {
                width,
                height,
                found: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            nodata,
            data,
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// The no-data value.
    pub fn nodata(&self) -> f32 {
        self.nodata
    }

    /// All samples, row-major.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Mutable access to all samples, row-major.
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Consume the grid, returning its samples.
    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// One row of samples.
    pub fn row(&self, row: usize) -> &[f32] {
        &self.data[row * self.width..(row + 1) * self.width]
    }

    /// Sample at (col, row), or `None` outside the grid.
    pub fn get(&self, col: usize, row: usize) -> Option<f32> {
        if col >= self.width || row >= self.height {
            return None;
        }
        Some(self.data[row * self.width + col])
    }

    /// Set the sample at (col, row). Returns `false` outside the grid.
    pub fn set(&mut self, col: usize, row: usize, value: f32) -> bool {
        if col >= self.width || row >= self.height {
            return false;
        }
        self.data[row * self.width + col] = value;
        true
    }

    /// Check whether `value` is this grid's no-data value.
    #[inline]
    pub fn is_nodata_value(&self, value: f32) -> bool {
        is_nodata(value, self.nodata)
    }

    /// Number of no-data cells.
    pub fn nodata_count(&self) -> usize {
        self.data.iter().filter(|&&v| self.is_nodata_value(v)).count()
    }

    /// Number of cells holding a sample.
    pub fn valid_count(&self) -> usize {
        self.data.len() - self.nodata_count()
    }

    /// True if at least one cell is no-data.
    pub fn has_nodata(&self) -> bool {
        self.data.iter().any(|&v| self.is_nodata_value(v))
    }

    /// True if every cell is no-data.
    pub fn is_all_nodata(&self) -> bool {
        self.data.iter().all(|&v| self.is_nodata_value(v))
    }

    /// Minimum and maximum over valid cells.
    pub fn value_range(&self) -> Option<(f32, f32)> {
        self.data
            .iter()
            .copied()
            .filter(|&v| !self.is_nodata_value(v) && !v.is_nan())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}
