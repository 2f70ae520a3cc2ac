//! Error types for the raster crate.

use crate::Crs;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when building, resampling or persisting rasters.
#[derive(Debug, Error)]
pub enum RasterError {
    /// Bounding box edges are not finite or not ordered.
    #[error("Invalid bounding box: north={north} south={south} east={east} west={west} (need south < north and west < east)")]
    InvalidBounds {
        /// North edge in degrees.
        north: f64,
        /// South edge in degrees.
        south: f64,
        /// East edge in degrees.
        east: f64,
        /// West edge in degrees.
        west: f64,
    },

    /// Sample buffer length does not match the grid dimensions.
    #[error("Grid is {width}x{height} but {found} samples were supplied")]
    DimensionMismatch {
        /// Grid width in pixels.
        width: usize,
        /// Grid height in pixels.
        height: usize,
        /// Number of samples actually present.
        found: usize,
    },

    /// A grid with zero width or height was requested.
    #[error("Grid must have non-zero dimensions, got {width}x{height}")]
    EmptyGrid {
        /// Requested width.
        width: usize,
        /// Requested height.
        height: usize,
    },

    /// Resampling between different coordinate reference systems.
    #[error("Reprojection from {from} to {to} is not supported")]
    UnsupportedReprojection {
        /// Source CRS.
        from: Crs,
        /// Destination CRS.
        to: Crs,
    },

    /// Output profile requests something the writer cannot produce.
    #[error("Unsupported raster profile: {0}")]
    UnsupportedProfile(String),

    /// I/O error on a raster file.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// File being read or written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// TIFF encoding or decoding error.
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// GeoTIFF is missing georeferencing tags.
    #[error("Invalid GeoTIFF: {0}")]
    InvalidGeoTiff(String),
}

impl RasterError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RasterError::Io {
            path: path.into(),
            source,
        }
    }
}
