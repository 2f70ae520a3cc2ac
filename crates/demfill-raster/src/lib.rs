//! # demfill-raster
//!
//! Raster primitives shared by the demfill tile pipeline.
//!
//! This crate provides:
//! - [`GeoBoundingBox`] and [`GeoTransform`] - geographic bounds and the affine
//!   mapping between pixel row/column and longitude/latitude
//! - [`RasterGrid`] - a single-band `f32` grid with an explicit no-data value
//! - [`Resampler`] - resampling of one georeferenced grid onto another grid's
//!   pixel frame, implemented by [`WarpResampler`]
//! - [`RasterWriter`] - persisting a grid, implemented by [`GeoTiffWriter`]
//! - [`GeoTiffRaster`] - reading a written GeoTIFF back into memory
//!
//! ## Conventions
//!
//! Grids are stored row-major, north to south, west to east. A transform's
//! origin is the top-left corner of pixel (0, 0) and its pixel height is
//! negative, so row numbers grow southward.
//!
//! ## Example
//!
//! ```no_run
//! use demfill_raster::{
//!     Crs, GeoBoundingBox, GeoTiffWriter, GeoTransform, RasterGrid, RasterProfile, RasterWriter,
//! };
//!
//! let bounds = GeoBoundingBox::new(42.5, 42.0, 143.5, 143.0)?;
//! let grid = RasterGrid::filled(256, 256, -9999.0);
//! let transform = GeoTransform::from_bounds(&bounds, grid.width(), grid.height());
//!
//! let profile = RasterProfile::single_band_f32(&grid, transform, Crs::WGS84);
//! GeoTiffWriter.write("dem.tif".as_ref(), &grid, &profile)?;
//! # Ok::<(), demfill_raster::RasterError>(())
//! ```

mod error;
mod geotiff;
mod grid;
mod resample;
mod transform;

pub use error::RasterError;
pub use geotiff::{GeoTiffRaster, GeoTiffWriter, RasterProfile, RasterWriter, SampleType};
pub use grid::{is_nodata, RasterGrid};
pub use resample::{GridFrame, Kernel, Resampler, WarpResampler};
pub use transform::{Crs, GeoBoundingBox, GeoTransform};

/// Result type for raster operations.
pub type Result<T> = std::result::Result<T, RasterError>;
