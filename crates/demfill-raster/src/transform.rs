//! Geographic bounds, coordinate reference systems and affine pixel transforms.

use crate::{RasterError, Result};
use std::fmt;

/// Coordinate reference system, identified by its EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Crs {
    epsg: u16,
}

impl Crs {
    /// Geographic WGS84 (EPSG:4326).
    pub const WGS84: Crs = Crs { epsg: 4326 };

    /// Create a CRS from an EPSG code.
    pub const fn from_epsg(epsg: u16) -> Self {
        Self { epsg }
    }

    /// Get the EPSG code.
    pub fn epsg(&self) -> u16 {
        self.epsg
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

/// Geographic bounding box in decimal degrees.
///
/// Always satisfies `south < north` and `west < east`; construction fails
/// otherwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBoundingBox {
    north: f64,
    south: f64,
    east: f64,
    west: f64,
}

impl GeoBoundingBox {
    /// Create a bounding box, validating edge ordering.
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Result<Self> {
        let finite = north.is_finite() && south.is_finite() && east.is_finite() && west.is_finite();
        if !finite || south >= north || west >= east {
            return Err(RasterError::InvalidBounds {
                north,
                south,
                east,
                west,
            });
        }
        Ok(Self {
            north,
            south,
            east,
            west,
        })
    }

    /// North edge (maximum latitude).
    pub fn north(&self) -> f64 {
        self.north
    }

    /// South edge (minimum latitude).
    pub fn south(&self) -> f64 {
        self.south
    }

    /// East edge (maximum longitude).
    pub fn east(&self) -> f64 {
        self.east
    }

    /// West edge (minimum longitude).
    pub fn west(&self) -> f64 {
        self.west
    }

    /// Check if a coordinate is within the bounds (edges inclusive).
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.south && lat <= self.north && lon >= self.west && lon <= self.east
    }

    /// Check if another box lies entirely within this one.
    pub fn covers(&self, other: &GeoBoundingBox) -> bool {
        other.north <= self.north
            && other.south >= self.south
            && other.east <= self.east
            && other.west >= self.west
    }
}

impl fmt::Display for GeoBoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "north={:.6} south={:.6} west={:.6} east={:.6}",
            self.north, self.south, self.west, self.east
        )
    }
}

/// Affine mapping from pixel (column, row) to (longitude, latitude).
///
/// `lon = origin_lon + col * pixel_width` and
/// `lat = origin_lat + row * pixel_height`, where the origin is the top-left
/// corner of pixel (0, 0) and `pixel_height` is negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    /// Longitude of the top-left corner.
    pub origin_lon: f64,
    /// Latitude of the top-left corner.
    pub origin_lat: f64,
    /// Degrees of longitude per pixel.
    pub pixel_width: f64,
    /// Degrees of latitude per pixel (negative, north-up).
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Create a transform from its four coefficients.
    pub fn new(origin_lon: f64, origin_lat: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_lon,
            origin_lat,
            pixel_width,
            pixel_height,
        }
    }

    /// Fit a `width` x `height` pixel grid exactly into `bounds`.
    ///
    /// Both dimensions must be non-zero.
    pub fn from_bounds(bounds: &GeoBoundingBox, width: usize, height: usize) -> Self {
        Self {
            origin_lon: bounds.west(),
            origin_lat: bounds.north(),
            pixel_width: (bounds.east() - bounds.west()) / width as f64,
            pixel_height: -(bounds.north() - bounds.south()) / height as f64,
        }
    }

    /// Map fractional pixel coordinates to (longitude, latitude).
    pub fn pixel_to_geo(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_lon + col * self.pixel_width,
            self.origin_lat + row * self.pixel_height,
        )
    }

    /// Geographic position of the centre of pixel (col, row).
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        self.pixel_to_geo(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Map (longitude, latitude) to fractional pixel coordinates (col, row).
    pub fn geo_to_pixel(&self, lon: f64, lat: f64) -> (f64, f64) {
        (
            (lon - self.origin_lon) / self.pixel_width,
            (lat - self.origin_lat) / self.pixel_height,
        )
    }

    /// Geographic extent covered by a `width` x `height` grid under this transform.
    pub fn bounds(&self, width: usize, height: usize) -> Result<GeoBoundingBox> {
        let (west, north) = self.pixel_to_geo(0.0, 0.0);
        let (east, south) = self.pixel_to_geo(width as f64, height as f64);
        GeoBoundingBox::new(north, south, east, west)
    }

    /// Coefficients in GDAL order `[origin_x, pixel_w, 0, origin_y, 0, pixel_h]`.
    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_lon,
            self.pixel_width,
            0.0,
            self.origin_lat,
            0.0,
            self.pixel_height,
        ]
    }
}
