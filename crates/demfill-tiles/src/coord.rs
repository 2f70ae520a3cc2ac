//! Slippy-map tile coordinates.
//!
//! Tiles use the OpenStreetMap naming convention on the spherical Web
//! Mercator pyramid:
//! - `zoom` selects a `2^zoom` x `2^zoom` grid of tiles
//! - `x` is the column (0 at 180°W, increasing eastward)
//! - `y` is the row (0 at ~85.05°N, increasing southward)
//!
//! Every tile is [`TILE_SIZE`] x [`TILE_SIZE`] samples. A [`TileIndexRange`]
//! is the inclusive block of tiles covering a bounding box, and maps onto a
//! single mosaic raster whose geographic extent is the union of the tile
//! footprints.

use crate::{DemError, Result};
use demfill_raster::{GeoBoundingBox, GeoTransform};
use std::f64::consts::PI;
use std::fmt;

/// Samples per tile edge.
pub const TILE_SIZE: usize = 256;

/// Maximum supported zoom level.
pub const MAX_ZOOM: u8 = 24;

/// Largest mosaic, in pixels, a single range may cover (4 GiB of `f32`).
pub const MAX_MOSAIC_PIXELS: u64 = 1 << 30;

/// Number of tiles along one axis at `zoom`.
fn tiles_per_axis(zoom: u8) -> u64 {
    1u64 << zoom
}

fn check_zoom(zoom: u8) -> Result<()> {
    if zoom > MAX_ZOOM {
        return Err(DemError::InvalidZoomLevel(zoom));
    }
    Ok(())
}

/// Latitude and longitude of the north-west corner of tile (x, y).
///
/// Also accepts `x` or `y` equal to `2^zoom`, giving the south or east edge
/// of the last tile.
///
/// - lon = x / 2^z * 360 - 180
/// - lat = atan(sinh(π * (1 - 2y / 2^z)))
pub fn tile_corner(x: u32, y: u32, zoom: u8) -> (f64, f64) {
    let n = tiles_per_axis(zoom) as f64;
    let lon = x as f64 / n * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y as f64 / n)).sinh().atan().to_degrees();
    (lat, lon)
}

/// A single tile in the pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileIndex {
    /// Zoom level.
    pub zoom: u8,
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
}

impl TileIndex {
    /// Create a tile index, checking it exists at `zoom`.
    pub fn new(zoom: u8, x: u32, y: u32) -> Result<Self> {
        check_zoom(zoom)?;
        let n = tiles_per_axis(zoom);
        if u64::from(x) >= n || u64::from(y) >= n {
            return Err(DemError::TileOutOfRange { zoom, x, y });
        }
        Ok(Self { zoom, x, y })
    }

    /// Tile containing a geographic coordinate.
    ///
    /// - x = floor((lon + 180) / 360 * 2^z)
    /// - y = floor((1 - ln(tan(lat) + sec(lat)) / π) / 2 * 2^z)
    ///
    /// Both are clamped into `[0, 2^z - 1]`, so latitudes beyond the Mercator
    /// limit map to the first or last row and lon = 180 maps to the last
    /// column. Latitudes of ±90 and beyond, and non-finite input, are rejected.
    pub fn from_lat_lon(lat: f64, lon: f64, zoom: u8) -> Result<Self> {
        check_zoom(zoom)?;
        let lat_ok = lat.is_finite() && lat > -90.0 && lat < 90.0;
        let lon_ok = lon.is_finite() && (-180.0..=180.0).contains(&lon);
        if !lat_ok || !lon_ok {
            return Err(DemError::InvalidCoordinate { lat, lon });
        }

        let n = tiles_per_axis(zoom) as f64;
        let lat_rad = lat.to_radians();
        let fx = ((lon + 180.0) / 360.0 * n).floor();
        let fy = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n).floor();

        let max = n - 1.0;
        Ok(Self {
            zoom,
            x: fx.clamp(0.0, max) as u32,
            y: fy.clamp(0.0, max) as u32,
        })
    }

    /// Latitude and longitude of this tile's north-west corner.
    pub fn top_left(&self) -> (f64, f64) {
        tile_corner(self.x, self.y, self.zoom)
    }

    /// Geographic footprint of this tile.
    pub fn bounds(&self) -> Result<GeoBoundingBox> {
        let (north, west) = self.top_left();
        let (south, east) = tile_corner(self.x + 1, self.y + 1, self.zoom);
        Ok(GeoBoundingBox::new(north, south, east, west)?)
    }
}

impl fmt::Display for TileIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Inclusive rectangular block of tiles at one zoom level.
///
/// Invariant: `x0 <= x1`, `y0 <= y1`, and both ends exist at `zoom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileIndexRange {
    zoom: u8,
    x0: u32,
    x1: u32,
    y0: u32,
    y1: u32,
}

impl TileIndexRange {
    /// Create a range from its inclusive corners.
    pub fn new(zoom: u8, x0: u32, x1: u32, y0: u32, y1: u32) -> Result<Self> {
        check_zoom(zoom)?;
        if x0 > x1 || y0 > y1 {
            return Err(DemError::EmptyTileRange { x0, x1, y0, y1 });
        }
        TileIndex::new(zoom, x1, y1)?;
        Ok(Self {
            zoom,
            x0,
            x1,
            y0,
            y1,
        })
    }

    /// Smallest range whose tiles cover `bbox` at `zoom`.
    pub fn from_bbox(bbox: &GeoBoundingBox, zoom: u8) -> Result<Self> {
        let nw = TileIndex::from_lat_lon(bbox.north(), bbox.west(), zoom)?;
        let se = TileIndex::from_lat_lon(bbox.south(), bbox.east(), zoom)?;
        Self::new(
            zoom,
            nw.x.min(se.x),
            nw.x.max(se.x),
            nw.y.min(se.y),
            nw.y.max(se.y),
        )
    }

    /// Zoom level.
    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    /// First column.
    pub fn x0(&self) -> u32 {
        self.x0
    }

    /// Last column (inclusive).
    pub fn x1(&self) -> u32 {
        self.x1
    }

    /// First row.
    pub fn y0(&self) -> u32 {
        self.y0
    }

    /// Last row (inclusive).
    pub fn y1(&self) -> u32 {
        self.y1
    }

    /// Number of tile columns.
    pub fn cols(&self) -> usize {
        (self.x1 - self.x0) as usize + 1
    }

    /// Number of tile rows.
    pub fn rows(&self) -> usize {
        (self.y1 - self.y0) as usize + 1
    }

    /// Number of tiles in the range.
    pub fn tile_count(&self) -> usize {
        self.cols() * self.rows()
    }

    /// Mosaic width in pixels.
    pub fn pixel_width(&self) -> usize {
        self.cols() * TILE_SIZE
    }

    /// Mosaic height in pixels.
    pub fn pixel_height(&self) -> usize {
        self.rows() * TILE_SIZE
    }

    /// Fail with [`DemError::RangeTooLarge`] if the mosaic would exceed
    /// [`MAX_MOSAIC_PIXELS`].
    pub fn check_size(&self) -> Result<()> {
        let width = self.cols() as u64 * TILE_SIZE as u64;
        let height = self.rows() as u64 * TILE_SIZE as u64;
        match width.checked_mul(height) {
            Some(pixels) if pixels <= MAX_MOSAIC_PIXELS => Ok(()),
            _ => Err(DemError::RangeTooLarge {
                range: self.to_string(),
                width,
                height,
            }),
        }
    }

    /// Check whether a tile belongs to the range.
    pub fn contains(&self, tile: &TileIndex) -> bool {
        tile.zoom == self.zoom
            && (self.x0..=self.x1).contains(&tile.x)
            && (self.y0..=self.y1).contains(&tile.y)
    }

    /// All tiles in row-major order (north to south, west to east).
    pub fn tiles(&self) -> impl Iterator<Item = TileIndex> {
        let Self {
            zoom,
            x0,
            x1,
            y0,
            y1,
        } = *self;
        (y0..=y1).flat_map(move |y| (x0..=x1).map(move |x| TileIndex { zoom, x, y }))
    }

    /// Pixel offset `(row, col)` of a tile's top-left sample in the mosaic.
    pub fn pixel_offset(&self, tile: &TileIndex) -> Option<(usize, usize)> {
        if !self.contains(tile) {
            return None;
        }
        Some((
            (tile.y - self.y0) as usize * TILE_SIZE,
            (tile.x - self.x0) as usize * TILE_SIZE,
        ))
    }

    /// Tile-aligned extent: the north-west corner of the first tile to the
    /// south-east corner of the last.
    pub fn bounds(&self) -> Result<GeoBoundingBox> {
        let (north, west) = tile_corner(self.x0, self.y0, self.zoom);
        let (south, east) = tile_corner(self.x1 + 1, self.y1 + 1, self.zoom);
        Ok(GeoBoundingBox::new(north, south, east, west)?)
    }

    /// Affine transform mapping mosaic pixels onto [`bounds`](Self::bounds).
    ///
    /// Latitude is linear in pixel rows, matching how the mosaic is
    /// georeferenced even though the tiles are Mercator.
    pub fn geo_transform(&self) -> Result<GeoTransform> {
        Ok(GeoTransform::from_bounds(
            &self.bounds()?,
            self.pixel_width(),
            self.pixel_height(),
        ))
    }
}

impl fmt::Display for TileIndexRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "z{} x {}..={} y {}..={}",
            self.zoom, self.x0, self.x1, self.y0, self.y1
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_tile_index_from_lat_lon() {
        // Tokyo Station at zoom 15
        let tile = TileIndex::from_lat_lon(35.6812, 139.7671, 15).unwrap();
        assert_eq!(tile, TileIndex { zoom: 15, x: 29105, y: 12903 });
    }

    #[test]
    fn test_tile_index_equator() {
        let tile = TileIndex::from_lat_lon(0.0, 0.0, 12).unwrap();
        assert_eq!(tile.x, 2048);
        assert_eq!(tile.y, 2048);
    }

    #[test]
    fn test_tile_index_clamps_edges() {
        let east = TileIndex::from_lat_lon(0.0, 180.0, 4).unwrap();
        assert_eq!(east.x, 15);

        // Beyond the Mercator limit but still a valid latitude
        let north = TileIndex::from_lat_lon(89.9, 0.0, 4).unwrap();
        assert_eq!(north.y, 0);
        let south = TileIndex::from_lat_lon(-89.9, 0.0, 4).unwrap();
        assert_eq!(south.y, 15);
    }

    #[test]
    fn test_invalid_coordinates() {
        assert!(matches!(
            TileIndex::from_lat_lon(90.0, 0.0, 10),
            Err(DemError::InvalidCoordinate { .. })
        ));
        assert!(TileIndex::from_lat_lon(-90.0, 0.0, 10).is_err());
        assert!(TileIndex::from_lat_lon(f64::NAN, 0.0, 10).is_err());
        assert!(TileIndex::from_lat_lon(0.0, 180.5, 10).is_err());
    }

    #[test]
    fn test_invalid_zoom() {
        assert!(matches!(
            TileIndex::from_lat_lon(0.0, 0.0, 25),
            Err(DemError::InvalidZoomLevel(25))
        ));
        assert!(TileIndex::new(2, 4, 0).is_err());
        assert!(TileIndex::new(2, 3, 3).is_ok());
    }

    #[test]
    fn test_tile_corner() {
        let (lat, lon) = tile_corner(0, 0, 0);
        assert_relative_eq!(lat, 85.0511287798, epsilon = 1e-9);
        assert_relative_eq!(lon, -180.0);

        let (lat, lon) = tile_corner(1, 1, 0);
        assert_relative_eq!(lat, -85.0511287798, epsilon = 1e-9);
        assert_relative_eq!(lon, 180.0);
    }

    #[test]
    fn test_tile_contains_its_points() {
        for (lat, lon) in [(42.33, 142.96), (-33.86, 151.21), (0.001, -0.001)] {
            for zoom in [0, 8, 14, 15, 20] {
                let tile = TileIndex::from_lat_lon(lat, lon, zoom).unwrap();
                let bounds = tile.bounds().unwrap();
                assert!(bounds.contains(lat, lon), "{tile} should contain ({lat}, {lon})");
            }
        }
    }

    #[test]
    fn test_range_from_bbox() {
        let bbox = GeoBoundingBox::new(42.33, 42.19, 143.07, 142.96).unwrap();

        let range = TileIndexRange::from_bbox(&bbox, 15).unwrap();
        assert_eq!((range.x0(), range.x1()), (29396, 29406));
        assert_eq!((range.y0(), range.y1()), (12123, 12140));
        assert_eq!(range.cols(), 11);
        assert_eq!(range.rows(), 18);
        assert_eq!(range.tile_count(), 198);
        assert_eq!(range.pixel_width(), 2816);
        assert_eq!(range.pixel_height(), 4608);

        let coarse = TileIndexRange::from_bbox(&bbox, 14).unwrap();
        assert_eq!((coarse.x0(), coarse.x1()), (14698, 14703));
        assert_eq!((coarse.y0(), coarse.y1()), (6061, 6070));
    }

    #[test]
    fn test_range_bounds_cover_bbox() {
        let bbox = GeoBoundingBox::new(42.33, 42.19, 143.07, 142.96).unwrap();
        let range = TileIndexRange::from_bbox(&bbox, 15).unwrap();
        let bounds = range.bounds().unwrap();

        assert!(bounds.covers(&bbox));
        assert_relative_eq!(bounds.north(), 42.334184385939, epsilon = 1e-9);
        assert_relative_eq!(bounds.west(), 142.9541015625, epsilon = 1e-9);
        assert_relative_eq!(bounds.south(), 42.187829010591, epsilon = 1e-9);
        assert_relative_eq!(bounds.east(), 143.074951171875, epsilon = 1e-9);

        let transform = range.geo_transform().unwrap();
        assert_eq!(transform.origin_lon, bounds.west());
        assert_eq!(transform.origin_lat, bounds.north());
        assert!(transform.pixel_height < 0.0);
    }

    #[test]
    fn test_range_iteration_and_offsets() {
        let range = TileIndexRange::new(10, 5, 6, 20, 22).unwrap();
        let tiles: Vec<_> = range.tiles().collect();
        assert_eq!(tiles.len(), 6);
        assert_eq!(tiles[0], TileIndex { zoom: 10, x: 5, y: 20 });
        assert_eq!(tiles[1], TileIndex { zoom: 10, x: 6, y: 20 });
        assert_eq!(tiles[5], TileIndex { zoom: 10, x: 6, y: 22 });

        assert_eq!(range.pixel_offset(&tiles[5]), Some((512, 256)));
        assert_eq!(range.pixel_offset(&TileIndex { zoom: 10, x: 7, y: 20 }), None);
        assert_eq!(range.pixel_offset(&TileIndex { zoom: 11, x: 5, y: 20 }), None);
    }

    #[test]
    fn test_range_rejects_inverted_corners() {
        assert!(matches!(
            TileIndexRange::new(10, 6, 5, 0, 0),
            Err(DemError::EmptyTileRange { .. })
        ));
        assert!(matches!(
            TileIndexRange::new(1, 0, 2, 0, 0),
            Err(DemError::TileOutOfRange { .. })
        ));
    }

    #[test]
    fn test_range_size_cap() {
        let last = (1u32 << MAX_ZOOM) - 1;
        let world = TileIndexRange::new(MAX_ZOOM, 0, last, 0, last).unwrap();
        assert!(matches!(world.check_size(), Err(DemError::RangeTooLarge { .. })));
        assert!(world.check_size().unwrap_err().is_configuration());

        // 128 x 128 tiles is exactly the cap
        let at_cap = TileIndexRange::new(15, 0, 127, 0, 127).unwrap();
        assert!(at_cap.check_size().is_ok());
        let over = TileIndexRange::new(15, 0, 128, 0, 127).unwrap();
        assert!(over.check_size().is_err());

        let bbox = GeoBoundingBox::new(42.33, 42.19, 143.07, 142.96).unwrap();
        assert!(TileIndexRange::from_bbox(&bbox, 15).unwrap().check_size().is_ok());
    }
}
