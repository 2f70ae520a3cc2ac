//! GeoTIFF output and read-back.
//!
//! Written files are single-band `Float32` TIFFs carrying the GeoTIFF tags
//! GDAL and rasterio use for north-up geographic rasters:
//! - ModelPixelScale (33550) and ModelTiepoint (33922) for the affine transform
//! - GeoKeyDirectory (34735) with a geographic model type and EPSG code
//! - GDAL_NODATA (42113) holding the no-data value as ASCII

use crate::{Crs, GeoBoundingBox, GeoTransform, RasterError, RasterGrid, Result};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
const TAG_MODEL_TIEPOINT: u16 = 33922;
const TAG_GEO_KEY_DIRECTORY: u16 = 34735;
const TAG_GDAL_NODATA: u16 = 42113;

const GEOKEY_MODEL_TYPE: u16 = 1024;
const GEOKEY_RASTER_TYPE: u16 = 1025;
const GEOKEY_GEOGRAPHIC_TYPE: u16 = 2048;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// Scalar type of the stored samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    /// 32-bit IEEE float.
    Float32,
}

/// Everything a writer needs to know about the raster besides its samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterProfile {
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// Number of bands.
    pub band_count: u16,
    /// Sample scalar type.
    pub sample_type: SampleType,
    /// Spatial reference.
    pub crs: Crs,
    /// Affine georeferencing.
    pub transform: GeoTransform,
    /// No-data value.
    pub nodata: f32,
}

impl RasterProfile {
    /// Single-band `Float32` profile matching `grid`.
    pub fn single_band_f32(grid: &RasterGrid, transform: GeoTransform, crs: Crs) -> Self {
        Self {
            width: grid.width(),
            height: grid.height(),
            band_count: 1,
            sample_type: SampleType::Float32,
            crs,
            transform,
            nodata: grid.nodata(),
        }
    }
}

/// Persists a raster grid.
pub trait RasterWriter: Send + Sync {
    /// Write `grid` to `path` as described by `profile`.
    fn write(&self, path: &Path, grid: &RasterGrid, profile: &RasterProfile) -> Result<()>;
}

/// Writes single-band `Float32` GeoTIFFs.
///
/// The file is encoded in memory, written to `<path>.partial` and renamed into
/// place, so a failed write never leaves a truncated raster at `path`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoTiffWriter;

impl RasterWriter for GeoTiffWriter {
    fn write(&self, path: &Path, grid: &RasterGrid, profile: &RasterProfile) -> Result<()> {
        if profile.width != grid.width() || profile.height != grid.height() {
            return Err(RasterError::DimensionMismatch {
                width: profile.width,
                height: profile.height,
                found: grid.data().len(),
            });
        }
        if profile.band_count != 1 {
            return Err(RasterError::UnsupportedProfile(format!(
                "{} bands (only single-band output is supported)",
                profile.band_count
            )));
        }
        if profile.width == 0 || profile.height == 0 {
            return Err(RasterError::EmptyGrid {
                width: profile.width,
                height: profile.height,
            });
        }

        let bytes = encode_geotiff(grid, profile)?;

        let partial = partial_path(path);
        if let Err(e) = fs::write(&partial, &bytes) {
            let _ = fs::remove_file(&partial);
            return Err(RasterError::io(&partial, e));
        }
        fs::rename(&partial, path).map_err(|e| {
            let _ = fs::remove_file(&partial);
            RasterError::io(path, e)
        })
    }
}

/// Sibling path used while a write is in progress.
fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

/// Encode the grid and its georeferencing as GeoTIFF bytes.
fn encode_geotiff(grid: &RasterGrid, profile: &RasterProfile) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut cursor)?;
        let mut image = encoder
            .new_image::<colortype::Gray32Float>(profile.width as u32, profile.height as u32)?;

        let t = &profile.transform;
        let scale = [t.pixel_width, -t.pixel_height, 0.0];
        let tiepoint = [0.0, 0.0, 0.0, t.origin_lon, t.origin_lat, 0.0];
        // Header (version 1.1.0, 3 keys) followed by (key, location, count, value) entries.
        let geokeys: [u16; 16] = [
            1,
            1,
            0,
            3,
            GEOKEY_MODEL_TYPE,
            0,
            1,
            MODEL_TYPE_GEOGRAPHIC,
            GEOKEY_RASTER_TYPE,
            0,
            1,
            RASTER_PIXEL_IS_AREA,
            GEOKEY_GEOGRAPHIC_TYPE,
            0,
            1,
            profile.crs.epsg(),
        ];
        let nodata = profile.nodata.to_string();

        let dir = image.encoder();
        dir.write_tag(Tag::Unknown(TAG_MODEL_PIXEL_SCALE), &scale[..])?;
        dir.write_tag(Tag::Unknown(TAG_MODEL_TIEPOINT), &tiepoint[..])?;
        dir.write_tag(Tag::Unknown(TAG_GEO_KEY_DIRECTORY), &geokeys[..])?;
        dir.write_tag(Tag::Unknown(TAG_GDAL_NODATA), nodata.as_str())?;

        image.write_data(grid.data())?;
    }
    Ok(cursor.into_inner())
}

/// A GeoTIFF loaded into memory.
#[derive(Debug)]
pub struct GeoTiffRaster {
    /// Samples and no-data value.
    grid: RasterGrid,
    /// Georeferencing from the tie point and pixel scale tags.
    transform: GeoTransform,
    /// Spatial reference from the GeoKey directory, if present.
    crs: Option<Crs>,
}

impl GeoTiffRaster {
    /// Load a georeferenced single-band TIFF.
    ///
    /// Rasters without a GDAL_NODATA tag use NaN as their no-data value.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = fs::File::open(path).map_err(|e| RasterError::io(path, e))?;
        // Full mosaics exceed the decoder's default buffer limits.
        let mut decoder = Decoder::new(file)?.with_limits(Limits::unlimited());

        let (width, height) = decoder.dimensions()?;
        let transform = Self::read_geotransform(&mut decoder)?;
        let nodata = Self::read_nodata_value(&mut decoder).unwrap_or(f32::NAN);
        let crs = Self::read_crs(&mut decoder);
        let data = Self::decode_samples(&mut decoder)?;

        let grid = RasterGrid::from_vec(width as usize, height as usize, nodata, data)?;
        Ok(Self {
            grid,
            transform,
            crs,
        })
    }

    /// Read the affine transform from ModelTiepoint and ModelPixelScale.
    fn read_geotransform<R: std::io::Read + std::io::Seek>(
        decoder: &mut Decoder<R>,
    ) -> Result<GeoTransform> {
        let tiepoint = decoder
            .get_tag_f64_vec(Tag::from_u16_exhaustive(TAG_MODEL_TIEPOINT))
            .map_err(|_| RasterError::InvalidGeoTiff("missing ModelTiepoint tag".to_string()))?;
        let scale = decoder
            .get_tag_f64_vec(Tag::from_u16_exhaustive(TAG_MODEL_PIXEL_SCALE))
            .map_err(|_| RasterError::InvalidGeoTiff("missing ModelPixelScale tag".to_string()))?;

        if tiepoint.len() < 6 || scale.len() < 2 {
            return Err(RasterError::InvalidGeoTiff(format!(
                "malformed tie point ({} values) or pixel scale ({} values)",
                tiepoint.len(),
                scale.len()
            )));
        }

        // Tiepoint format: [i, j, k, x, y, z] mapping pixel (i, j) to (x, y).
        let (i, j) = (tiepoint[0], tiepoint[1]);
        let origin_lon = tiepoint[3] - i * scale[0];
        let origin_lat = tiepoint[4] + j * scale[1];
        Ok(GeoTransform::new(origin_lon, origin_lat, scale[0], -scale[1]))
    }

    /// Try to read the no-data value from the GDAL_NODATA tag.
    fn read_nodata_value<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<f32> {
        decoder
            .get_tag_ascii_string(Tag::from_u16_exhaustive(TAG_GDAL_NODATA))
            .ok()
            .and_then(|s| s.trim_matches(char::from(0)).trim().parse().ok())
    }

    /// Find the geographic type key in the GeoKey directory.
    fn read_crs<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<Crs> {
        let keys = decoder
            .get_tag_u16_vec(Tag::from_u16_exhaustive(TAG_GEO_KEY_DIRECTORY))
            .ok()?;
        keys.get(4..)?
            .chunks_exact(4)
            .find(|entry| entry[0] == GEOKEY_GEOGRAPHIC_TYPE && entry[1] == 0)
            .map(|entry| Crs::from_epsg(entry[3]))
    }

    /// Decode the band. Only `Float32` rasters, as written by [`GeoTiffWriter`], are accepted.
    fn decode_samples<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Result<Vec<f32>> {
        match decoder.read_image()? {
            DecodingResult::F32(data) => Ok(data),
            other => Err(RasterError::InvalidGeoTiff(format!(
                "expected Float32 samples, found {}",
                sample_type_name(&other)
            ))),
        }
    }

    /// The samples.
    pub fn grid(&self) -> &RasterGrid {
        &self.grid
    }

    /// The affine transform.
    pub fn transform(&self) -> GeoTransform {
        self.transform
    }

    /// The spatial reference, if the file declares one.
    pub fn crs(&self) -> Option<Crs> {
        self.crs
    }

    /// Geographic extent of the raster.
    pub fn bounds(&self) -> Result<GeoBoundingBox> {
        self.transform.bounds(self.grid.width(), self.grid.height())
    }

    /// Sample of the pixel containing (lat, lon), or `None` outside the
    /// raster or on no-data.
    pub fn value_at(&self, lat: f64, lon: f64) -> Option<f32> {
        let (col, row) = self.transform.geo_to_pixel(lon, lat);
        if !(col >= 0.0 && row >= 0.0) {
            return None;
        }
        let value = self.grid.get(col.floor() as usize, row.floor() as usize)?;
        if self.grid.is_nodata_value(value) {
            return None;
        }
        Some(value)
    }
}

fn sample_type_name(result: &DecodingResult) -> &'static str {
    match result {
        DecodingResult::U8(_) => "UInt8",
        DecodingResult::U16(_) => "UInt16",
        DecodingResult::U32(_) => "UInt32",
        DecodingResult::U64(_) => "UInt64",
        DecodingResult::I8(_) => "Int8",
        DecodingResult::I16(_) => "Int16",
        DecodingResult::I32(_) => "Int32",
        DecodingResult::I64(_) => "Int64",
        DecodingResult::F32(_) => "Float32",
        DecodingResult::F64(_) => "Float64",
    }
}
