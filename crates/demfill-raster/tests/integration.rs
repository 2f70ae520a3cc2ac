//! Integration tests for resampling and GeoTIFF output.

use approx::assert_relative_eq;
use demfill_raster::{
    Crs, GeoBoundingBox, GeoTiffRaster, GeoTiffWriter, GeoTransform, GridFrame, Kernel,
    RasterGrid, RasterProfile, RasterWriter, Resampler, WarpResampler,
};

const NODATA: f32 = -9999.0;

#[test]
fn test_coarse_grid_resampled_onto_fine_frame_and_written() {
    // Coarse 4x4 grid over a box, fine 16x16 frame over an inner box.
    let outer = GeoBoundingBox::new(42.4, 42.0, 143.2, 142.8).unwrap();
    let inner = GeoBoundingBox::new(42.3, 42.1, 143.1, 142.9).unwrap();
    let coarse = RasterGrid::from_vec(4, 4, NODATA, (0..16).map(|v| v as f32 * 10.0).collect()).unwrap();
    let coarse_transform = GeoTransform::from_bounds(&outer, 4, 4);

    let fine = RasterGrid::filled(16, 16, NODATA);
    let fine_transform = GeoTransform::from_bounds(&inner, 16, 16);
    let frame = GridFrame::of(&fine, fine_transform, Crs::WGS84);

    let resampled = WarpResampler
        .resample(&coarse, &coarse_transform, Crs::WGS84, &frame, Kernel::Bilinear)
        .unwrap();
    assert_eq!(resampled.nodata_count(), 0);
    let (lo, hi) = resampled.value_range().unwrap();
    assert!(lo >= 0.0 && hi <= 150.0);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("resampled.tif");
    let profile = RasterProfile::single_band_f32(&resampled, fine_transform, Crs::WGS84);
    GeoTiffWriter.write(&path, &resampled, &profile).unwrap();

    let raster = GeoTiffRaster::from_file(&path).unwrap();
    assert_eq!(raster.grid(), &resampled);
    let bounds = raster.bounds().unwrap();
    assert_relative_eq!(bounds.north(), 42.3, epsilon = 1e-9);
    assert_relative_eq!(bounds.west(), 142.9, epsilon = 1e-9);
    assert_relative_eq!(bounds.south(), 42.1, epsilon = 1e-9);
    assert_relative_eq!(bounds.east(), 143.1, epsilon = 1e-9);
}

#[test]
fn test_nan_nodata_survives_write() {
    let bounds = GeoBoundingBox::new(1.0, 0.0, 1.0, 0.0).unwrap();
    let grid = RasterGrid::from_vec(2, 2, f32::NAN, vec![1.0, f32::NAN, 3.0, 4.0]).unwrap();
    let transform = GeoTransform::from_bounds(&bounds, 2, 2);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nan.tif");
    GeoTiffWriter
        .write(&path, &grid, &RasterProfile::single_band_f32(&grid, transform, Crs::WGS84))
        .unwrap();

    let raster = GeoTiffRaster::from_file(&path).unwrap();
    assert!(raster.grid().nodata().is_nan());
    assert_eq!(raster.grid().nodata_count(), 1);
    assert_eq!(raster.value_at(0.75, 0.75), None);
    assert_eq!(raster.value_at(0.25, 0.25), Some(3.0));
}

#[test]
fn test_failed_write_leaves_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("out.tif");
    let grid = RasterGrid::filled(2, 2, NODATA);
    let bounds = GeoBoundingBox::new(1.0, 0.0, 1.0, 0.0).unwrap();
    let profile = RasterProfile::single_band_f32(&grid, GeoTransform::from_bounds(&bounds, 2, 2), Crs::WGS84);

    assert!(GeoTiffWriter.write(&path, &grid, &profile).is_err());
    assert!(!path.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
