//! Resampling a georeferenced grid onto another grid's pixel frame.
//!
//! Source and destination must share a coordinate reference system; the
//! mapping between them is then the composition of two affine transforms.
//! Samples are taken at destination pixel centres.

use crate::{Crs, GeoTransform, RasterError, RasterGrid, Result};
use rayon::prelude::*;

/// Accumulated weight below which a bilinear sample is treated as no-data.
const MIN_BILINEAR_WEIGHT: f64 = 1e-9;

/// Interpolation kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Kernel {
    /// Value of the source pixel containing the sample point.
    Nearest,
    /// Weighted mean of the four source pixel centres around the sample point.
    #[default]
    Bilinear,
}

/// Shape, georeferencing and no-data value of a destination grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridFrame {
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// Pixel-to-geographic transform.
    pub transform: GeoTransform,
    /// Coordinate reference system.
    pub crs: Crs,
    /// No-data value written where no sample can be produced.
    pub nodata: f32,
}

impl GridFrame {
    /// Frame matching an existing grid.
    pub fn of(grid: &RasterGrid, transform: GeoTransform, crs: Crs) -> Self {
        Self {
            width: grid.width(),
            height: grid.height(),
            transform,
            crs,
            nodata: grid.nodata(),
        }
    }
}

/// Resamples a source grid onto a destination frame.
///
/// Source no-data cells never contribute to a destination sample, and
/// destination cells that cannot be sampled hold the frame's no-data value.
pub trait Resampler: Send + Sync {
    /// Produce a new grid shaped like `dst` from `src`.
    fn resample(
        &self,
        src: &RasterGrid,
        src_transform: &GeoTransform,
        src_crs: Crs,
        dst: &GridFrame,
        kernel: Kernel,
    ) -> Result<RasterGrid>;
}

/// Affine-to-affine resampler for grids in the same CRS.
///
/// Bilinear sampling skips no-data and out-of-grid neighbours and renormalises
/// the remaining weights, so a valid value is produced as long as any of the
/// four neighbours is valid. Destination pixels whose centre lies outside the
/// source extent are no-data. Rows are processed in parallel.
#[derive(Debug, Clone, Copy, Default)]
pub struct WarpResampler;

impl Resampler for WarpResampler {
    fn resample(
        &self,
        src: &RasterGrid,
        src_transform: &GeoTransform,
        src_crs: Crs,
        dst: &GridFrame,
        kernel: Kernel,
    ) -> Result<RasterGrid> {
        if src_crs != dst.crs {
            return Err(RasterError::UnsupportedReprojection {
                from: src_crs,
                to: dst.crs,
            });
        }
        if dst.width == 0 || dst.height == 0 {
            return Err(RasterError::EmptyGrid {
                width: dst.width,
                height: dst.height,
            });
        }

        let mut out = RasterGrid::filled(dst.width, dst.height, dst.nodata);
        if src.width() == 0 || src.height() == 0 {
            return Ok(out);
        }

        out.data_mut()
            .par_chunks_mut(dst.width)
            .enumerate()
            .for_each(|(row, line)| {
                for (col, cell) in line.iter_mut().enumerate() {
                    let (lon, lat) = dst.transform.pixel_center(col, row);
                    let (sx, sy) = src_transform.geo_to_pixel(lon, lat);
                    let sample = match kernel {
                        Kernel::Nearest => sample_nearest(src, sx, sy),
                        Kernel::Bilinear => sample_bilinear(src, sx, sy),
                    };
                    if let Some(value) = sample {
                        *cell = value;
                    }
                }
            });

        Ok(out)
    }
}

/// Nearest-pixel sample at fractional pixel position (sx, sy).
fn sample_nearest(src: &RasterGrid, sx: f64, sy: f64) -> Option<f32> {
    // Also rejects NaN positions.
    if !(sx >= 0.0 && sy >= 0.0) {
        return None;
    }
    let value = src.get(sx.floor() as usize, sy.floor() as usize)?;
    if src.is_nodata_value(value) || value.is_nan() {
        return None;
    }
    Some(value)
}

/// Bilinear sample at fractional pixel position (sx, sy).
fn sample_bilinear(src: &RasterGrid, sx: f64, sy: f64) -> Option<f32> {
    let width = src.width() as f64;
    let height = src.height() as f64;
    if !(sx >= 0.0 && sx <= width && sy >= 0.0 && sy <= height) {
        return None;
    }

    // Shift to pixel-centre space.
    let cx = sx - 0.5;
    let cy = sy - 0.5;
    let x0 = cx.floor();
    let y0 = cy.floor();
    let fx = cx - x0;
    let fy = cy - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let taps = [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x0 + 1, y0, fx * (1.0 - fy)),
        (x0, y0 + 1, (1.0 - fx) * fy),
        (x0 + 1, y0 + 1, fx * fy),
    ];

    let mut sum = 0.0;
    let mut weight = 0.0;
    for (x, y, w) in taps {
        if w <= 0.0 || x < 0 || y < 0 {
            continue;
        }
        let Some(value) = src.get(x as usize, y as usize) else {
            continue;
        };
        if src.is_nodata_value(value) || value.is_nan() {
            continue;
        }
        sum += value as f64 * w;
        weight += w;
    }

    if weight < MIN_BILINEAR_WEIGHT {
        return None;
    }
    Some((sum / weight) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GeoBoundingBox;
    use approx::assert_relative_eq;

    const NODATA: f32 = -9999.0;

    fn frame(bounds: &GeoBoundingBox, width: usize, height: usize) -> GridFrame {
        GridFrame {
            width,
            height,
            transform: GeoTransform::from_bounds(bounds, width, height),
            crs: Crs::WGS84,
            nodata: NODATA,
        }
    }

    #[test]
    fn test_identity_resample_preserves_values() {
        let bounds = GeoBoundingBox::new(1.0, 0.0, 1.0, 0.0).unwrap();
        let data: Vec<f32> = (0..16).map(|v| v as f32).collect();
        let src = RasterGrid::from_vec(4, 4, NODATA, data.clone()).unwrap();
        let dst = frame(&bounds, 4, 4);

        for kernel in [Kernel::Nearest, Kernel::Bilinear] {
            let out = WarpResampler
                .resample(&src, &dst.transform, Crs::WGS84, &dst, kernel)
                .unwrap();
            for (a, b) in out.data().iter().zip(&data) {
                assert_relative_eq!(*a, *b, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn test_bilinear_upsample_interpolates() {
        // 2x2 source onto a 4x4 destination covering the same extent.
        let bounds = GeoBoundingBox::new(1.0, 0.0, 1.0, 0.0).unwrap();
        let src = RasterGrid::from_vec(2, 2, NODATA, vec![0.0, 4.0, 8.0, 12.0]).unwrap();
        let src_transform = GeoTransform::from_bounds(&bounds, 2, 2);
        let dst = frame(&bounds, 4, 4);

        let out = WarpResampler
            .resample(&src, &src_transform, Crs::WGS84, &dst, Kernel::Bilinear)
            .unwrap();

        // Destination pixel (1, 1) centre sits a quarter pixel from source pixel (0, 0)'s centre.
        assert_relative_eq!(out.get(1, 1).unwrap(), 3.0, epsilon = 1e-4);
        // Corner pixels sit beyond the outer source centres and clamp to them.
        assert_relative_eq!(out.get(0, 0).unwrap(), 0.0, epsilon = 1e-4);
        assert_relative_eq!(out.get(3, 3).unwrap(), 12.0, epsilon = 1e-4);
        assert_eq!(out.nodata_count(), 0);
    }

    #[test]
    fn test_bilinear_skips_nodata_neighbours() {
        let bounds = GeoBoundingBox::new(1.0, 0.0, 1.0, 0.0).unwrap();
        let src = RasterGrid::from_vec(2, 2, NODATA, vec![10.0, NODATA, 10.0, NODATA]).unwrap();
        let src_transform = GeoTransform::from_bounds(&bounds, 2, 2);
        let dst = frame(&bounds, 4, 4);

        let out = WarpResampler
            .resample(&src, &src_transform, Crs::WGS84, &dst, Kernel::Bilinear)
            .unwrap();

        // Right half only has no-data neighbours on its own side of the centre line,
        // but every destination pixel still sees a valid left column.
        assert_relative_eq!(out.get(2, 1).unwrap(), 10.0, epsilon = 1e-4);
        // The outermost column only touches the no-data column.
        assert!(out.is_nodata_value(out.get(3, 1).unwrap()));
        // No-data never leaks into a valid value.
        assert!(out.data().iter().all(|&v| v == 10.0 || v == NODATA));
    }

    #[test]
    fn test_outside_source_extent_is_nodata() {
        let src_bounds = GeoBoundingBox::new(1.0, 0.0, 1.0, 0.0).unwrap();
        let dst_bounds = GeoBoundingBox::new(1.0, 0.0, 2.0, 0.0).unwrap();
        let src = RasterGrid::from_vec(1, 1, NODATA, vec![7.0]).unwrap();
        let src_transform = GeoTransform::from_bounds(&src_bounds, 1, 1);
        let dst = frame(&dst_bounds, 2, 1);

        let out = WarpResampler
            .resample(&src, &src_transform, Crs::WGS84, &dst, Kernel::Bilinear)
            .unwrap();
        assert_relative_eq!(out.get(0, 0).unwrap(), 7.0);
        assert_eq!(out.get(1, 0), Some(NODATA));
    }

    #[test]
    fn test_nearest_respects_nodata() {
        let bounds = GeoBoundingBox::new(1.0, 0.0, 1.0, 0.0).unwrap();
        let src = RasterGrid::from_vec(2, 1, NODATA, vec![NODATA, 5.0]).unwrap();
        let src_transform = GeoTransform::from_bounds(&bounds, 2, 1);
        let dst = frame(&bounds, 4, 1);

        let out = WarpResampler
            .resample(&src, &src_transform, Crs::WGS84, &dst, Kernel::Nearest)
            .unwrap();
        assert_eq!(out.data(), &[NODATA, NODATA, 5.0, 5.0]);
    }

    #[test]
    fn test_crs_mismatch_is_rejected() {
        let bounds = GeoBoundingBox::new(1.0, 0.0, 1.0, 0.0).unwrap();
        let src = RasterGrid::filled(2, 2, NODATA);
        let dst = frame(&bounds, 2, 2);
        let err = WarpResampler
            .resample(&src, &dst.transform, Crs::from_epsg(3857), &dst, Kernel::Bilinear)
            .unwrap_err();
        assert!(matches!(err, RasterError::UnsupportedReprojection { .. }));
    }
}
