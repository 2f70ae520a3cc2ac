//! Two-level gap fill.
//!
//! A primary mosaic is assembled at a fine zoom. If it still has no-data
//! cells and a fallback layer is configured, a secondary mosaic covering the
//! primary's tile-aligned extent is assembled at the coarser zoom, resampled
//! bilinearly onto the primary grid, and used to fill the gaps. Primary
//! samples are never overwritten.
//!
//! ```text
//! PrimaryAssembled -> GapCheck -+-> Done                      (no gaps / no fallback)
//!                               +-> SecondaryAssembled -+-> ResampledAndMerged -> Done
//!                                                       +-> Done   (secondary empty)
//! ```

use crate::coord::{TileIndexRange, MAX_ZOOM};
use crate::mosaic::{Mosaic, MosaicAssembler, MosaicStats};
use crate::source::{SourceList, GSI_DEM10_ZOOM, GSI_DEM5_ZOOM};
use crate::{DemError, Result};
use demfill_raster::{
    is_nodata, Crs, GeoBoundingBox, GeoTransform, GridFrame, Kernel, RasterError, RasterGrid,
    Resampler, WarpResampler,
};
use std::fmt;
use tracing::{info, warn};

/// Zoom level and sources of one mosaic layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MosaicLayer {
    /// Zoom level.
    pub zoom: u8,
    /// Sources in priority order.
    pub sources: SourceList,
}

impl MosaicLayer {
    /// Create a layer.
    pub fn new(zoom: u8, sources: SourceList) -> Self {
        Self { zoom, sources }
    }

    /// GSI DEM5A then DEM5B at zoom 15.
    pub fn gsi_dem5() -> Self {
        Self::new(GSI_DEM5_ZOOM, SourceList::gsi_dem5())
    }

    /// GSI DEM10B at zoom 14.
    pub fn gsi_dem10() -> Self {
        Self::new(GSI_DEM10_ZOOM, SourceList::gsi_dem10())
    }
}

/// What to fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FillRequest {
    /// Area of interest.
    pub bbox: GeoBoundingBox,
    /// Fine layer defining the output grid.
    pub primary: MosaicLayer,
    /// Coarse layer used to fill gaps. `None` disables filling.
    pub fallback: Option<MosaicLayer>,
}

impl FillRequest {
    /// GSI 5 m primary with 10 m fallback.
    pub fn gsi(bbox: GeoBoundingBox) -> Self {
        Self {
            bbox,
            primary: MosaicLayer::gsi_dem5(),
            fallback: Some(MosaicLayer::gsi_dem10()),
        }
    }

    /// Check zoom levels and compute the primary tile range without touching the network.
    ///
    /// The fallback zoom must be lower than the primary zoom, and the primary
    /// mosaic must fit within [`MAX_MOSAIC_PIXELS`](crate::coord::MAX_MOSAIC_PIXELS).
    pub fn primary_range(&self) -> Result<TileIndexRange> {
        if let Some(fallback) = &self.fallback {
            if fallback.zoom > MAX_ZOOM {
                return Err(DemError::InvalidZoomLevel(fallback.zoom));
            }
            if self.primary.zoom <= MAX_ZOOM && fallback.zoom >= self.primary.zoom {
                return Err(DemError::FallbackNotCoarser {
                    primary: self.primary.zoom,
                    fallback: fallback.zoom,
                });
            }
        }
        let range = TileIndexRange::from_bbox(&self.bbox, self.primary.zoom)?;
        range.check_size()?;
        Ok(range)
    }
}

/// Stages of a fill run, in the order they are passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FillStage {
    /// Primary mosaic built.
    PrimaryAssembled,
    /// Primary no-data cells counted.
    GapCheck,
    /// Secondary mosaic built.
    SecondaryAssembled,
    /// Secondary resampled and merged into the primary.
    ResampledAndMerged,
    /// Finished.
    Done,
}

impl fmt::Display for FillStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FillStage::PrimaryAssembled => "primary-assembled",
            FillStage::GapCheck => "gap-check",
            FillStage::SecondaryAssembled => "secondary-assembled",
            FillStage::ResampledAndMerged => "resampled-and-merged",
            FillStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Summary of one assembled layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerReport {
    /// Tiles covered.
    pub range: TileIndexRange,
    /// Tile-aligned extent.
    pub bounds: GeoBoundingBox,
    /// Tile accounting.
    pub stats: MosaicStats,
    /// No-data cells in the assembled mosaic.
    pub nodata_cells: usize,
}

impl LayerReport {
    fn of(mosaic: &Mosaic) -> Result<Self> {
        Ok(Self {
            range: mosaic.range,
            bounds: mosaic.bounds()?,
            stats: mosaic.stats.clone(),
            nodata_cells: mosaic.grid.nodata_count(),
        })
    }
}

/// Result of a fill run.
#[derive(Debug, Clone)]
pub struct FillOutcome {
    /// Final grid, shaped and georeferenced like the primary mosaic.
    pub grid: RasterGrid,
    /// Pixel-to-geographic transform of `grid`.
    pub transform: GeoTransform,
    /// Primary layer summary.
    pub primary: LayerReport,
    /// Secondary layer summary, if one was assembled.
    pub secondary: Option<LayerReport>,
    /// Cells filled from the secondary.
    pub filled_cells: usize,
    /// No-data cells left after filling.
    pub remaining_gaps: usize,
    /// Stages passed.
    pub stages: Vec<FillStage>,
}

impl FillOutcome {
    /// Tile-aligned extent of the output.
    pub fn bounds(&self) -> GeoBoundingBox {
        self.primary.bounds
    }
}

/// Overwrite no-data cells of `primary` with valid cells of `secondary`.
///
/// Both grids must have the same shape. Returns the number of cells filled.
pub fn merge_fill(primary: &mut RasterGrid, secondary: &RasterGrid) -> Result<usize> {
    if primary.width() != secondary.width() || primary.height() != secondary.height() {
        return Err(RasterError::DimensionMismatch {
            width: primary.width(),
            height: primary.height(),
            found: secondary.data().len(),
        }
        .into());
    }

    let nodata = primary.nodata();
    let secondary_nodata = secondary.nodata();
    let mut filled = 0;
    for (dest, &value) in primary.data_mut().iter_mut().zip(secondary.data()) {
        if is_nodata(*dest, nodata) && !value.is_nan() && !is_nodata(value, secondary_nodata) {
            *dest = value;
            filled += 1;
        }
    }
    Ok(filled)
}

/// Runs the two-level fill pipeline.
pub struct GapFiller<R = WarpResampler> {
    assembler: MosaicAssembler,
    resampler: R,
}

impl GapFiller<WarpResampler> {
    /// Create a filler using bilinear affine resampling.
    pub fn new(assembler: MosaicAssembler) -> Self {
        Self::with_resampler(assembler, WarpResampler)
    }
}

impl<R: Resampler> GapFiller<R> {
    /// Create a filler with a custom resampler.
    pub fn with_resampler(assembler: MosaicAssembler, resampler: R) -> Self {
        Self {
            assembler,
            resampler,
        }
    }

    /// The mosaic assembler.
    pub fn assembler(&self) -> &MosaicAssembler {
        &self.assembler
    }

    /// Run the pipeline for `request`.
    ///
    /// Missing tiles are not errors: a run where no source supplies anything
    /// succeeds with an all-no-data grid. Only invalid input, cancellation,
    /// deadline expiry and resampling failures are errors.
    pub fn run(&self, request: &FillRequest) -> Result<FillOutcome> {
        let primary_range = request.primary_range()?;
        let mut stages = Vec::with_capacity(5);

        let primary = self.assembler.assemble(&primary_range, &request.primary.sources)?;
        stages.push(FillStage::PrimaryAssembled);
        let primary_report = LayerReport::of(&primary)?;
        if primary.grid.is_all_nodata() {
            warn!(range = %primary_range, "Primary mosaic has no data");
        }

        let Mosaic {
            mut grid,
            transform,
            ..
        } = primary;

        stages.push(FillStage::GapCheck);
        let gaps = primary_report.nodata_cells;
        let mut secondary_report = None;
        let mut filled_cells = 0;

        match &request.fallback {
            _ if gaps == 0 => {
                info!("Primary mosaic is complete, skipping fallback");
            }
            None => {
                info!(gaps, "Primary mosaic has gaps and no fallback is configured");
            }
            Some(fallback) => {
                info!(gaps, zoom = fallback.zoom, "Filling gaps from fallback layer");
                let secondary_range =
                    TileIndexRange::from_bbox(&primary_report.bounds, fallback.zoom)?;
                let secondary = self.assembler.assemble(&secondary_range, &fallback.sources)?;
                stages.push(FillStage::SecondaryAssembled);
                secondary_report = Some(LayerReport::of(&secondary)?);

                if secondary.grid.is_all_nodata() {
                    warn!(range = %secondary_range, "Fallback mosaic has no data, gaps remain");
                } else {
                    let frame = GridFrame::of(&grid, transform, Crs::WGS84);
                    let resampled = self.resampler.resample(
                        &secondary.grid,
                        &secondary.transform,
                        Crs::WGS84,
                        &frame,
                        Kernel::Bilinear,
                    )?;
                    filled_cells = merge_fill(&mut grid, &resampled)?;
                    stages.push(FillStage::ResampledAndMerged);
                    info!(filled = filled_cells, "Merged fallback into primary");
                }
            }
        }

        stages.push(FillStage::Done);
        let remaining_gaps = grid.nodata_count();
        if remaining_gaps > 0 {
            warn!(remaining = remaining_gaps, "No-data cells remain in output");
        }

        Ok(FillOutcome {
            grid,
            transform,
            primary: primary_report,
            secondary: secondary_report,
            filled_cells,
            remaining_gaps,
            stages,
        })
    }
}

impl<R> fmt::Debug for GapFiller<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GapFiller")
            .field("assembler", &self.assembler)
            .finish_non_exhaustive()
    }
}
