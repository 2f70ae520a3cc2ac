//! Run and raster reports printed by the CLI.

use demfill_raster::{GeoBoundingBox, GeoTiffRaster};
use demfill_tiles::{FillOutcome, LayerReport};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Bounding box in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundsSummary {
    /// North edge.
    pub north: f64,
    /// South edge.
    pub south: f64,
    /// East edge.
    pub east: f64,
    /// West edge.
    pub west: f64,
}

impl From<&GeoBoundingBox> for BoundsSummary {
    fn from(bbox: &GeoBoundingBox) -> Self {
        Self {
            north: bbox.north(),
            south: bbox.south(),
            east: bbox.east(),
            west: bbox.west(),
        }
    }
}

impl fmt::Display for BoundsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "N {:.6}  S {:.6}  W {:.6}  E {:.6}",
            self.north, self.south, self.west, self.east
        )
    }
}

/// One assembled layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerSummary {
    /// Zoom level.
    pub zoom: u8,
    /// Tile columns (inclusive).
    pub x: [u32; 2],
    /// Tile rows (inclusive).
    pub y: [u32; 2],
    /// Tile-aligned extent.
    pub bounds: BoundsSummary,
    /// Tiles in the range.
    pub tiles_requested: usize,
    /// Tiles supplied.
    pub tiles_found: usize,
    /// Tiles no source could supply.
    pub tiles_missing: usize,
    /// Tiles supplied per source.
    pub by_source: BTreeMap<String, usize>,
}

impl From<&LayerReport> for LayerSummary {
    fn from(report: &LayerReport) -> Self {
        Self {
            zoom: report.range.zoom(),
            x: [report.range.x0(), report.range.x1()],
            y: [report.range.y0(), report.range.y1()],
            bounds: BoundsSummary::from(&report.bounds),
            tiles_requested: report.stats.tiles_requested,
            tiles_found: report.stats.tiles_found,
            tiles_missing: report.stats.tiles_missing,
            by_source: report.stats.by_source.clone(),
        }
    }
}

impl fmt::Display for LayerSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "z{} x {}..={} y {}..={}: {}/{} tiles",
            self.zoom, self.x[0], self.x[1], self.y[0], self.y[1], self.tiles_found, self.tiles_requested
        )?;
        if !self.by_source.is_empty() {
            let sources: Vec<String> = self
                .by_source
                .iter()
                .map(|(name, count)| format!("{name}={count}"))
                .collect();
            write!(f, " ({})", sources.join(", "))?;
        }
        Ok(())
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Written GeoTIFF.
    pub output: PathBuf,
    /// Area requested.
    pub requested_bounds: BoundsSummary,
    /// Tile-aligned area written, wider than the request.
    pub output_bounds: BoundsSummary,
    /// Raster width in pixels.
    pub width: usize,
    /// Raster height in pixels.
    pub height: usize,
    /// No-data sentinel.
    pub nodata: f32,
    /// Primary layer.
    pub primary: LayerSummary,
    /// Fallback layer, if assembled.
    pub secondary: Option<LayerSummary>,
    /// Cells filled from the fallback.
    pub filled_cells: usize,
    /// No-data cells in the output.
    pub remaining_gaps: usize,
    /// Pipeline stages passed.
    pub stages: Vec<String>,
    /// Wall-clock run time.
    pub elapsed_secs: f64,
}

impl RunSummary {
    /// Summarise a fill outcome written to `output`.
    pub fn new(
        output: &Path,
        requested: &GeoBoundingBox,
        outcome: &FillOutcome,
        elapsed_secs: f64,
    ) -> Self {
        Self {
            output: output.to_path_buf(),
            requested_bounds: BoundsSummary::from(requested),
            output_bounds: BoundsSummary::from(&outcome.bounds()),
            width: outcome.grid.width(),
            height: outcome.grid.height(),
            nodata: outcome.grid.nodata(),
            primary: LayerSummary::from(&outcome.primary),
            secondary: outcome.secondary.as_ref().map(LayerSummary::from),
            filled_cells: outcome.filled_cells,
            remaining_gaps: outcome.remaining_gaps,
            stages: outcome.stages.iter().map(ToString::to_string).collect(),
            elapsed_secs,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Saved:      {}", self.output.display())?;
        writeln!(f, "Size:       {} x {} px", self.width, self.height)?;
        writeln!(f, "Requested:  {}", self.requested_bounds)?;
        writeln!(f, "Bounds:     {}", self.output_bounds)?;
        writeln!(f, "Primary:    {}", self.primary)?;
        match &self.secondary {
            Some(secondary) => writeln!(f, "Fallback:   {secondary}")?,
            None => writeln!(f, "Fallback:   not used")?,
        }
        writeln!(f, "Filled:     {} cells", self.filled_cells)?;
        write!(
            f,
            "No-data:    {} cells (value {})",
            self.remaining_gaps, self.nodata
        )
    }
}

/// Description of a GeoTIFF on disk.
#[derive(Debug, Clone, Serialize)]
pub struct RasterReport {
    /// File path.
    pub path: PathBuf,
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// CRS, if tagged.
    pub crs: Option<String>,
    /// Geographic extent.
    pub bounds: BoundsSummary,
    /// Degrees per pixel (x, y).
    pub pixel_size: [f64; 2],
    /// No-data value.
    pub nodata: f32,
    /// Cells holding a sample.
    pub valid_cells: usize,
    /// No-data cells.
    pub nodata_cells: usize,
    /// Minimum valid sample.
    pub min: Option<f32>,
    /// Maximum valid sample.
    pub max: Option<f32>,
}

impl RasterReport {
    /// Describe a loaded raster.
    pub fn new(path: &Path, raster: &GeoTiffRaster) -> demfill_raster::Result<Self> {
        let grid = raster.grid();
        let transform = raster.transform();
        let range = grid.value_range();
        Ok(Self {
            path: path.to_path_buf(),
            width: grid.width(),
            height: grid.height(),
            crs: raster.crs().map(|crs| crs.to_string()),
            bounds: BoundsSummary::from(&raster.bounds()?),
            pixel_size: [transform.pixel_width, transform.pixel_height],
            nodata: grid.nodata(),
            valid_cells: grid.valid_count(),
            nodata_cells: grid.nodata_count(),
            min: range.map(|(lo, _)| lo),
            max: range.map(|(_, hi)| hi),
        })
    }
}

impl fmt::Display for RasterReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "File:       {}", self.path.display())?;
        writeln!(f, "Size:       {} x {} px", self.width, self.height)?;
        writeln!(f, "CRS:        {}", self.crs.as_deref().unwrap_or("unknown"))?;
        writeln!(f, "Bounds:     {}", self.bounds)?;
        writeln!(
            f,
            "Pixel size: {:.9} x {:.9} deg",
            self.pixel_size[0], self.pixel_size[1]
        )?;
        writeln!(f, "No-data:    {} ({} cells)", self.nodata, self.nodata_cells)?;
        match (self.min, self.max) {
            (Some(min), Some(max)) => write!(
                f,
                "Valid:      {} cells, {:.2} .. {:.2} m",
                self.valid_cells, min, max
            ),
            _ => write!(f, "Valid:      0 cells"),
        }
    }
}
