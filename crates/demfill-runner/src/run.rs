//! Run pipeline: validate, fetch, fill, write.

use crate::config::{RunConfig, RunPlan};
use crate::summary::{RasterReport, RunSummary};
use crate::RunError;
use demfill_raster::{Crs, GeoTiffRaster, GeoTiffWriter, RasterProfile, RasterWriter};
use demfill_tiles::{CancelToken, GapFiller, HttpTransport, MosaicAssembler, TileFetcher, TileTransport};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Run against the GSI services over HTTP and write a GeoTIFF.
pub fn run_http(config: &RunConfig, cancel: CancelToken) -> Result<RunSummary, RunError> {
    let plan = config.plan()?;
    let transport = Arc::new(HttpTransport::with_user_agent(&plan.user_agent)?);
    execute(&plan, transport, &GeoTiffWriter, cancel)
}

/// Run with an explicit transport and writer.
pub fn run(
    config: &RunConfig,
    transport: Arc<dyn TileTransport>,
    writer: &dyn RasterWriter,
    cancel: CancelToken,
) -> Result<RunSummary, RunError> {
    let plan = config.plan()?;
    execute(&plan, transport, writer, cancel)
}

/// Run a validated plan.
///
/// Missing tiles do not fail the run. Cancellation, deadline expiry and
/// output failures do, and nothing is written at the output path for them.
pub fn execute(
    plan: &RunPlan,
    transport: Arc<dyn TileTransport>,
    writer: &dyn RasterWriter,
    cancel: CancelToken,
) -> Result<RunSummary, RunError> {
    let start = Instant::now();
    let cancel = match plan.run_timeout {
        Some(timeout) => cancel.with_timeout(timeout),
        None => cancel,
    };

    info!(
        bbox = %plan.request.bbox,
        range = %plan.primary_range,
        width = plan.primary_range.pixel_width(),
        height = plan.primary_range.pixel_height(),
        fill = plan.request.fallback.is_some(),
        "Starting run"
    );

    let fetcher = TileFetcher::new(transport)
        .with_timeout(plan.tile_timeout)
        .with_retry(plan.retry)
        .with_cancel(cancel.clone());
    let assembler = MosaicAssembler::new(fetcher, plan.concurrency, plan.nodata)?;
    let outcome = GapFiller::new(assembler).run(&plan.request)?;

    if outcome.primary.stats.tiles_found == 0
        && outcome.secondary.as_ref().map_or(true, |s| s.stats.tiles_found == 0)
    {
        warn!("No source supplied any tile, output is entirely no-data");
    }

    // Last chance to abort before touching the output path.
    cancel.check()?;

    let profile = RasterProfile::single_band_f32(&outcome.grid, outcome.transform, Crs::WGS84);
    writer
        .write(&plan.output, &outcome.grid, &profile)
        .map_err(|source| RunError::Output {
            path: plan.output.clone(),
            source,
        })?;

    let summary = RunSummary::new(
        &plan.output,
        &plan.request.bbox,
        &outcome,
        start.elapsed().as_secs_f64(),
    );
    info!(
        output = %plan.output.display(),
        filled = summary.filled_cells,
        remaining = summary.remaining_gaps,
        elapsed_secs = summary.elapsed_secs,
        "Run complete"
    );
    Ok(summary)
}

/// Load a GeoTIFF and describe it.
pub fn inspect(path: &Path) -> Result<RasterReport, RunError> {
    let raster = GeoTiffRaster::from_file(path)?;
    Ok(RasterReport::new(path, &raster)?)
}
