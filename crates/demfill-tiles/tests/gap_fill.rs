//! End-to-end gap fill against in-memory tile sources.

use demfill_raster::GeoBoundingBox;
use demfill_tiles::{
    DemError, FillRequest, FillStage, GapFiller, MemoryTransport, MosaicAssembler, MosaicLayer, SourceList,
    TileFetcher, TileIndex, TileSample, TileSource, TransportResponse, MAX_ZOOM,
};
use std::sync::Arc;

const NODATA: f32 = -9999.0;
const PRIMARY: &str = "mem://dem5/";
const FALLBACK: &str = "mem://dem10/";

/// Spans tiles x 29396..=29397, y 12123..=12124 at zoom 15.
fn bbox() -> GeoBoundingBox {
    GeoBoundingBox::new(42.33, 42.32, 142.975, 142.96).unwrap()
}

fn layer(prefix: &str, zoom: u8) -> MosaicLayer {
    let source = TileSource::new("mem", format!("{prefix}{{z}}/{{x}}/{{y}}.txt")).unwrap();
    MosaicLayer::new(zoom, SourceList::single(source))
}

fn request(fallback: bool) -> FillRequest {
    FillRequest {
        bbox: bbox(),
        primary: layer(PRIMARY, 15),
        fallback: fallback.then(|| layer(FALLBACK, 14)),
    }
}

fn primary_url(x: u32, y: u32) -> String {
    format!("{PRIMARY}15/{x}/{y}.txt")
}

fn filler(transport: Arc<MemoryTransport>) -> GapFiller {
    let assembler = MosaicAssembler::new(TileFetcher::new(transport), 4, NODATA).unwrap();
    GapFiller::new(assembler)
}

fn full_primary() -> MemoryTransport {
    MemoryTransport::new().with_prefix(PRIMARY, TransportResponse::ok(TileSample::filled(100.0).to_text()))
}

#[test]
fn test_complete_primary_skips_fallback() {
    let transport = Arc::new(
        full_primary().with_prefix(FALLBACK, TransportResponse::ok(TileSample::filled(50.0).to_text())),
    );
    let outcome = filler(transport.clone()).run(&request(true)).unwrap();

    assert_eq!(outcome.grid.width(), 512);
    assert_eq!(outcome.grid.height(), 512);
    assert_eq!(outcome.remaining_gaps, 0);
    assert_eq!(outcome.filled_cells, 0);
    assert!(outcome.secondary.is_none());
    assert_eq!(
        outcome.stages,
        vec![FillStage::PrimaryAssembled, FillStage::GapCheck, FillStage::Done]
    );
    assert_eq!(transport.requests_with_prefix(FALLBACK), 0);
    assert_eq!(transport.requests_with_prefix(PRIMARY), 4);
}

#[test]
fn test_missing_primary_filled_from_fallback() {
    let transport = Arc::new(
        MemoryTransport::new().with_prefix(FALLBACK, TransportResponse::ok(TileSample::filled(50.0).to_text())),
    );
    let outcome = filler(transport).run(&request(true)).unwrap();

    assert_eq!(outcome.primary.stats.tiles_missing, 4);
    assert_eq!(outcome.remaining_gaps, 0);
    assert_eq!(outcome.filled_cells, 512 * 512);
    assert!(outcome.grid.data().iter().all(|&v| (v - 50.0).abs() < 1e-3));
    assert_eq!(
        outcome.stages,
        vec![
            FillStage::PrimaryAssembled,
            FillStage::GapCheck,
            FillStage::SecondaryAssembled,
            FillStage::ResampledAndMerged,
            FillStage::Done
        ]
    );
}

#[test]
fn test_secondary_covers_primary_extent() {
    let transport = Arc::new(MemoryTransport::new());
    let outcome = filler(transport).run(&request(true)).unwrap();

    let secondary = outcome.secondary.expect("gaps should trigger the fallback layer");
    assert_eq!(secondary.range.zoom(), 14);
    assert_eq!((secondary.range.x0(), secondary.range.y0()), (14698, 6061));
    assert!(secondary.bounds.covers(&outcome.primary.bounds));
    assert!(outcome.primary.bounds.covers(&bbox()));
}

#[test]
fn test_all_sources_missing_is_not_an_error() {
    let transport = Arc::new(MemoryTransport::new());
    let outcome = filler(transport.clone()).run(&request(true)).unwrap();

    assert!(outcome.grid.is_all_nodata());
    assert_eq!(outcome.remaining_gaps, 512 * 512);
    assert_eq!(outcome.filled_cells, 0);
    assert!(!outcome.stages.contains(&FillStage::ResampledAndMerged));
    assert_eq!(outcome.stages.last(), Some(&FillStage::Done));
    assert!(transport.requests_with_prefix(FALLBACK) > 0);
}

#[test]
fn test_fallback_fills_only_missing_tile() {
    let missing = TileIndex { zoom: 15, x: 29397, y: 12124 };
    let mut transport = MemoryTransport::new();
    for (x, y) in [(29396, 12123), (29397, 12123), (29396, 12124)] {
        transport = transport.with_tile(primary_url(x, y), TileSample::filled(100.0).to_text());
    }
    let transport = Arc::new(
        transport.with_prefix(FALLBACK, TransportResponse::ok(TileSample::filled(50.0).to_text())),
    );
    let outcome = filler(transport).run(&request(true)).unwrap();

    assert_eq!(outcome.filled_cells, 256 * 256);
    assert_eq!(outcome.remaining_gaps, 0);
    // Primary samples are never replaced
    assert_eq!(outcome.grid.get(0, 0), Some(100.0));
    assert_eq!(outcome.grid.get(511, 0), Some(100.0));
    assert_eq!(outcome.grid.get(0, 511), Some(100.0));
    // The missing tile's block comes from the fallback
    let filled = outcome.grid.get(300, 300).unwrap();
    assert!((filled - 50.0).abs() < 1e-3, "{missing} should be filled, got {filled}");
}

#[test]
fn test_nodata_cells_inside_tile_are_filled() {
    let gappy = TileSample::from_fn(|row, _| if row < 10 { f32::NAN } else { 100.0 });
    let transport = Arc::new(
        full_primary()
            .with_tile(primary_url(29396, 12123), gappy.to_text())
            .with_prefix(FALLBACK, TransportResponse::ok(TileSample::filled(50.0).to_text())),
    );
    let outcome = filler(transport).run(&request(true)).unwrap();

    assert_eq!(outcome.primary.nodata_cells, 10 * 256);
    assert_eq!(outcome.filled_cells, 10 * 256);
    assert_eq!(outcome.remaining_gaps, 0);
    assert_eq!(outcome.grid.get(256, 0), Some(100.0));
    assert_eq!(outcome.grid.get(0, 10), Some(100.0));
}

#[test]
fn test_fill_disabled_leaves_gaps() {
    let transport = Arc::new(MemoryTransport::new().with_tile(
        primary_url(29396, 12123),
        TileSample::filled(100.0).to_text(),
    ));
    let outcome = filler(transport.clone()).run(&request(false)).unwrap();

    assert!(outcome.secondary.is_none());
    assert_eq!(outcome.remaining_gaps, 3 * 256 * 256);
    assert_eq!(transport.requests_with_prefix(FALLBACK), 0);
}

#[test]
fn test_invalid_bbox_fails_before_network() {
    let transport = Arc::new(MemoryTransport::new());
    let mut req = request(true);
    req.primary.zoom = 25;
    let err = filler(transport.clone()).run(&req).unwrap_err();

    assert!(err.is_configuration());
    assert_eq!(transport.request_count(), 0);
}

#[test]
fn test_oversized_request_fails_before_network() {
    let transport = Arc::new(full_primary());
    let req = FillRequest {
        bbox: GeoBoundingBox::new(80.0, -80.0, 170.0, -170.0).unwrap(),
        primary: layer(PRIMARY, MAX_ZOOM),
        fallback: None,
    };
    let err = filler(transport.clone()).run(&req).unwrap_err();

    assert!(matches!(err, DemError::RangeTooLarge { .. }));
    assert!(err.is_configuration());
    assert_eq!(transport.request_count(), 0);
}

#[test]
fn test_fallback_finer_than_primary_is_rejected() {
    let transport = Arc::new(full_primary());
    let mut req = request(true);
    req.fallback = Some(layer(FALLBACK, 16));
    let err = filler(transport.clone()).run(&req).unwrap_err();

    assert!(matches!(err, DemError::FallbackNotCoarser { primary: 15, fallback: 16 }));
    assert_eq!(transport.request_count(), 0);
}
