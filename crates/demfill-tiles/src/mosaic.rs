//! Concurrent mosaic assembly.
//!
//! Tiles of a [`TileIndexRange`] are fetched on a dedicated rayon pool and
//! streamed over a bounded channel to the calling thread, which owns the
//! output grid and merges each tile into its block as it arrives.
//!
//! A destination cell is written only while it still holds the no-data
//! sentinel, and only with a real sample. Tiles occupy disjoint blocks, so
//! the finished grid does not depend on arrival order.

use crate::cancel::CancelToken;
use crate::coord::{TileIndex, TileIndexRange, TILE_SIZE};
use crate::decode::TileSample;
use crate::fetch::{TileFetch, TileFetcher};
use crate::source::SourceList;
use crate::{DemError, Result};
use crossbeam_channel::bounded;
use demfill_raster::{is_nodata, GeoBoundingBox, GeoTransform, RasterGrid};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Default number of concurrent tile requests.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Upper bound on concurrent tile requests.
pub const MAX_CONCURRENCY: usize = 64;

/// Tile accounting for one mosaic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MosaicStats {
    /// Tiles in the range.
    pub tiles_requested: usize,
    /// Tiles supplied by some source.
    pub tiles_found: usize,
    /// Tiles no source could supply.
    pub tiles_missing: usize,
    /// Tiles supplied per source name.
    pub by_source: BTreeMap<String, usize>,
}

/// An assembled mosaic and its georeferencing.
#[derive(Debug, Clone)]
pub struct Mosaic {
    /// Samples, `range.pixel_width()` x `range.pixel_height()`.
    pub grid: RasterGrid,
    /// Pixel-to-geographic transform over the tile-aligned extent.
    pub transform: GeoTransform,
    /// Tiles covered.
    pub range: TileIndexRange,
    /// Tile accounting.
    pub stats: MosaicStats,
}

impl Mosaic {
    /// Tile-aligned geographic extent.
    pub fn bounds(&self) -> Result<GeoBoundingBox> {
        self.range.bounds()
    }
}

/// Copy a tile into `grid` with its top-left sample at (`row_offset`, `col_offset`).
///
/// Only cells still equal to the grid's no-data value are written, and only
/// with samples that are neither NaN nor that value. Portions of the tile
/// outside the grid are ignored. Returns the number of cells written.
pub fn merge_tile(
    grid: &mut RasterGrid,
    sample: &TileSample,
    row_offset: usize,
    col_offset: usize,
) -> usize {
    let width = grid.width();
    let height = grid.height();
    let nodata = grid.nodata();
    if col_offset >= width {
        return 0;
    }
    let span = TILE_SIZE.min(width - col_offset);
    let data = grid.data_mut();

    let mut written = 0;
    for r in 0..TILE_SIZE {
        let row = row_offset + r;
        if row >= height {
            break;
        }
        let start = row * width + col_offset;
        for (dest, &value) in data[start..start + span].iter_mut().zip(sample.row(r)) {
            if is_nodata(*dest, nodata) && !value.is_nan() && !is_nodata(value, nodata) {
                *dest = value;
                written += 1;
            }
        }
    }
    written
}

/// Assembles mosaics with a bounded number of concurrent requests.
pub struct MosaicAssembler {
    fetcher: TileFetcher,
    pool: ThreadPool,
    concurrency: usize,
    nodata: f32,
}

impl MosaicAssembler {
    /// Create an assembler running at most `concurrency` requests at once.
    pub fn new(fetcher: TileFetcher, concurrency: usize, nodata: f32) -> Result<Self> {
        if concurrency == 0 || concurrency > MAX_CONCURRENCY {
            return Err(DemError::InvalidConcurrency(concurrency));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(concurrency)
            .thread_name(|i| format!("demfill-fetch-{i}"))
            .build()
            .map_err(|e| DemError::WorkerPool(e.to_string()))?;
        Ok(Self {
            fetcher,
            pool,
            concurrency,
            nodata,
        })
    }

    /// Maximum concurrent requests.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// No-data sentinel of assembled grids.
    pub fn nodata(&self) -> f32 {
        self.nodata
    }

    /// The underlying fetcher.
    pub fn fetcher(&self) -> &TileFetcher {
        &self.fetcher
    }

    /// The cancellation token shared with the fetcher.
    pub fn cancel_token(&self) -> &CancelToken {
        self.fetcher.cancel_token()
    }

    /// Fetch every tile of `range` from `sources` and assemble the mosaic.
    ///
    /// Missing tiles leave their block at the no-data value. Fails on a
    /// range larger than [`MAX_MOSAIC_PIXELS`](crate::coord::MAX_MOSAIC_PIXELS)
    /// before any request, and on cancellation or deadline expiry, in which
    /// case no partial grid is returned.
    pub fn assemble(&self, range: &TileIndexRange, sources: &SourceList) -> Result<Mosaic> {
        let cancel = self.fetcher.cancel_token();
        cancel.check()?;
        range.check_size()?;

        let transform = range.geo_transform()?;
        let mut grid = RasterGrid::filled(range.pixel_width(), range.pixel_height(), self.nodata);
        let tiles: Vec<TileIndex> = range.tiles().collect();
        let mut stats = MosaicStats {
            tiles_requested: tiles.len(),
            ..MosaicStats::default()
        };

        info!(
            range = %range,
            tiles = tiles.len(),
            sources = %sources,
            concurrency = self.concurrency,
            "Assembling mosaic"
        );
        let start = Instant::now();

        let (tx, rx) = bounded::<(TileIndex, TileFetch)>(self.concurrency * 2);
        let fetcher = &self.fetcher;
        let pool = &self.pool;
        let tiles = &tiles;

        std::thread::scope(|scope| {
            scope.spawn(move || {
                pool.install(|| {
                    tiles.par_iter().for_each_with(tx, |tx, tile| {
                        if cancel.is_cancelled() {
                            return;
                        }
                        let outcome = fetcher.fetch(tile, sources);
                        // The receiver lives until every sender is dropped.
                        let _ = tx.send((*tile, outcome));
                    });
                });
            });

            for (tile, outcome) in rx.iter() {
                match outcome {
                    TileFetch::Found { sample, source } => {
                        if let Some((row, col)) = range.pixel_offset(&tile) {
                            merge_tile(&mut grid, &sample, row, col);
                        }
                        stats.tiles_found += 1;
                        *stats.by_source.entry(source).or_default() += 1;
                    }
                    TileFetch::NotFound => {
                        debug!(tile = %tile, "No source supplied tile");
                        stats.tiles_missing += 1;
                    }
                }
            }
        });

        cancel.check()?;

        if stats.tiles_missing > 0 {
            warn!(
                range = %range,
                missing = stats.tiles_missing,
                requested = stats.tiles_requested,
                "Some tiles were unavailable from every source"
            );
        }
        info!(
            range = %range,
            found = stats.tiles_found,
            missing = stats.tiles_missing,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Mosaic assembled"
        );

        Ok(Mosaic {
            grid,
            transform,
            range: *range,
            stats,
        })
    }
}

impl std::fmt::Debug for MosaicAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MosaicAssembler")
            .field("fetcher", &self.fetcher)
            .field("concurrency", &self.concurrency)
            .field("nodata", &self.nodata)
            .finish()
    }
}
