//! # demfill-tiles
//!
//! Elevation mosaics from slippy-map text tiles, with multi-resolution gap fill.
//!
//! The crate is organised bottom-up:
//!
//! - [`coord`]: tile indices, tile ranges and their geographic extent
//! - [`source`]: named URL templates tried in priority order
//! - [`transport`]: HTTP and in-memory request backends
//! - [`decode`]: the 256 x 256 comma-separated tile format
//! - [`fetch`]: per-tile source fallback and retry
//! - [`mosaic`]: concurrent assembly of a tile range into one grid
//! - [`fill`]: filling a fine mosaic's gaps from a coarser one
//!
//! ## Example
//!
//! ```no_run
//! use demfill_tiles::{FillRequest, GapFiller, HttpTransport, MosaicAssembler, TileFetcher};
//! use demfill_raster::GeoBoundingBox;
//! use std::sync::Arc;
//!
//! let transport = Arc::new(HttpTransport::new()?);
//! let assembler = MosaicAssembler::new(TileFetcher::new(transport), 8, -9999.0)?;
//! let filler = GapFiller::new(assembler);
//!
//! let bbox = GeoBoundingBox::new(42.33, 42.19, 143.07, 142.96)?;
//! let outcome = filler.run(&FillRequest::gsi(bbox))?;
//! println!("filled {} cells, {} gaps remain", outcome.filled_cells, outcome.remaining_gaps);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cancel;
pub mod coord;
pub mod decode;
mod error;
pub mod fetch;
pub mod fill;
pub mod mosaic;
pub mod source;
pub mod transport;

pub use cancel::CancelToken;
pub use coord::{tile_corner, TileIndex, TileIndexRange, MAX_MOSAIC_PIXELS, MAX_ZOOM, TILE_SIZE};
pub use decode::{decode_tile, TileSample, NO_DATA_TOKEN};
pub use error::{DecodeError, DemError, TileError};
pub use fetch::{RetryPolicy, TileFetch, TileFetcher, DEFAULT_TILE_TIMEOUT};
pub use fill::{merge_fill, FillOutcome, FillRequest, FillStage, GapFiller, LayerReport, MosaicLayer};
pub use mosaic::{merge_tile, Mosaic, MosaicAssembler, MosaicStats, DEFAULT_CONCURRENCY, MAX_CONCURRENCY};
pub use source::{SourceList, TileSource, GSI_DEM10_ZOOM, GSI_DEM5_ZOOM};
pub use transport::{HttpTransport, MemoryTransport, TileTransport, TransportResponse, DEFAULT_USER_AGENT};

/// Result type for tile operations.
pub type Result<T> = std::result::Result<T, DemError>;
