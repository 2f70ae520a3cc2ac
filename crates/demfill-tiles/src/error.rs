//! Error types for the tile pipeline.
//!
//! [`DemError`] covers failures that abort a run. [`TileError`] and
//! [`DecodeError`] describe why one source had no usable tile; they are
//! absorbed by the fetcher and only ever reach a log line.

use crate::coord::{MAX_MOSAIC_PIXELS, MAX_ZOOM};
use crate::mosaic::MAX_CONCURRENCY;
use demfill_raster::RasterError;
use thiserror::Error;

/// Errors that abort a mosaic or gap-fill run.
#[derive(Debug, Error)]
pub enum DemError {
    /// Raster-level failure (invalid bounding box, resampling, dimensions).
    #[error(transparent)]
    Raster(#[from] RasterError),

    /// Coordinate outside the domain of the tile projection.
    #[error("Invalid coordinate ({lat}, {lon}): latitude must be inside (-90, 90) and longitude inside [-180, 180]")]
    InvalidCoordinate {
        /// Requested latitude.
        lat: f64,
        /// Requested longitude.
        lon: f64,
    },

    /// Invalid zoom level.
    #[error("Invalid zoom level {0} (must be 0-{max})", max = MAX_ZOOM)]
    InvalidZoomLevel(u8),

    /// Tile coordinates outside the pyramid at their zoom level.
    #[error("Tile x={x} y={y} is out of range for zoom {zoom}")]
    TileOutOfRange {
        /// Zoom level.
        zoom: u8,
        /// X tile coordinate.
        x: u32,
        /// Y tile coordinate.
        y: u32,
    },

    /// Tile index range has no tiles.
    #[error("Tile range is empty: x {x0}..={x1}, y {y0}..={y1}")]
    EmptyTileRange {
        /// First column.
        x0: u32,
        /// Last column.
        x1: u32,
        /// First row.
        y0: u32,
        /// Last row.
        y1: u32,
    },

    /// Tile range too large to assemble in memory.
    #[error("Tile range {range} is {width}x{height} px, more than {max} pixels", max = MAX_MOSAIC_PIXELS)]
    RangeTooLarge {
        /// The offending range.
        range: String,
        /// Mosaic width in pixels.
        width: u64,
        /// Mosaic height in pixels.
        height: u64,
    },

    /// Fallback layer is not coarser than the primary layer.
    #[error("Fallback zoom {fallback} must be lower than primary zoom {primary}")]
    FallbackNotCoarser {
        /// Primary zoom level.
        primary: u8,
        /// Fallback zoom level.
        fallback: u8,
    },

    /// Malformed tile source definition.
    #[error("Invalid tile source '{name}': {reason}")]
    InvalidSource {
        /// Source name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A source list without sources.
    #[error("Source list must contain at least one tile source")]
    EmptySourceList,

    /// Worker count outside the supported range.
    #[error("Invalid concurrency {0} (must be 1-{max})", max = MAX_CONCURRENCY)]
    InvalidConcurrency(usize),

    /// HTTP client could not be configured.
    #[error("Failed to configure HTTP transport: {0}")]
    Transport(String),

    /// Fetch worker pool could not be started.
    #[error("Failed to start fetch worker pool: {0}")]
    WorkerPool(String),

    /// The run was cancelled.
    #[error("Run cancelled")]
    Cancelled,

    /// The run-level deadline passed.
    #[error("Run deadline exceeded")]
    DeadlineExceeded,
}

impl DemError {
    /// True for errors caused by invalid input, detected before any network activity.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DemError::Raster(RasterError::InvalidBounds { .. })
                | DemError::InvalidCoordinate { .. }
                | DemError::InvalidZoomLevel(_)
                | DemError::TileOutOfRange { .. }
                | DemError::EmptyTileRange { .. }
                | DemError::RangeTooLarge { .. }
                | DemError::FallbackNotCoarser { .. }
                | DemError::InvalidSource { .. }
                | DemError::EmptySourceList
                | DemError::InvalidConcurrency(_)
        )
    }
}

/// Why a single source could not supply a tile.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TileError {
    /// The request timed out.
    #[error("request timed out")]
    Timeout,

    /// Connection or protocol failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status.
    #[error("HTTP status {0}")]
    Status(u16),

    /// Success status with nothing in the body.
    #[error("empty response body")]
    EmptyBody,

    /// Body is not a well-formed tile.
    #[error("malformed tile: {0}")]
    Decode(#[from] DecodeError),
}

impl TileError {
    /// True for failures worth retrying: timeouts, connection errors and 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            TileError::Timeout | TileError::Transport(_) => true,
            TileError::Status(status) => *status >= 500,
            TileError::EmptyBody | TileError::Decode(_) => false,
        }
    }
}

/// Structural problems in a tile payload.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    /// Wrong number of rows.
    #[error("expected {expected} rows, found {found}")]
    RowCount {
        /// Required row count.
        expected: usize,
        /// Rows present.
        found: usize,
    },

    /// A row with the wrong number of cells.
    #[error("row {row} has {found} cells, expected {expected}")]
    ColumnCount {
        /// Zero-based row number.
        row: usize,
        /// Required cell count.
        expected: usize,
        /// Cells present.
        found: usize,
    },

    /// A cell that is neither numeric nor the no-data token.
    #[error("row {row} column {col}: invalid cell '{token}'")]
    InvalidCell {
        /// Zero-based row number.
        row: usize,
        /// Zero-based column number.
        col: usize,
        /// Offending text.
        token: String,
    },

    /// Sample buffer of the wrong length.
    #[error("expected {expected} samples, found {found}")]
    SampleCount {
        /// Required sample count.
        expected: usize,
        /// Samples present.
        found: usize,
    },
}
