//! # demfill-runner
//!
//! Configuration and orchestration for the `demfill` command.
//!
//! A run validates its [`RunConfig`] into a [`RunPlan`], assembles the primary
//! mosaic, fills its gaps from the fallback layer, writes a single-band
//! GeoTIFF and returns a [`RunSummary`].

mod config;
mod error;
mod run;
mod summary;

pub use config::{
    BboxConfig, ConfigOverrides, RunConfig, RunPlan, SourceConfig, DEFAULT_NODATA,
    DEFAULT_TILE_TIMEOUT_SECS,
};
pub use error::RunError;
pub use run::{execute, inspect, run, run_http};
pub use summary::{BoundsSummary, LayerSummary, RasterReport, RunSummary};
