//! Runner error type.

use demfill_raster::RasterError;
use demfill_tiles::DemError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that end a run with a non-zero exit status.
#[derive(Debug, Error)]
pub enum RunError {
    /// Missing or out-of-range configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file could not be read.
    #[error("Failed to read config {}: {source}", .path.display())]
    ConfigRead {
        /// Config file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid YAML for a run.
    #[error("Failed to parse config {}: {source}", .path.display())]
    ConfigParse {
        /// Config file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_yaml::Error,
    },

    /// Tile pipeline failure.
    #[error(transparent)]
    Dem(#[from] DemError),

    /// Raster failure outside of writing the output.
    #[error(transparent)]
    Raster(#[from] RasterError),

    /// Report could not be rendered as JSON.
    #[error("Failed to render report: {0}")]
    Report(#[from] serde_json::Error),

    /// Output raster could not be written.
    #[error("Failed to write {}: {source}", .path.display())]
    Output {
        /// Output path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: RasterError,
    },
}

impl RunError {
    /// True for errors detected before any network activity.
    pub fn is_configuration(&self) -> bool {
        match self {
            RunError::Config(_) | RunError::ConfigRead { .. } | RunError::ConfigParse { .. } => true,
            RunError::Raster(RasterError::InvalidBounds { .. }) => true,
            RunError::Dem(e) => e.is_configuration(),
            _ => false,
        }
    }

    /// True if the run was cancelled or ran out of time.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            RunError::Dem(DemError::Cancelled) | RunError::Dem(DemError::DeadlineExceeded)
        )
    }
}
