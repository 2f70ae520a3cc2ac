//! Run configuration.
//!
//! A run is described by a [`RunConfig`], loaded from YAML and/or built from
//! command-line flags. Every field except the bounding box and output path
//! has a default:
//!
//! ```yaml
//! bbox:
//!   north: 42.33
//!   south: 42.19
//!   east: 143.07
//!   west: 142.96
//! output: out/dem.tif
//! zoom: 15
//! fallback_zoom: 14
//! fill: true
//! nodata: -9999.0
//! concurrency: 8
//! tile_timeout_secs: 10
//! retries: 0
//! primary_sources:
//!   - { name: DEM5A, url: "https://cyberjapandata.gsi.go.jp/xyz/dem5a/{z}/{x}/{y}.txt" }
//!   - { name: DEM5B, url: "https://cyberjapandata.gsi.go.jp/xyz/dem5b/{z}/{x}/{y}.txt" }
//! fallback_sources:
//!   - { name: DEM10B, url: "https://cyberjapandata.gsi.go.jp/xyz/dem/{z}/{x}/{y}.txt" }
//! ```
//!
//! [`RunConfig::plan`] validates everything up front, so a bad configuration
//! fails before any request is made.

use crate::RunError;
use demfill_raster::GeoBoundingBox;
use demfill_tiles::source::{GSI_DEM10B_URL, GSI_DEM5A_URL, GSI_DEM5B_URL};
use demfill_tiles::{
    FillRequest, MosaicLayer, RetryPolicy, SourceList, TileIndexRange, TileSource,
    DEFAULT_CONCURRENCY, DEFAULT_USER_AGENT, GSI_DEM10_ZOOM, GSI_DEM5_ZOOM, MAX_CONCURRENCY,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default no-data sentinel.
pub const DEFAULT_NODATA: f32 = -9999.0;

/// Default per-request timeout in seconds.
pub const DEFAULT_TILE_TIMEOUT_SECS: f64 = 10.0;

/// Requested area in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BboxConfig {
    /// North edge.
    pub north: f64,
    /// South edge.
    pub south: f64,
    /// East edge.
    pub east: f64,
    /// West edge.
    pub west: f64,
}

/// A named tile URL template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Source name used in logs and the summary.
    pub name: String,
    /// URL template with `{z}`, `{x}` and `{y}` placeholders.
    pub url: String,
}

impl SourceConfig {
    fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
        }
    }
}

/// Full description of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Requested area.
    pub bbox: BboxConfig,
    /// Output GeoTIFF path.
    pub output: PathBuf,
    /// Primary zoom level.
    #[serde(default = "default_zoom")]
    pub zoom: u8,
    /// Fallback zoom level.
    #[serde(default = "default_fallback_zoom")]
    pub fallback_zoom: u8,
    /// Fill primary gaps from the fallback layer.
    #[serde(default = "default_fill")]
    pub fill: bool,
    /// No-data sentinel written to missing cells.
    #[serde(default = "default_nodata")]
    pub nodata: f32,
    /// Maximum concurrent tile requests.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Per-request timeout.
    #[serde(default = "default_tile_timeout")]
    pub tile_timeout_secs: f64,
    /// Whole-run deadline.
    #[serde(default)]
    pub run_timeout_secs: Option<f64>,
    /// Retries per source for transient failures.
    #[serde(default)]
    pub retries: u32,
    /// HTTP User-Agent.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Primary sources in priority order.
    #[serde(default = "default_primary_sources")]
    pub primary_sources: Vec<SourceConfig>,
    /// Fallback sources in priority order.
    #[serde(default = "default_fallback_sources")]
    pub fallback_sources: Vec<SourceConfig>,
}

fn default_zoom() -> u8 {
    GSI_DEM5_ZOOM
}

fn default_fallback_zoom() -> u8 {
    GSI_DEM10_ZOOM
}

fn default_fill() -> bool {
    true
}

fn default_nodata() -> f32 {
    DEFAULT_NODATA
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_tile_timeout() -> f64 {
    DEFAULT_TILE_TIMEOUT_SECS
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_primary_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig::new("DEM5A", GSI_DEM5A_URL),
        SourceConfig::new("DEM5B", GSI_DEM5B_URL),
    ]
}

fn default_fallback_sources() -> Vec<SourceConfig> {
    vec![SourceConfig::new("DEM10B", GSI_DEM10B_URL)]
}

/// Command-line values that override a loaded configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    /// North edge.
    pub north: Option<f64>,
    /// South edge.
    pub south: Option<f64>,
    /// East edge.
    pub east: Option<f64>,
    /// West edge.
    pub west: Option<f64>,
    /// Output path.
    pub output: Option<PathBuf>,
    /// Primary zoom.
    pub zoom: Option<u8>,
    /// Fallback zoom.
    pub fallback_zoom: Option<u8>,
    /// Disable gap fill.
    pub no_fill: bool,
    /// No-data sentinel.
    pub nodata: Option<f32>,
    /// Concurrent requests.
    pub concurrency: Option<usize>,
    /// Per-request timeout.
    pub tile_timeout_secs: Option<f64>,
    /// Whole-run deadline.
    pub run_timeout_secs: Option<f64>,
    /// Retries per source.
    pub retries: Option<u32>,
    /// HTTP User-Agent.
    pub user_agent: Option<String>,
}

impl RunConfig {
    /// A configuration with every optional field at its default.
    pub fn new(bbox: BboxConfig, output: impl Into<PathBuf>) -> Self {
        Self {
            bbox,
            output: output.into(),
            zoom: default_zoom(),
            fallback_zoom: default_fallback_zoom(),
            fill: default_fill(),
            nodata: default_nodata(),
            concurrency: default_concurrency(),
            tile_timeout_secs: default_tile_timeout(),
            run_timeout_secs: None,
            retries: 0,
            user_agent: default_user_agent(),
            primary_sources: default_primary_sources(),
            fallback_sources: default_fallback_sources(),
        }
    }

    /// Parse a YAML configuration.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Load a YAML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RunError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| RunError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text).map_err(|source| RunError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Combine an optional file configuration with command-line overrides.
    ///
    /// Without a file, the bounding box and output must all come from the
    /// overrides.
    pub fn resolve(base: Option<RunConfig>, overrides: ConfigOverrides) -> Result<Self, RunError> {
        let mut config = match base {
            Some(config) => config,
            None => {
                let bbox = BboxConfig {
                    north: require(overrides.north, "north")?,
                    south: require(overrides.south, "south")?,
                    east: require(overrides.east, "east")?,
                    west: require(overrides.west, "west")?,
                };
                let output = require(overrides.output.clone(), "output")?;
                RunConfig::new(bbox, output)
            }
        };

        if let Some(v) = overrides.north {
            config.bbox.north = v;
        }
        if let Some(v) = overrides.south {
            config.bbox.south = v;
        }
        if let Some(v) = overrides.east {
            config.bbox.east = v;
        }
        if let Some(v) = overrides.west {
            config.bbox.west = v;
        }
        if let Some(v) = overrides.output {
            config.output = v;
        }
        if let Some(v) = overrides.zoom {
            config.zoom = v;
        }
        if let Some(v) = overrides.fallback_zoom {
            config.fallback_zoom = v;
        }
        if overrides.no_fill {
            config.fill = false;
        }
        if let Some(v) = overrides.nodata {
            config.nodata = v;
        }
        if let Some(v) = overrides.concurrency {
            config.concurrency = v;
        }
        if let Some(v) = overrides.tile_timeout_secs {
            config.tile_timeout_secs = v;
        }
        if let Some(v) = overrides.run_timeout_secs {
            config.run_timeout_secs = Some(v);
        }
        if let Some(v) = overrides.retries {
            config.retries = v;
        }
        if let Some(v) = overrides.user_agent {
            config.user_agent = v;
        }
        Ok(config)
    }

    /// Validate the configuration and derive everything a run needs.
    pub fn plan(&self) -> Result<RunPlan, RunError> {
        let bbox = GeoBoundingBox::new(
            self.bbox.north,
            self.bbox.south,
            self.bbox.east,
            self.bbox.west,
        )?;

        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(RunError::Config(format!(
                "concurrency must be between 1 and {MAX_CONCURRENCY}, got {}",
                self.concurrency
            )));
        }
        let tile_timeout = positive_duration(self.tile_timeout_secs, "tile_timeout_secs")?;
        let run_timeout = self
            .run_timeout_secs
            .map(|secs| positive_duration(secs, "run_timeout_secs"))
            .transpose()?;
        if self.user_agent.trim().is_empty() {
            return Err(RunError::Config("user_agent must not be empty".to_string()));
        }
        check_output_path(&self.output)?;

        let primary = MosaicLayer::new(self.zoom, source_list(&self.primary_sources)?);
        let fallback = if self.fill {
            Some(MosaicLayer::new(
                self.fallback_zoom,
                source_list(&self.fallback_sources)?,
            ))
        } else {
            None
        };
        let request = FillRequest {
            bbox,
            primary,
            fallback,
        };
        let primary_range = request.primary_range()?;

        Ok(RunPlan {
            request,
            primary_range,
            output: self.output.clone(),
            nodata: self.nodata,
            concurrency: self.concurrency,
            tile_timeout,
            run_timeout,
            retry: RetryPolicy::with_retries(self.retries),
            user_agent: self.user_agent.clone(),
        })
    }
}

/// A validated run.
#[derive(Debug, Clone)]
pub struct RunPlan {
    /// Area and layers to fetch.
    pub request: FillRequest,
    /// Primary tiles.
    pub primary_range: TileIndexRange,
    /// Output GeoTIFF path.
    pub output: PathBuf,
    /// No-data sentinel.
    pub nodata: f32,
    /// Concurrent requests.
    pub concurrency: usize,
    /// Per-request timeout.
    pub tile_timeout: Duration,
    /// Whole-run deadline.
    pub run_timeout: Option<Duration>,
    /// Retry policy for transient failures.
    pub retry: RetryPolicy,
    /// HTTP User-Agent.
    pub user_agent: String,
}

fn require<T>(value: Option<T>, name: &str) -> Result<T, RunError> {
    value.ok_or_else(|| RunError::Config(format!("--{name} is required without --config")))
}

fn positive_duration(secs: f64, name: &str) -> Result<Duration, RunError> {
    match Duration::try_from_secs_f64(secs) {
        Ok(duration) if !duration.is_zero() => Ok(duration),
        _ => Err(RunError::Config(format!(
            "{name} must be a positive number of seconds, got {secs}"
        ))),
    }
}

fn source_list(sources: &[SourceConfig]) -> Result<SourceList, RunError> {
    let sources = sources
        .iter()
        .map(|s| TileSource::new(s.name.as_str(), s.url.as_str()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(SourceList::new(sources)?)
}

fn check_output_path(output: &Path) -> Result<(), RunError> {
    if output.as_os_str().is_empty() {
        return Err(RunError::Config("output path is empty".to_string()));
    }
    if output.is_dir() {
        return Err(RunError::Config(format!(
            "output {} is a directory",
            output.display()
        )));
    }
    let parent = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if !parent.is_dir() {
        return Err(RunError::Config(format!(
            "output directory {} does not exist",
            parent.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use demfill_tiles::DemError;

    const YAML: &str = r#"
bbox:
  north: 42.33
  south: 42.19
  east: 143.07
  west: 142.96
output: dem.tif
"#;

    fn bbox() -> BboxConfig {
        BboxConfig {
            north: 42.33,
            south: 42.19,
            east: 143.07,
            west: 142.96,
        }
    }

    #[test]
    fn test_yaml_defaults() {
        let config = RunConfig::from_yaml_str(YAML).unwrap();
        assert_eq!(config, RunConfig::new(bbox(), "dem.tif"));
        assert_eq!(config.zoom, 15);
        assert_eq!(config.fallback_zoom, 14);
        assert!(config.fill);
        assert_eq!(config.nodata, -9999.0);
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.primary_sources[0].name, "DEM5A");
        assert_eq!(config.primary_sources[1].name, "DEM5B");
        assert_eq!(config.fallback_sources[0].name, "DEM10B");
    }

    #[test]
    fn test_yaml_rejects_unknown_fields() {
        let yaml = format!("{YAML}zoom_level: 15\n");
        assert!(RunConfig::from_yaml_str(&yaml).is_err());
    }

    #[test]
    fn test_yaml_custom_sources() {
        let yaml = format!(
            "{YAML}primary_sources:\n  - {{ name: local, url: \"file:///tiles/{{z}}/{{x}}/{{y}}.txt\" }}\nfill: false\n"
        );
        let config = RunConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(config.primary_sources.len(), 1);
        assert_eq!(config.primary_sources[0].url, "file:///tiles/{z}/{x}/{y}.txt");
        assert!(!config.fill);

        let plan = config.plan().unwrap();
        assert!(plan.request.fallback.is_none());
        assert_eq!(plan.request.primary.sources.names(), vec!["local"]);
    }

    #[test]
    fn test_plan_computes_primary_range() {
        let plan = RunConfig::new(bbox(), "dem.tif").plan().unwrap();
        assert_eq!(plan.primary_range.tile_count(), 198);
        assert_eq!(plan.primary_range.pixel_width(), 2816);
        assert_eq!(plan.primary_range.pixel_height(), 4608);
        assert_eq!(plan.tile_timeout, Duration::from_secs(10));
        assert_eq!(plan.run_timeout, None);
        assert_eq!(plan.retry.max_retries, 0);
    }

    #[test]
    fn test_plan_rejects_bad_values() {
        let mut config = RunConfig::new(bbox(), "dem.tif");
        config.bbox.south = 42.5;
        assert!(config.plan().unwrap_err().is_configuration());

        let mut config = RunConfig::new(bbox(), "dem.tif");
        config.concurrency = 0;
        assert!(matches!(config.plan(), Err(RunError::Config(_))));

        let mut config = RunConfig::new(bbox(), "dem.tif");
        config.tile_timeout_secs = -1.0;
        assert!(matches!(config.plan(), Err(RunError::Config(_))));

        let mut config = RunConfig::new(bbox(), "dem.tif");
        config.zoom = 30;
        assert!(matches!(
            config.plan(),
            Err(RunError::Dem(DemError::InvalidZoomLevel(30)))
        ));

        let mut config = RunConfig::new(bbox(), "dem.tif");
        config.fallback_sources.clear();
        assert!(matches!(
            config.plan(),
            Err(RunError::Dem(DemError::EmptySourceList))
        ));

        // Disabled fill ignores the fallback list
        config.fill = false;
        assert!(config.plan().is_ok());

        let mut config = RunConfig::new(bbox(), "dem.tif");
        config.primary_sources[0].url = "https://example.com/{z}/{x}.txt".to_string();
        assert!(config.plan().unwrap_err().is_configuration());
    }

    #[test]
    fn test_plan_rejects_fallback_not_coarser() {
        let mut config = RunConfig::new(bbox(), "dem.tif");
        config.fallback_zoom = 15;
        let err = config.plan().unwrap_err();
        assert!(matches!(
            err,
            RunError::Dem(DemError::FallbackNotCoarser { primary: 15, fallback: 15 })
        ));
        assert!(err.is_configuration());

        config.fill = false;
        assert!(config.plan().is_ok());
    }

    #[test]
    fn test_plan_rejects_oversized_area() {
        let mut config = RunConfig::new(bbox(), "dem.tif");
        config.bbox = BboxConfig {
            north: 80.0,
            south: -80.0,
            east: 170.0,
            west: -170.0,
        };
        config.zoom = 24;
        let err = config.plan().unwrap_err();
        assert!(matches!(err, RunError::Dem(DemError::RangeTooLarge { .. })));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_plan_accepts_huge_run_timeout() {
        let mut config = RunConfig::new(bbox(), "dem.tif");
        config.run_timeout_secs = Some(1e19);
        let plan = config.plan().unwrap();
        assert!(plan.run_timeout.is_some());
    }

    #[test]
    fn test_plan_checks_output_directory() {
        let config = RunConfig::new(bbox(), "no/such/directory/dem.tif");
        let err = config.plan().unwrap_err();
        assert!(matches!(err, RunError::Config(ref msg) if msg.contains("does not exist")));
    }

    #[test]
    fn test_resolve_requires_bbox_without_file() {
        let err = RunConfig::resolve(None, ConfigOverrides::default()).unwrap_err();
        assert!(matches!(err, RunError::Config(ref msg) if msg.contains("--north")));

        let overrides = ConfigOverrides {
            north: Some(42.33),
            south: Some(42.19),
            east: Some(143.07),
            west: Some(142.96),
            output: Some(PathBuf::from("dem.tif")),
            no_fill: true,
            concurrency: Some(2),
            ..ConfigOverrides::default()
        };
        let config = RunConfig::resolve(None, overrides).unwrap();
        assert_eq!(config.bbox, bbox());
        assert!(!config.fill);
        assert_eq!(config.concurrency, 2);
    }

    #[test]
    fn test_resolve_overrides_file_values() {
        let base = RunConfig::from_yaml_str(YAML).unwrap();
        let overrides = ConfigOverrides {
            west: Some(142.9),
            zoom: Some(14),
            retries: Some(3),
            run_timeout_secs: Some(60.0),
            ..ConfigOverrides::default()
        };
        let config = RunConfig::resolve(Some(base), overrides).unwrap();
        assert_eq!(config.bbox.west, 142.9);
        assert_eq!(config.bbox.north, 42.33);
        assert_eq!(config.zoom, 14);
        assert_eq!(config.retries, 3);
        assert_eq!(config.run_timeout_secs, Some(60.0));
        assert_eq!(config.output, PathBuf::from("dem.tif"));
    }
}
