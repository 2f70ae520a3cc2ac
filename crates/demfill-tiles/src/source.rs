//! Named tile sources and their priority order.
//!
//! A [`TileSource`] is an XYZ URL template with `{z}`, `{x}` and `{y}`
//! placeholders. A [`SourceList`] is tried in order for each tile; the first
//! source that returns a usable tile supplies it.
//!
//! Presets for the GSI (Geospatial Information Authority of Japan) elevation
//! tile services are provided:
//!
//! | Source | Resolution | Native zoom |
//! |--------|------------|-------------|
//! | DEM5A  | 5 m (laser survey) | 15 |
//! | DEM5B  | 5 m (photogrammetry) | 15 |
//! | DEM10B | 10 m | 14 |

use crate::coord::TileIndex;
use crate::{DemError, Result};
use std::fmt;

/// GSI 5 m laser-survey elevation tiles.
pub const GSI_DEM5A_URL: &str = "https://cyberjapandata.gsi.go.jp/xyz/dem5a/{z}/{x}/{y}.txt";

/// GSI 5 m photogrammetry elevation tiles.
pub const GSI_DEM5B_URL: &str = "https://cyberjapandata.gsi.go.jp/xyz/dem5b/{z}/{x}/{y}.txt";

/// GSI 10 m elevation tiles.
pub const GSI_DEM10B_URL: &str = "https://cyberjapandata.gsi.go.jp/xyz/dem/{z}/{x}/{y}.txt";

/// Native zoom of the 5 m products.
pub const GSI_DEM5_ZOOM: u8 = 15;

/// Native zoom of the 10 m product.
pub const GSI_DEM10_ZOOM: u8 = 14;

const PLACEHOLDERS: [&str; 3] = ["{z}", "{x}", "{y}"];

/// A named XYZ tile endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileSource {
    name: String,
    url_template: String,
}

impl TileSource {
    /// Create a source. The template must contain `{z}`, `{x}` and `{y}`.
    pub fn new(name: impl Into<String>, url_template: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let url_template = url_template.into();

        if name.trim().is_empty() {
            return Err(DemError::InvalidSource {
                name,
                reason: "name is empty".to_string(),
            });
        }
        if let Some(missing) = PLACEHOLDERS.iter().find(|p| !url_template.contains(*p)) {
            return Err(DemError::InvalidSource {
                name,
                reason: format!("URL template '{url_template}' has no {missing} placeholder"),
            });
        }

        Ok(Self { name, url_template })
    }

    /// GSI DEM5A.
    pub fn gsi_dem5a() -> Self {
        Self::preset("DEM5A", GSI_DEM5A_URL)
    }

    /// GSI DEM5B.
    pub fn gsi_dem5b() -> Self {
        Self::preset("DEM5B", GSI_DEM5B_URL)
    }

    /// GSI DEM10B.
    pub fn gsi_dem10b() -> Self {
        Self::preset("DEM10B", GSI_DEM10B_URL)
    }

    fn preset(name: &str, url_template: &str) -> Self {
        Self {
            name: name.to_string(),
            url_template: url_template.to_string(),
        }
    }

    /// Source name used in logs and statistics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The URL template.
    pub fn url_template(&self) -> &str {
        &self.url_template
    }

    /// URL of `tile` at this source.
    pub fn url_for(&self, tile: &TileIndex) -> String {
        self.url_template
            .replace("{z}", &tile.zoom.to_string())
            .replace("{x}", &tile.x.to_string())
            .replace("{y}", &tile.y.to_string())
    }
}

impl fmt::Display for TileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Non-empty, ordered list of tile sources. Earlier entries take priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceList {
    sources: Vec<TileSource>,
}

impl SourceList {
    /// Create a list, rejecting an empty one.
    pub fn new(sources: Vec<TileSource>) -> Result<Self> {
        if sources.is_empty() {
            return Err(DemError::EmptySourceList);
        }
        Ok(Self { sources })
    }

    /// A list with one source.
    pub fn single(source: TileSource) -> Self {
        Self {
            sources: vec![source],
        }
    }

    /// DEM5A, then DEM5B.
    pub fn gsi_dem5() -> Self {
        Self {
            sources: vec![TileSource::gsi_dem5a(), TileSource::gsi_dem5b()],
        }
    }

    /// DEM10B.
    pub fn gsi_dem10() -> Self {
        Self::single(TileSource::gsi_dem10b())
    }

    /// Sources in priority order.
    pub fn iter(&self) -> std::slice::Iter<'_, TileSource> {
        self.sources.iter()
    }

    /// Number of sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Never true for a constructed list.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Source names in priority order.
    pub fn names(&self) -> Vec<&str> {
        self.sources.iter().map(TileSource::name).collect()
    }
}

impl<'a> IntoIterator for &'a SourceList {
    type Item = &'a TileSource;
    type IntoIter = std::slice::Iter<'a, TileSource>;

    fn into_iter(self) -> Self::IntoIter {
        self.sources.iter()
    }
}

impl fmt::Display for SourceList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for() {
        let tile = TileIndex { zoom: 15, x: 29396, y: 12123 };
        assert_eq!(
            TileSource::gsi_dem5a().url_for(&tile),
            "https://cyberjapandata.gsi.go.jp/xyz/dem5a/15/29396/12123.txt"
        );
        assert_eq!(
            TileSource::gsi_dem10b().url_for(&TileIndex { zoom: 14, x: 14698, y: 6061 }),
            "https://cyberjapandata.gsi.go.jp/xyz/dem/14/14698/6061.txt"
        );
    }

    #[test]
    fn test_source_validation() {
        assert!(TileSource::new("local", "mem://dem/{z}/{x}/{y}.txt").is_ok());
        assert!(matches!(
            TileSource::new("local", "mem://dem/{z}/{x}.txt"),
            Err(DemError::InvalidSource { .. })
        ));
        assert!(TileSource::new("  ", "mem://dem/{z}/{x}/{y}.txt").is_err());
    }

    #[test]
    fn test_source_list_order() {
        let list = SourceList::gsi_dem5();
        assert_eq!(list.names(), vec!["DEM5A", "DEM5B"]);
        assert_eq!(list.to_string(), "DEM5A, DEM5B");
        assert_eq!(SourceList::gsi_dem10().len(), 1);
        assert!(matches!(SourceList::new(vec![]), Err(DemError::EmptySourceList)));
    }
}
