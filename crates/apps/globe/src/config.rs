use std::path::Path;

use anyhow::Context;
use compositor::CompositorConfig;
use foundation::{TileGrid, TileProjection};
use serde::{Deserialize, Serialize};
use streaming::{SchedulerConfig, TileCacheConfig, TileDataset};

/// Everything the `globe` binary can be configured with, as read from a JSON
/// file. Missing sections fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobeConfig {
    #[serde(default = "default_dataset")]
    pub dataset: TileDataset,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub cache: TileCacheConfig,

    #[serde(default)]
    pub compositor: CompositorConfig,
}

impl Default for GlobeConfig {
    fn default() -> Self {
        Self {
            dataset: default_dataset(),
            scheduler: SchedulerConfig::default(),
            cache: TileCacheConfig::default(),
            compositor: CompositorConfig::default(),
        }
    }
}

fn default_dataset() -> TileDataset {
    let grid = TileGrid {
        level_zero_columns: 2,
        level_zero_rows: 1,
        tile_width: 256,
        tile_height: 256,
        projection: TileProjection::Equirectangular,
    };
    TileDataset::new("procedural", grid, (0..=8).collect())
}

impl GlobeConfig {
    /// Reads the config from `path`, or returns the defaults when no path is
    /// given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::GlobeConfig;
    use compositor::MapQuality;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_path_gives_defaults() {
        let config = GlobeConfig::load(None).expect("defaults");
        assert_eq!(config, GlobeConfig::default());
        assert_eq!(config.dataset.name, "procedural");
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let json = r#"{
            "scheduler": { "active_jobs_limit": 2 },
            "compositor": { "quality": "print" },
            "dataset": { "name": "osm", "levels": [0, 1, 2],
                         "url_template": "https://tiles.example.org/{z}/{x}/{y}.png" }
        }"#;
        let config: GlobeConfig = serde_json::from_str(json).expect("parse");
        assert_eq!(config.scheduler.active_jobs_limit, 2);
        assert_eq!(config.scheduler.queue_limit, 1000);
        assert_eq!(config.compositor.quality, MapQuality::Print);
        assert_eq!(config.dataset.levels, vec![0, 1, 2]);
        assert_eq!(config.cache.eviction_scale, 2.0);
    }

    #[test]
    fn unreadable_file_reports_path() {
        let err = GlobeConfig::load(Some(std::path::Path::new("/nonexistent/globe.json")))
            .expect_err("missing file");
        assert!(format!("{err:#}").contains("/nonexistent/globe.json"));
    }
}
