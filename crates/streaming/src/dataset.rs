use foundation::{MAX_ZOOM, TileGrid, TileId};
use serde::{Deserialize, Serialize};

/// Descriptor of a tiled dataset: its grid and the zoom levels it provides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileDataset {
    pub name: String,

    #[serde(default)]
    pub grid: TileGrid,

    /// Levels present in the dataset. May be sparse and unsorted.
    #[serde(default)]
    pub levels: Vec<u8>,

    /// Remote location of a tile with `{z}`, `{x}` and `{y}` placeholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_template: Option<String>,
}

impl TileDataset {
    pub fn new(name: impl Into<String>, grid: TileGrid, levels: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            grid,
            levels,
            url_template: None,
        }
    }

    /// Largest supported level not above `desired`; the lowest supported level
    /// when `desired` is below all of them. `None` if the dataset has no levels.
    /// Levels deeper than `MAX_ZOOM` are ignored.
    pub fn resolve_level(&self, desired: u8) -> Option<u8> {
        let mut levels: Vec<u8> = self
            .levels
            .iter()
            .copied()
            .filter(|&level| level <= MAX_ZOOM)
            .collect();
        levels.sort_unstable();
        levels.dedup();

        let mut resolved = *levels.first()?;
        for level in levels {
            if level > desired {
                break;
            }
            resolved = level;
        }
        Some(resolved)
    }

    /// Storage path of a tile relative to the cache root.
    pub fn relative_path(&self, id: TileId) -> String {
        format!("{}/{}/{}/{}.png", self.name, id.zoom, id.x, id.y)
    }

    pub fn source_url(&self, id: TileId) -> Option<String> {
        self.url_template.as_ref().map(|t| {
            t.replace("{z}", &id.zoom.to_string())
                .replace("{x}", &id.x.to_string())
                .replace("{y}", &id.y.to_string())
        })
    }
}
