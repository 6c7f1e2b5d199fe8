use serde::{Deserialize, Serialize};

use crate::canvas::rgb;
use crate::quality::MapQuality;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositorConfig {
    #[serde(default)]
    pub quality: MapQuality,

    /// Duplicate every other scanline regardless of quality.
    #[serde(default)]
    pub interlaced: bool,

    /// Color outside the globe.
    #[serde(default = "default_background")]
    pub background: u32,

    /// Color of texels whose tile is not resident.
    #[serde(default = "default_fallback")]
    pub fallback_color: u32,
}

fn default_background() -> u32 {
    rgb(0, 0, 0)
}

fn default_fallback() -> u32 {
    rgb(0x80, 0x80, 0x80)
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            quality: MapQuality::default(),
            interlaced: false,
            background: default_background(),
            fallback_color: default_fallback(),
        }
    }
}
