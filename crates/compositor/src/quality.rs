use serde::{Deserialize, Serialize};

/// Rendering quality tier; decides interpolation stride and filtering.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapQuality {
    Outline,
    /// Every other scanline is a copy of the one above it.
    Low,
    #[default]
    Normal,
    High,
    /// Every pixel computed exactly.
    Print,
}

impl MapQuality {
    /// Bilinear filtering of samples.
    pub fn is_smooth(self) -> bool {
        matches!(self, MapQuality::High | MapQuality::Print)
    }

    pub fn duplicates_scanlines(self) -> bool {
        self == MapQuality::Low
    }
}
