// THEORY:
// Quality only changes how a tile is resampled, never where blocks are. Each
// level names an intermediate resolution factor and a resampling filter. A tile
// is first resampled to `target * factor` (capped at the source size) and then
// down to the exact block size, so higher levels average more source detail into
// every tile pixel. All levels stay two separable convolutions per tile; the
// factor changes constants, not the complexity class.
//
// `RecolorMode` picks how a tile is pulled toward its block's color. `Shift`
// adds a per-channel delta; `Scale` multiplies by a per-channel ratio, which
// keeps dark areas of the miniature dark at the cost of a less exact mean.

use crate::error::MosaicError;
use fast_image_resize::{FilterType, ResizeAlg};
use std::fmt;
use std::str::FromStr;

/// Tile-generation quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QualityLevel {
    Low,
    #[default]
    Normal,
    High,
    Ultra,
}

impl QualityLevel {
    pub const ALL: [QualityLevel; 4] = [Self::Low, Self::Normal, Self::High, Self::Ultra];

    /// Multiple of the target size used as the intermediate resolution.
    pub fn intermediate_factor(self) -> u32 {
        match self {
            Self::Low => 1,
            Self::Normal => 2,
            Self::High => 4,
            Self::Ultra => 8,
        }
    }

    pub fn resize_alg(self) -> ResizeAlg {
        match self {
            Self::Low => ResizeAlg::Convolution(FilterType::Bilinear),
            _ => ResizeAlg::Convolution(FilterType::Lanczos3),
        }
    }

    /// Intermediate size for a tile of `target` cut from a `source`-sized image.
    /// Returns `None` when resampling straight to the target is enough.
    pub fn intermediate_size(self, source: (u32, u32), target: (u32, u32)) -> Option<(u32, u32)> {
        let factor = self.intermediate_factor();
        if factor <= 1 {
            return None;
        }
        let w = target.0.saturating_mul(factor).min(source.0).max(target.0);
        let h = target.1.saturating_mul(factor).min(source.1).max(target.1);
        if (w, h) == target || (w, h) == source {
            None
        } else {
            Some((w, h))
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Ultra => "ultra",
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityLevel {
    type Err = MosaicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "normal" | "medium" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "ultra" => Ok(Self::Ultra),
            _ => Err(MosaicError::invalid(format!(
                "unknown quality level {s:?}, use: low, normal, high, ultra"
            ))),
        }
    }
}

/// How a resampled tile is pulled toward its block's average color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RecolorMode {
    /// Add `target - tile_mean` to every channel.
    #[default]
    Shift,
    /// Multiply every channel by `target / max(1, tile_mean)`.
    Scale,
}

impl fmt::Display for RecolorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shift => f.write_str("shift"),
            Self::Scale => f.write_str("scale"),
        }
    }
}

impl FromStr for RecolorMode {
    type Err = MosaicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "shift" => Ok(Self::Shift),
            "scale" => Ok(Self::Scale),
            _ => Err(MosaicError::invalid(format!(
                "unknown recolor mode {s:?}, use: shift, scale"
            ))),
        }
    }
}
