use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GifStampError, Result};
use crate::ops::timestamp::{DEFAULT_PATTERN, validate_pattern};

/// When the overlay clock is sampled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimestampMode {
    /// Each frame reads the clock as it is rendered, so an animation rendered
    /// across a minute boundary can show two different times.
    #[default]
    PerFrame,
    /// One reading before the first frame, shared by all frames.
    Shared,
}

/// Overlay settings. Every field has a default, so a TOML file only needs
/// the keys it changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OverlayConfig {
    /// Pixel size of the timestamp text.
    pub font_size: f32,
    /// RGBA.
    pub text_color: [u8; 4],
    /// chrono `strftime` pattern.
    pub timestamp_pattern: String,
    /// Fractional point of the text box pinned to the frame centre.
    pub anchor_alignment: [f32; 2],
    pub timestamp_mode: TimestampMode,
    /// Render frames on the rayon pool.
    pub parallel: bool,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            font_size: 16.0,
            text_color: [0, 0, 0, 255],
            timestamp_pattern: DEFAULT_PATTERN.to_string(),
            anchor_alignment: [0.5, 0.5],
            timestamp_mode: TimestampMode::PerFrame,
            parallel: false,
        }
    }
}

impl OverlayConfig {
    pub fn from_toml_str(src: &str) -> Result<Self> {
        let config: OverlayConfig =
            toml::from_str(src).map_err(|e| GifStampError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let src = std::fs::read_to_string(path).map_err(|e| {
            GifStampError::Config(format!("could not read '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&src)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.font_size.is_finite() || self.font_size <= 0.0 {
            return Err(GifStampError::Config(format!(
                "font_size must be positive, got {}",
                self.font_size
            )));
        }
        if self.anchor_alignment.iter().any(|a| !(0.0..=1.0).contains(a)) {
            return Err(GifStampError::Config(format!(
                "anchor_alignment must lie in [0, 1], got {:?}",
                self.anchor_alignment
            )));
        }
        validate_pattern(&self.timestamp_pattern)
    }

    pub fn alignment(&self) -> (f32, f32) {
        (self.anchor_alignment[0], self.anchor_alignment[1])
    }
}

/// Parse `RRGGBB` or `RRGGBBAA`, with or without a leading `#`.
pub fn parse_color(s: &str) -> Result<[u8; 4]> {
    let hex = s.trim().trim_start_matches('#');
    let bad = || GifStampError::Config(format!("invalid colour '{}'", s));
    if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
        return Err(bad());
    }
    let mut out = [0, 0, 0, 255];
    for (i, slot) in out.iter_mut().take(hex.len() / 2).enumerate() {
        *slot = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| bad())?;
    }
    Ok(out)
}

/// Parse `AX,AY`, e.g. `0.5,0.5`.
pub fn parse_alignment(s: &str) -> Result<[f32; 2]> {
    let bad = || GifStampError::Config(format!("invalid anchor '{}', expected AX,AY", s));
    let (ax, ay) = s.split_once(',').ok_or_else(bad)?;
    let ax: f32 = ax.trim().parse().map_err(|_| bad())?;
    let ay: f32 = ay.trim().parse().map_err(|_| bad())?;
    Ok([ax, ay])
}
