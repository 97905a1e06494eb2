//! Host-facing scan configuration.
//!
//! The option layer of the backend resolves a user's request into this
//! structure; the calibration layer only uses it to derive the cache key.

use crate::model::ScanParams;
use serde::{Deserialize, Serialize};

/// Physical scan path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanMethod {
    Flatbed,
    Transparency,
}

/// Requested color interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorMode {
    Lineart,
    Gray,
    Color,
}

impl ColorMode {
    /// Color channels delivered per pixel.
    pub fn channels(self) -> u32 {
        match self {
            ColorMode::Lineart | ColorMode::Gray => 1,
            ColorMode::Color => 3,
        }
    }
}

/// One scan request as seen by the calibration layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSettings {
    /// Resolution in dots per inch.
    pub resolution: u32,
    pub mode: ColorMode,
    /// Bits per channel.
    pub depth: u32,
    pub method: ScanMethod,
}

impl ScanSettings {
    /// Resolve this request into the calibration cache key.
    ///
    /// `pixels` and `lines` come from the computed scan geometry, which
    /// depends on the resolution and scan area handled by the device layer.
    pub fn cache_params(&self, pixels: u32, lines: u32) -> ScanParams {
        ScanParams {
            channels: self.mode.channels(),
            depth: self.depth,
            lines,
            pixels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_mode_channel_counts() {
        assert_eq!(ColorMode::Lineart.channels(), 1);
        assert_eq!(ColorMode::Gray.channels(), 1);
        assert_eq!(ColorMode::Color.channels(), 3);
    }

    #[test]
    fn test_cache_params_from_request() {
        let settings = ScanSettings {
            resolution: 600,
            mode: ColorMode::Color,
            depth: 16,
            method: ScanMethod::Flatbed,
        };

        let params = settings.cache_params(5100, 7000);
        assert_eq!(params.channels, 3);
        assert_eq!(params.depth, 16);
        assert_eq!(params.pixels, 5100);
        assert_eq!(params.lines, 7000);
    }

    #[test]
    fn test_settings_json_roundtrip() {
        let settings = ScanSettings {
            resolution: 300,
            mode: ColorMode::Gray,
            depth: 8,
            method: ScanMethod::Transparency,
        };

        let json = serde_json::to_string(&settings).unwrap();
        let back: ScanSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }
}
