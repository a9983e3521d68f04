//! Fixed visual-treatment palettes rotated across cycles.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named color-grade filter chain, applied verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookProfile {
    pub name: String,
    /// FFmpeg filter chain, e.g. `eq=contrast=1.15:saturation=1.2`
    pub filter: String,
}

impl LookProfile {
    pub fn new(name: impl Into<String>, filter: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filter: filter.into(),
        }
    }
}

/// Linear RGB multipliers in 0.0-1.0, as consumed by `colorchannelmixer`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

/// Overlay tint color written as `#RRGGBB`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TintColor(pub String);

impl TintColor {
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// Parse the hex string. Returns `None` for anything that is not six hex digits.
    pub fn to_rgb(&self) -> Option<Rgb> {
        let s = self.0.trim().trim_start_matches('#');
        if s.len() != 6 || !s.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&s[range], 16)
                .ok()
                .map(|v| f64::from(v) / 255.0)
        };
        Some(Rgb {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }
}

impl fmt::Display for TintColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Digital zoom and playback speed applied together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedZoomPreset {
    pub name: String,
    pub zoom: f64,
    pub speed: f64,
}

impl SpeedZoomPreset {
    pub fn new(name: impl Into<String>, zoom: f64, speed: f64) -> Self {
        Self {
            name: name.into(),
            zoom,
            speed,
        }
    }

    /// No zoom, native speed. Used when the preset palette is empty.
    pub fn identity() -> Self {
        Self::new("none", 1.0, 1.0)
    }
}

/// All palettes the selector rotates through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Palettes {
    pub looks: Vec<LookProfile>,
    pub tints: Vec<TintColor>,
    pub presets: Vec<SpeedZoomPreset>,
}

impl Default for Palettes {
    fn default() -> Self {
        Self {
            looks: vec![
                LookProfile::new("clean", "eq=contrast=1.15:saturation=1.2:brightness=0.03"),
                LookProfile::new("warm", "colorbalance=rs=0.05:gs=0.03:bs=-0.06"),
                LookProfile::new("cool", "colorbalance=rs=-0.05:gs=-0.02:bs=0.06"),
                LookProfile::new("soft", "gblur=sigma=1.5"),
                LookProfile::new("crisp", "unsharp=5:5:1.5:5:5:0.0"),
                LookProfile::new("matte", "eq=contrast=0.9:saturation=0.85:gamma=1.1"),
                LookProfile::new("grain", "noise=alls=8:allf=t"),
            ],
            tints: [
                "#00C2FF", "#FF4D6D", "#22C55E", "#F59E0B", "#A855F7", "#14B8A6", "#EF4444",
            ]
            .into_iter()
            .map(TintColor::new)
            .collect(),
            presets: vec![
                SpeedZoomPreset::new("A", 1.08, 1.03),
                SpeedZoomPreset::new("B", 1.10, 1.05),
                SpeedZoomPreset::new("C", 1.06, 1.07),
                SpeedZoomPreset::new("D", 1.12, 1.02),
                SpeedZoomPreset::new("E", 1.09, 1.06),
                SpeedZoomPreset::new("F", 1.07, 1.04),
                SpeedZoomPreset::new("G", 1.11, 1.03),
            ],
        }
    }
}

impl Palettes {
    /// Palettes with nothing to rotate; every selection falls back.
    pub fn empty() -> Self {
        Self {
            looks: Vec::new(),
            tints: Vec::new(),
            presets: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tint_parse() {
        let rgb = TintColor::new("#FF4D6D").to_rgb().unwrap();
        assert!((rgb.r - 1.0).abs() < 1e-9);
        assert!((rgb.g - 77.0 / 255.0).abs() < 1e-9);
        assert!((rgb.b - 109.0 / 255.0).abs() < 1e-9);

        assert!(TintColor::new("00c2ff").to_rgb().is_some());
    }

    #[test]
    fn test_tint_parse_rejects_malformed() {
        assert!(TintColor::new("").to_rgb().is_none());
        assert!(TintColor::new("#FFF").to_rgb().is_none());
        assert!(TintColor::new("#GG0000").to_rgb().is_none());
        assert!(TintColor::new("#ÿÿÿ").to_rgb().is_none());
    }

    #[test]
    fn test_default_palettes_have_seven_entries() {
        let palettes = Palettes::default();
        assert_eq!(palettes.looks.len(), 7);
        assert_eq!(palettes.tints.len(), 7);
        assert_eq!(palettes.presets.len(), 7);
        assert!(palettes.tints.iter().all(|t| t.to_rgb().is_some()));
    }
}
