//! Render target and overlay settings shared by every segment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::encoding::EncodingConfig;

/// Default vertical target width.
pub const DEFAULT_TARGET_WIDTH: u32 = 1080;
/// Default vertical target height.
pub const DEFAULT_TARGET_HEIGHT: u32 = 1920;
/// Default forced frame rate.
pub const DEFAULT_FPS: f64 = 30.0;

/// How a source frame is conformed to the target geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleMode {
    /// Preserve aspect ratio and pad (letterbox) to the target
    #[default]
    Fit,
    /// Scale up and crop to the target
    Fill,
}

impl ScaleMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScaleMode::Fit => "fit",
            ScaleMode::Fill => "fill",
        }
    }
}

impl fmt::Display for ScaleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScaleMode {
    type Err = ScaleModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fit" => Ok(ScaleMode::Fit),
            "fill" => Ok(ScaleMode::Fill),
            _ => Err(ScaleModeParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown scale mode: {0} (expected \"fit\" or \"fill\")")]
pub struct ScaleModeParseError(String);

/// Target frame geometry and rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetGeometry {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

impl Default for TargetGeometry {
    fn default() -> Self {
        Self {
            width: DEFAULT_TARGET_WIDTH,
            height: DEFAULT_TARGET_HEIGHT,
            fps: DEFAULT_FPS,
        }
    }
}

impl TargetGeometry {
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        Self { width, height, fps }
    }

    /// Same frame size with a different rate.
    pub fn with_fps(self, fps: f64) -> Self {
        Self { fps, ..self }
    }
}

/// Pure-black removal applied to overlay images.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorKey {
    pub enabled: bool,
    /// colorkey similarity (0.0-1.0)
    pub similarity: f64,
    /// colorkey blend (0.0-1.0)
    pub blend: f64,
}

impl Default for ColorKey {
    fn default() -> Self {
        Self {
            enabled: true,
            similarity: 0.08,
            blend: 0.0,
        }
    }
}

/// Everything the compositor and renderer need besides per-segment inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Frame size; `fps` here is the forced rate, see [`RenderSettings::force_fps`].
    pub geometry: TargetGeometry,
    /// When false the first clip's detected rate is used instead of `geometry.fps`.
    pub force_fps: bool,
    pub scale_mode: ScaleMode,
    pub color_key: ColorKey,
    /// Folder overlay tint strength (0.0-1.0)
    pub tint_strength: f64,
    /// Seconds from segment start before the banner becomes visible
    pub banner_delay: f64,
    /// Leading slice skipped in the intro to avoid a black first frame
    pub intro_lead_trim: f64,
    /// Intro length when the narration duration cannot be determined
    pub intro_fallback_duration: f64,
    pub encoding: EncodingConfig,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            geometry: TargetGeometry::default(),
            force_fps: true,
            scale_mode: ScaleMode::Fit,
            color_key: ColorKey::default(),
            tint_strength: 0.85,
            banner_delay: 0.0,
            intro_lead_trim: 0.1,
            intro_fallback_duration: 3.0,
            encoding: EncodingConfig::default(),
        }
    }
}

impl RenderSettings {
    /// Resolve the frame rate for a folder given its first clip's detected rate.
    pub fn effective_fps(&self, detected: f64) -> f64 {
        if self.force_fps && self.geometry.fps > 0.0 {
            self.geometry.fps
        } else if detected > 0.0 {
            detected
        } else {
            DEFAULT_FPS
        }
    }

    /// Tint strength clamped into 0.0-1.0.
    pub fn clamped_tint_strength(&self) -> f64 {
        self.tint_strength.clamp(0.0, 1.0)
    }
}
