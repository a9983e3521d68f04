//! Video encoding configuration.

use serde::{Deserialize, Serialize};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "veryfast";
/// Default CRF (Constant Rate Factor)
pub const DEFAULT_CRF: u8 = 18;
/// Keyframe interval in frames
pub const DEFAULT_GOP: u32 = 30;
/// Audio sample rate every segment is conformed to
pub const AUDIO_SAMPLE_RATE: u32 = 48_000;
/// Audio channel layout every segment is conformed to
pub const AUDIO_CHANNEL_LAYOUT: &str = "stereo";
/// Channel count matching [`AUDIO_CHANNEL_LAYOUT`]
pub const AUDIO_CHANNELS: u8 = 2;

/// Video encoding configuration.
///
/// Every intermediate segment and every final rendition is written with the
/// same settings so the assembler only ever concatenates uniform inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingConfig {
    /// Video codec (e.g., "libx264")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Encoding preset (e.g., "veryfast", "medium")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant Rate Factor (quality, 0-51, lower is better)
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Maximum consecutive B-frames. Zero avoids a black first frame after concat.
    #[serde(default)]
    pub b_frames: u8,

    /// GOP length in frames
    #[serde(default = "default_gop")]
    pub gop: u32,

    /// Audio codec
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Audio sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Audio channel count
    #[serde(default = "default_channels")]
    pub channels: u8,

    /// Additional FFmpeg output arguments
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_crf() -> u8 {
    DEFAULT_CRF
}
fn default_gop() -> u32 {
    DEFAULT_GOP
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_sample_rate() -> u32 {
    AUDIO_SAMPLE_RATE
}
fn default_channels() -> u8 {
    AUDIO_CHANNELS
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            crf: DEFAULT_CRF,
            b_frames: 0,
            gop: DEFAULT_GOP,
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            sample_rate: AUDIO_SAMPLE_RATE,
            channels: AUDIO_CHANNELS,
            extra_args: Vec::new(),
        }
    }
}

impl EncodingConfig {
    /// Returns a new config with updated CRF.
    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = crf;
        self
    }

    /// Returns a new config with updated preset.
    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    /// Convert to FFmpeg output arguments.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-bf".to_string(),
            self.b_frames.to_string(),
            "-g".to_string(),
            self.gop.to_string(),
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-ar".to_string(),
            self.sample_rate.to_string(),
            "-ac".to_string(),
            self.channels.to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
        ];

        args.extend(self.extra_args.clone());

        args
    }
}
