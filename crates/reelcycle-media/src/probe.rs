//! FFprobe media information.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Frame rate assumed when a stream reports none.
pub const FALLBACK_FPS: f64 = 30.0;

/// Media file information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Duration in seconds, when the container or a stream reports one
    pub duration: Option<f64>,
    /// First video stream, if any
    pub video: Option<VideoStreamInfo>,
    /// Whether at least one audio stream exists
    pub has_audio: bool,
}

/// Properties of the first video stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoStreamInfo {
    pub width: u32,
    pub height: u32,
    /// Frame rate (fps)
    pub fps: f64,
    pub codec: String,
}

impl MediaInfo {
    /// Video properties, or an error for audio-only / image-less files.
    pub fn require_video(&self) -> MediaResult<&VideoStreamInfo> {
        self.video
            .as_ref()
            .ok_or_else(|| MediaError::InvalidVideo("No video stream found".to_string()))
    }

    /// Duration only when it is meaningfully positive.
    pub fn usable_duration(&self) -> Option<f64> {
        self.duration.filter(|d| d.is_finite() && *d > 0.05)
    }
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
}

/// Probe a media file.
pub async fn probe_media(path: impl AsRef<Path>) -> MediaResult<MediaInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::ffprobe_failed(
            path,
            format!("ffprobe exited with {}", output.status),
            Some(String::from_utf8_lossy(&output.stderr).into_owned()),
        ));
    }

    parse_probe_output(&output.stdout)
}

/// Interpret FFprobe's JSON document.
pub fn parse_probe_output(stdout: &[u8]) -> MediaResult<MediaInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let is_kind = |s: &&FfprobeStream, kind: &str| s.codec_type.as_deref() == Some(kind);

    let video = probe
        .streams
        .iter()
        .find(|s| is_kind(s, "video"))
        .map(|s| VideoStreamInfo {
            width: s.width.unwrap_or(0),
            height: s.height.unwrap_or(0),
            fps: s
                .r_frame_rate
                .as_deref()
                .and_then(parse_frame_rate)
                .unwrap_or(FALLBACK_FPS),
            codec: s.codec_name.clone().unwrap_or_default(),
        });

    let has_audio = probe.streams.iter().any(|s| is_kind(&s, "audio"));

    // Container duration first, then the first stream that reports one
    let duration = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .or_else(|| {
            probe
                .streams
                .iter()
                .find_map(|s| s.duration.as_deref().and_then(|d| d.parse::<f64>().ok()))
        });

    Ok(MediaInfo {
        duration,
        video,
        has_audio,
    })
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 && num > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse::<f64>().ok().filter(|fps| *fps > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("0/0").is_none());
    }

    #[test]
    fn test_parse_video_with_audio() {
        let json = br#"{
            "streams": [
                {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080, "r_frame_rate": "25/1"},
                {"codec_type": "audio", "codec_name": "aac"}
            ],
            "format": {"duration": "12.480000"}
        }"#;
        let info = parse_probe_output(json).unwrap();
        let video = info.require_video().unwrap();
        assert_eq!((video.width, video.height), (1920, 1080));
        assert!((video.fps - 25.0).abs() < 1e-9);
        assert!(info.has_audio);
        assert_eq!(info.duration, Some(12.48));
    }

    #[test]
    fn test_parse_silent_clip() {
        let json = br#"{"streams": [{"codec_type": "video", "width": 720, "height": 1280, "r_frame_rate": "0/0"}], "format": {}}"#;
        let info = parse_probe_output(json).unwrap();
        assert!(!info.has_audio);
        assert_eq!(info.require_video().unwrap().fps, FALLBACK_FPS);
        assert_eq!(info.duration, None);
    }

    #[test]
    fn test_duration_falls_back_to_stream() {
        let json = br#"{"streams": [{"codec_type": "audio", "duration": "4.200000"}], "format": {"duration": "N/A"}}"#;
        let info = parse_probe_output(json).unwrap();
        assert!(info.video.is_none());
        assert!(info.require_video().is_err());
        assert_eq!(info.usable_duration(), Some(4.2));
    }

    #[test]
    fn test_usable_duration_rejects_tiny() {
        let info = MediaInfo {
            duration: Some(0.01),
            video: None,
            has_audio: true,
        };
        assert_eq!(info.usable_duration(), None);
    }

    #[test]
    fn test_parse_garbage_is_error() {
        assert!(parse_probe_output(b"not json").is_err());
    }
}
