//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

use crate::graph::GraphError;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}\ncommand: {command}\n{}", .stderr.as_deref().unwrap_or(""))]
    FfmpegFailed {
        message: String,
        command: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe failed for {path}: {message}")]
    FfprobeFailed {
        path: PathBuf,
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("Invalid filter graph: {0}")]
    Graph(#[from] GraphError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        command: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            command: command.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an FFprobe failure error.
    pub fn ffprobe_failed(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        stderr: Option<String>,
    ) -> Self {
        Self::FfprobeFailed {
            path: path.into(),
            message: message.into(),
            stderr,
        }
    }

    /// Whether the external engine itself is missing.
    pub fn is_missing_binary(&self) -> bool {
        matches!(self, MediaError::FfmpegNotFound | MediaError::FfprobeNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffmpeg_failed_display_includes_diagnostics() {
        let err = MediaError::ffmpeg_failed(
            "exit status 1",
            "ffmpeg -y -i in.mp4 out.mp4",
            Some("in.mp4: No such file or directory".to_string()),
            Some(1),
        );
        let text = err.to_string();
        assert!(text.contains("ffmpeg -y -i in.mp4 out.mp4"));
        assert!(text.contains("No such file or directory"));
    }

    #[test]
    fn test_missing_binary() {
        assert!(MediaError::FfprobeNotFound.is_missing_binary());
        assert!(!MediaError::InvalidVideo("x".into()).is_missing_binary());
    }
}
