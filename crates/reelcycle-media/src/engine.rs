//! The external transcoding engine as a trait object.
//!
//! Everything that spawns FFmpeg or FFprobe goes through [`MediaEngine`] so the
//! renderer and assembler can be driven by a recording fake in tests.

use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

use crate::command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::probe::{probe_media, MediaInfo};

#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Run one blocking engine invocation. Non-zero exit is an error carrying diagnostics.
    async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()>;

    /// Introspect a media file.
    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo>;
}

/// The real FFmpeg/FFprobe pair.
#[derive(Debug, Clone, Default)]
pub struct FfmpegEngine {
    runner: FfmpegRunner,
}

impl FfmpegEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail early when either binary is missing from `PATH`.
    pub fn check_available() -> MediaResult<()> {
        let ffmpeg = check_ffmpeg()?;
        let ffprobe = check_ffprobe()?;
        debug!(ffmpeg = %ffmpeg.display(), ffprobe = %ffprobe.display(), "Media engine available");
        Ok(())
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        let output = cmd.output_path().display().to_string();
        self.runner
            .run_with_progress(cmd, move |progress| {
                debug!(
                    output = %output,
                    frame = progress.frame,
                    out_time = %progress.out_time,
                    speed = progress.speed,
                    done = progress.is_complete,
                    "FFmpeg progress"
                );
            })
            .await
    }

    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo> {
        probe_media(path).await
    }
}
