//! Segment rendering.
//!
//! Turns segment specs into files on disk through the [`MediaEngine`]. A failed
//! render is returned to the caller unchanged; there is no retry. Frame
//! extraction for the call-to-action segment is best effort.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use reelcycle_models::{SegmentRole, TargetGeometry};

use crate::command::{FfmpegCommand, FfmpegInput};
use crate::compositor::{Compositor, SegmentSpec};
use crate::engine::MediaEngine;
use crate::error::MediaResult;

/// Offset from the end of a clip used when grabbing its last frame.
const LAST_FRAME_OFFSET: f64 = 0.1;
/// Seek used for the first frame; falls back to 0 for very short clips.
/// A segment file ready for assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSegment {
    pub role: SegmentRole,
    pub path: PathBuf,
}

/// Executes segment recipes.
#[derive(Clone)]
pub struct SegmentRenderer {
    engine: Arc<dyn MediaEngine>,
    compositor: Compositor,
}

impl SegmentRenderer {
    pub fn new(engine: Arc<dyn MediaEngine>, compositor: Compositor) -> Self {
        Self { engine, compositor }
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn engine(&self) -> &Arc<dyn MediaEngine> {
        &self.engine
    }

    /// Compose and render one segment to `output`.
    pub async fn render(&self, spec: &SegmentSpec, output: &Path) -> MediaResult<RenderedSegment> {
        let recipe = self.compositor.compose(spec)?;
        let cmd = recipe.to_command(output, &self.compositor.settings().encoding);

        debug!(
            segment = %spec.role,
            output = %output.display(),
            inputs = recipe.inputs.len(),
            "Rendering segment"
        );
        let started = Instant::now();
        self.engine.run(&cmd).await?;

        metrics::counter!("reelcycle_segments_rendered_total", "role" => role_label(spec.role))
            .increment(1);
        metrics::histogram!("reelcycle_segment_render_seconds").record(started.elapsed().as_secs_f64());

        Ok(RenderedSegment {
            role: spec.role,
            path: output.to_path_buf(),
        })
    }

    /// Grab the last frame of `video` as an image. Failures are logged and reported as `false`.
    pub async fn extract_last_frame(&self, video: &Path, frame: &Path) -> bool {
        let cmd = FfmpegCommand::new(frame)
            .input(FfmpegInput::file(video).seek_from_end(LAST_FRAME_OFFSET))
            .output_args(["-q:v", "2", "-update", "1"])
            .single_frame();

        if let Err(e) = self.engine.run(&cmd).await {
            warn!(video = %video.display(), "Last frame extraction failed: {}", e);
            return false;
        }
        let exists = tokio::fs::try_exists(frame).await.unwrap_or(false);
        if !exists {
            warn!(video = %video.display(), "Last frame extraction produced no image");
        }
        exists
    }

    /// Grab frame 0 of `video` as a still.
    pub async fn extract_first_frame(&self, video: &Path, frame: &Path) -> MediaResult<()> {
        let cmd = FfmpegCommand::new(frame)
            .input(FfmpegInput::file(video))
            .output_args(["-q:v", "2"])
            .single_frame();
        self.engine.run(&cmd).await
    }

    /// Render the call-to-action segment from the last frame of `last_body`.
    ///
    /// Returns `Ok(None)` when the segment cannot be produced; the sequence
    /// is then assembled without it.
    pub async fn render_pre_outro(
        &self,
        last_body: &Path,
        narration: Option<&Path>,
        scratch: &Path,
        geometry: TargetGeometry,
    ) -> MediaResult<Option<RenderedSegment>> {
        let Some(narration) = narration else {
            debug!("No call-to-action narration configured");
            return Ok(None);
        };
        if !tokio::fs::try_exists(narration).await.unwrap_or(false) {
            warn!(narration = %narration.display(), "Call-to-action narration not found, skipping segment");
            return Ok(None);
        }

        let frame = scratch.join("last_frame_for_cta.png");
        if !self.extract_last_frame(last_body, &frame).await {
            warn!("Skipping call-to-action segment");
            return Ok(None);
        }

        let spec = self.compositor.pre_outro_spec(&frame, narration, geometry);
        match self.render(&spec, &scratch.join("norm_99_pre_outro.mp4")).await {
            Ok(rendered) => {
                info!(segment = %rendered.role, "Call-to-action segment rendered");
                Ok(Some(rendered))
            }
            Err(e) if e.is_missing_binary() => Err(e),
            Err(e) => {
                warn!("Call-to-action render failed, skipping segment: {}", e);
                Ok(None)
            }
        }
    }
}

fn role_label(role: SegmentRole) -> &'static str {
    match role {
        SegmentRole::Intro => "intro",
        SegmentRole::Body(_) => "body",
        SegmentRole::PreOutro => "pre_outro",
        SegmentRole::Outro => "outro",
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::error::MediaError;
    use crate::probe::MediaInfo;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Engine double that records invocations and writes placeholder outputs.
    #[derive(Default)]
    pub struct RecordingEngine {
        pub commands: Mutex<Vec<Vec<String>>>,
        /// Fail any invocation whose arguments contain this text
        pub fail_on: Option<String>,
        /// Succeed without writing the output file
        pub skip_output: bool,
    }

    impl RecordingEngine {
        pub fn failing_on(needle: &str) -> Self {
            Self {
                fail_on: Some(needle.to_string()),
                ..Default::default()
            }
        }

        pub fn calls(&self) -> Vec<Vec<String>> {
            self.commands.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MediaEngine for RecordingEngine {
        async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
            let args = cmd.build_args();
            self.commands.lock().unwrap().push(args.clone());
            if let Some(needle) = &self.fail_on {
                if args.iter().any(|a| a.contains(needle.as_str())) {
                    return Err(MediaError::ffmpeg_failed(
                        "FFmpeg exited with exit status: 1",
                        cmd.to_command_line(),
                        Some("Invalid data found when processing input".to_string()),
                        Some(1),
                    ));
                }
            }
            if !self.skip_output {
                std::fs::write(cmd.output_path(), b"media")?;
            }
            Ok(())
        }

        async fn probe(&self, _path: &Path) -> MediaResult<MediaInfo> {
            Ok(MediaInfo {
                duration: Some(4.0),
                video: None,
                has_audio: true,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingEngine;
    use super::*;
    use crate::compositor::ClipSource;
    use reelcycle_models::RenderSettings;
    use tempfile::TempDir;

    fn renderer(engine: Arc<RecordingEngine>) -> SegmentRenderer {
        SegmentRenderer::new(engine, Compositor::new(RenderSettings::default()))
    }

    #[tokio::test]
    async fn test_render_runs_composed_command() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(RecordingEngine::default());
        let renderer = renderer(engine.clone());
        let clip = ClipSource {
            path: dir.path().join("a.mp4"),
            has_audio: true,
        };
        let spec = renderer.compositor().outro_spec(&clip, TargetGeometry::default());
        let out = dir.path().join("outro.mp4");

        let rendered = renderer.render(&spec, &out).await.unwrap();
        assert_eq!(rendered.role, SegmentRole::Outro);
        assert!(out.exists());

        let calls = engine.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].contains(&"-filter_complex".to_string()));
        assert!(calls[0].contains(&"libx264".to_string()));
    }

    #[tokio::test]
    async fn test_render_failure_propagates() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(RecordingEngine::failing_on("bad.mp4"));
        let renderer = renderer(engine);
        let clip = ClipSource {
            path: dir.path().join("bad.mp4"),
            has_audio: false,
        };
        let spec = renderer.compositor().outro_spec(&clip, TargetGeometry::default());
        let err = renderer.render(&spec, &dir.path().join("o.mp4")).await.unwrap_err();
        assert!(err.to_string().contains("Invalid data found"));
        assert!(err.to_string().contains("bad.mp4"));
    }

    #[tokio::test]
    async fn test_pre_outro_skipped_without_narration() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(RecordingEngine::default());
        let renderer = renderer(engine.clone());
        let missing = dir.path().join("cta.mp3");

        let none = renderer
            .render_pre_outro(&dir.path().join("body.mp4"), None, dir.path(), TargetGeometry::default())
            .await
            .unwrap();
        assert!(none.is_none());

        let absent = renderer
            .render_pre_outro(&dir.path().join("body.mp4"), Some(&missing), dir.path(), TargetGeometry::default())
            .await
            .unwrap();
        assert!(absent.is_none());
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn test_pre_outro_skipped_when_frame_fails() {
        let dir = TempDir::new().unwrap();
        let narration = dir.path().join("cta.mp3");
        std::fs::write(&narration, b"audio").unwrap();
        let engine = Arc::new(RecordingEngine::failing_on("-sseof"));
        let renderer = renderer(engine.clone());

        let result = renderer
            .render_pre_outro(&dir.path().join("body.mp4"), Some(&narration), dir.path(), TargetGeometry::default())
            .await
            .unwrap();
        assert!(result.is_none());
        assert_eq!(engine.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_pre_outro_render_failure_is_skipped() {
        let dir = TempDir::new().unwrap();
        let narration = dir.path().join("cta.mp3");
        std::fs::write(&narration, b"audio").unwrap();
        let engine = Arc::new(RecordingEngine::failing_on("norm_99_pre_outro"));
        let renderer = renderer(engine.clone());

        let result = renderer
            .render_pre_outro(&dir.path().join("body.mp4"), Some(&narration), dir.path(), TargetGeometry::default())
            .await
            .unwrap();
        assert!(result.is_none());
        assert_eq!(engine.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_pre_outro_rendered_from_last_frame() {
        let dir = TempDir::new().unwrap();
        let narration = dir.path().join("cta.mp3");
        std::fs::write(&narration, b"audio").unwrap();
        let engine = Arc::new(RecordingEngine::default());
        let renderer = renderer(engine.clone());

        let rendered = renderer
            .render_pre_outro(&dir.path().join("body.mp4"), Some(&narration), dir.path(), TargetGeometry::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rendered.role, SegmentRole::PreOutro);

        let calls = engine.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].windows(2).any(|w| w == ["-sseof", "-0.100"]));
        assert!(calls[1].windows(2).any(|w| w == ["-loop", "1"]));
    }

    #[tokio::test]
    async fn test_missing_frame_counts_as_failure() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(RecordingEngine {
            skip_output: true,
            ..Default::default()
        });
        let renderer = renderer(engine);
        assert!(
            !renderer
                .extract_last_frame(&dir.path().join("a.mp4"), &dir.path().join("f.png"))
                .await
        );
    }

    #[tokio::test]
    async fn test_first_frame_is_frame_zero() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(RecordingEngine::default());
        let renderer = renderer(engine.clone());
        renderer
            .extract_first_frame(&dir.path().join("a.mp4"), &dir.path().join("f.png"))
            .await
            .unwrap();
        let calls = engine.calls();
        assert_eq!(calls.len(), 1);
        assert!(!calls[0].iter().any(|a| a == "-ss" || a == "-sseof"));
        assert!(calls[0].windows(2).any(|w| w == ["-frames:v", "1"]));
    }
}
