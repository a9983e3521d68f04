//! Per-folder rendering pipeline.
//!
//! Renders the shared segments once (intro, bodies per rendition, optional
//! call-to-action, outro) into the folder's scratch directory, then assembles
//! the social and production sequences.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Instrument};

use reelcycle_media::fs_utils::{recreate_dir, remove_dir_quietly, safe_stem};
use reelcycle_media::{Assembler, ClipSource, MediaEngine, SegmentRenderer, Compositor};
use reelcycle_models::{RenditionKind, TargetGeometry};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::RunLogger;
use crate::orchestrator::{FolderJob, FolderOutputs, FolderProcessor};
use crate::shuffle::{seeded_rng, shuffle_clips};

/// The FFmpeg-backed [`FolderProcessor`].
#[derive(Clone)]
pub struct FolderPipeline {
    renderer: SegmentRenderer,
    assembler: Assembler,
    outro: PathBuf,
    banner: Option<PathBuf>,
    cta_audio: Option<PathBuf>,
    /// Output directory per rendition, in assembly order
    rendition_dirs: Vec<(RenditionKind, PathBuf)>,
    scratch_dir: PathBuf,
    keep_scratch: bool,
    max_clips: Option<usize>,
}

impl FolderPipeline {
    pub fn new(engine: Arc<dyn MediaEngine>, config: &WorkerConfig) -> Self {
        let compositor = Compositor::new(config.render.clone());
        Self {
            renderer: SegmentRenderer::new(engine.clone(), compositor),
            assembler: Assembler::new(engine, config.render.encoding.clone()),
            outro: config.outro.clone(),
            banner: config.banner.clone(),
            cta_audio: config.cta_audio.clone(),
            rendition_dirs: RenditionKind::ALL
                .iter()
                .map(|kind| (*kind, config.rendition_dir(*kind)))
                .collect(),
            scratch_dir: config.scratch_dir.clone(),
            keep_scratch: config.keep_scratch,
            max_clips: config.max_clips_per_folder,
        }
    }

    async fn run_folder(&self, job: &FolderJob, logger: &RunLogger) -> WorkerResult<FolderOutputs> {
        let folder = &job.folder;
        let clips = shuffle_clips(&folder.clips, &mut seeded_rng(job.seed), self.max_clips);
        if clips.is_empty() {
            return Err(WorkerError::folder_failed(&folder.name, "no videos"));
        }

        logger.log_start(&format!("{} clips", clips.len()));
        for (i, clip) in clips.iter().enumerate() {
            info!(folder = %folder.name, position = i + 1, clip = %file_label(clip), "Shuffled order");
        }

        let overlay = folder.overlay.as_deref();
        if overlay.is_none() {
            logger.log_warning("overlay.png not found, folder overlay disabled");
        }
        let banner = match self.banner.as_deref() {
            Some(path) if exists(path).await => Some(path),
            Some(path) => {
                logger.log_warning(&format!("Banner not found: {}", path.display()));
                None
            }
            None => None,
        };

        let scratch = self.scratch_dir.join(safe_stem(&folder.name));
        recreate_dir(&scratch).await?;

        let renditions = self
            .render_renditions(job, &clips, &scratch, overlay, banner, logger)
            .await?;

        if self.keep_scratch {
            logger.log_progress(&format!("Scratch kept at {}", scratch.display()));
        } else {
            remove_dir_quietly(&scratch).await;
        }

        Ok(FolderOutputs {
            folder: folder.name.clone(),
            clips,
            renditions,
        })
    }

    async fn render_renditions(
        &self,
        job: &FolderJob,
        clips: &[PathBuf],
        scratch: &Path,
        overlay: Option<&Path>,
        banner: Option<&Path>,
        logger: &RunLogger,
    ) -> WorkerResult<Vec<(RenditionKind, PathBuf)>> {
        let engine = self.renderer.engine();
        let compositor = self.renderer.compositor();
        let settings = compositor.settings();

        let first = &clips[0];
        let first_info = engine.probe(first).await?;
        let detected_fps = first_info.require_video()?.fps;
        let geometry: TargetGeometry = settings.geometry.with_fps(settings.effective_fps(detected_fps));
        let treatment = job.selection.treatment();

        // Intro: first clip re-voiced with the cycle's narration
        let narration_duration = match engine.probe(&job.narration).await {
            Ok(info) => info.usable_duration(),
            Err(e) => {
                logger.log_warning(&format!("Narration length unknown, using fallback: {}", e));
                None
            }
        };
        let intro_spec = compositor.intro_spec(
            first,
            &job.narration,
            narration_duration,
            geometry,
            &treatment,
            overlay,
        );
        let intro = self
            .renderer
            .render(&intro_spec, &scratch.join("norm_00_intro_social.mp4"))
            .await?;

        let mut social = Vec::with_capacity(clips.len());
        let mut production = Vec::with_capacity(clips.len());
        for (i, clip) in clips.iter().enumerate() {
            let index = i + 1;
            let info = if i == 0 {
                first_info.clone()
            } else {
                engine.probe(clip).await?
            };
            let source = ClipSource {
                path: clip.clone(),
                has_audio: info.has_audio,
            };

            for kind in RenditionKind::ALL {
                // The first body directly follows the intro and stays clean
                let body_banner = banner.filter(|_| kind.has_banner() && index > 1);
                let spec = compositor.body_spec(index, &source, geometry, &treatment, overlay, body_banner);
                let output = scratch.join(format!("norm_{:02}_in_{}.mp4", index, kind));
                let rendered = self.renderer.render(&spec, &output).await?;
                match kind {
                    RenditionKind::Social => social.push(rendered.path),
                    RenditionKind::Production => production.push(rendered.path),
                }
            }
            logger.log_progress(&format!("body {}/{} rendered", index, clips.len()));
        }

        let pre_outro = match social.last() {
            Some(last) => {
                self.renderer
                    .render_pre_outro(last, self.cta_audio.as_deref(), scratch, geometry)
                    .await?
            }
            None => None,
        };

        let outro_info = engine.probe(&self.outro).await?;
        let outro_spec = compositor.outro_spec(
            &ClipSource {
                path: self.outro.clone(),
                has_audio: outro_info.has_audio,
            },
            geometry,
        );
        let outro = self
            .renderer
            .render(&outro_spec, &scratch.join(format!("norm_{:02}_outro.mp4", clips.len() + 1)))
            .await?;

        let mut outputs = Vec::new();
        for (kind, dir) in &self.rendition_dirs {
            let mut sequence = Vec::new();
            if kind.has_intro() {
                sequence.push(intro.path.clone());
            }
            sequence.extend(match kind {
                RenditionKind::Social => social.iter().cloned(),
                RenditionKind::Production => production.iter().cloned(),
            });
            if let Some(segment) = &pre_outro {
                sequence.push(segment.path.clone());
            }
            sequence.push(outro.path.clone());

            let output = dir.join(kind.file_name(job.index));
            self.assembler.assemble(&sequence, &output).await?;
            logger.log_progress(&format!("{} rendition: {}", kind, output.display()));
            outputs.push((*kind, output));
        }
        Ok(outputs)
    }
}

#[async_trait]
impl FolderProcessor for FolderPipeline {
    async fn process(&self, job: &FolderJob) -> WorkerResult<FolderOutputs> {
        let logger = RunLogger::new(&job.folder.name, job.selection.cycle);
        let span = logger.create_span();

        async {
            match self.run_folder(job, &logger).await {
                Ok(outputs) => {
                    logger.log_completion(&format!("{} renditions", outputs.renditions.len()));
                    Ok(outputs)
                }
                Err(e) => {
                    logger.log_error(&e.to_string());
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::Folder;
    use crate::selector::CycleSelection;
    use reelcycle_media::{FfmpegCommand, MediaError, MediaInfo, MediaResult, VideoStreamInfo};
    use reelcycle_models::Palettes;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeEngine {
        calls: Mutex<Vec<Vec<String>>>,
        fail_on: Option<String>,
        fail_probe: bool,
    }

    #[async_trait]
    impl MediaEngine for FakeEngine {
        async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
            let args = cmd.build_args();
            self.calls.lock().unwrap().push(args.clone());
            if let Some(needle) = &self.fail_on {
                if args.iter().any(|a| a.contains(needle.as_str())) {
                    return Err(MediaError::ffmpeg_failed("exit 1", cmd.to_command_line(), None, Some(1)));
                }
            }
            std::fs::write(cmd.output_path(), b"media")?;
            Ok(())
        }

        async fn probe(&self, path: &Path) -> MediaResult<MediaInfo> {
            let is_audio = path.extension().map(|e| e == "mp3").unwrap_or(false);
            if self.fail_probe && !is_audio {
                return Err(MediaError::ffprobe_failed(path, "invalid data", None));
            }
            Ok(MediaInfo {
                duration: Some(4.2),
                video: (!is_audio).then(|| VideoStreamInfo {
                    width: 1920,
                    height: 1080,
                    fps: 25.0,
                    codec: "h264".to_string(),
                }),
                has_audio: true,
            })
        }
    }

    struct Fixture {
        dir: TempDir,
        config: WorkerConfig,
        job: FolderJob,
    }

    fn fixture(with_cta: bool) -> Fixture {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("dramas");
        let folder_path = root.join("ep 1");
        std::fs::create_dir_all(&folder_path).unwrap();
        let clips: Vec<PathBuf> = ["a.mp4", "b.mp4"].iter().map(|n| folder_path.join(n)).collect();
        for clip in &clips {
            std::fs::write(clip, b"x").unwrap();
        }
        let banner = dir.path().join("banner.png");
        std::fs::write(&banner, b"x").unwrap();
        let cta = dir.path().join("cta.mp3");
        if with_cta {
            std::fs::write(&cta, b"x").unwrap();
        }

        let config = WorkerConfig {
            root_dir: root,
            outro: dir.path().join("outro.mp4"),
            banner: Some(banner),
            cta_audio: Some(cta),
            output_dir: dir.path().join("outputs"),
            scratch_dir: dir.path().join("scratch"),
            ..WorkerConfig::default()
        };
        let job = FolderJob {
            index: 3,
            folder: Folder {
                name: "ep 1".to_string(),
                path: folder_path,
                clips,
                overlay: None,
            },
            selection: CycleSelection::select(1, &Palettes::default()),
            narration: dir.path().join("intro.mp3"),
            seed: 9,
        };
        Fixture { dir, config, job }
    }

    fn graph_of(call: &[String]) -> &str {
        let at = call.iter().position(|a| a == "-filter_complex").unwrap();
        &call[at + 1]
    }

    #[tokio::test]
    async fn test_folder_renders_both_renditions() {
        let fx = fixture(true);
        let engine = Arc::new(FakeEngine::default());
        let pipeline = FolderPipeline::new(engine.clone(), &fx.config);

        let outputs = pipeline.process(&fx.job).await.unwrap();
        let social = fx.dir.path().join("outputs/social/v3_social.mp4");
        let production = fx.dir.path().join("outputs/production/v3_production.mp4");
        assert_eq!(fx.config.rendition_dir(RenditionKind::Social), social.parent().unwrap());
        assert_eq!(fx.config.rendition_dir(RenditionKind::Production), production.parent().unwrap());
        assert_eq!(
            outputs.renditions,
            vec![(RenditionKind::Social, social.clone()), (RenditionKind::Production, production.clone())]
        );
        assert!(social.exists() && production.exists());
        assert_eq!(outputs.clips.len(), 2);

        // intro, 2 x 2 bodies, frame grab, call-to-action, outro, 2 concats
        let calls = engine.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 10);

        // forced 30 fps wins over the detected 25
        assert!(graph_of(&calls[0]).contains("fps=30"));

        let social_concat = &calls[8];
        assert!(graph_of(social_concat).contains("concat=n=5"));
        let production_concat = &calls[9];
        assert!(graph_of(production_concat).contains("concat=n=4"));
        assert!(!production_concat.iter().any(|a| a.ends_with("norm_00_intro_social.mp4")));

        // scratch removed after success
        assert!(!fx.dir.path().join("scratch/ep_1").exists());
    }

    #[tokio::test]
    async fn test_banner_skips_first_body_and_production() {
        let fx = fixture(false);
        let engine = Arc::new(FakeEngine::default());
        let pipeline = FolderPipeline::new(engine.clone(), &fx.config);
        pipeline.process(&fx.job).await.unwrap();

        let calls = engine.calls.lock().unwrap().clone();
        let body = |name: &str| {
            calls
                .iter()
                .find(|c| c.last().map(|o| o.ends_with(name)).unwrap_or(false))
                .cloned()
                .unwrap()
        };
        assert!(!graph_of(&body("norm_01_in_social.mp4")).contains("enable="));
        assert!(graph_of(&body("norm_02_in_social.mp4")).contains("enable='gte(t,0)'"));
        assert!(!graph_of(&body("norm_02_in_production.mp4")).contains("enable="));

        // no call-to-action narration: intro, 4 bodies, outro, 2 concats
        assert_eq!(calls.len(), 8);
    }

    #[tokio::test]
    async fn test_render_failure_fails_folder() {
        let fx = fixture(false);
        let engine = Arc::new(FakeEngine {
            fail_on: Some("norm_02_in_production".to_string()),
            ..Default::default()
        });
        let pipeline = FolderPipeline::new(engine, &fx.config);
        let err = pipeline.process(&fx.job).await.unwrap_err();
        assert!(!err.is_fatal());
        assert!(!fx.dir.path().join("outputs/social/v3_social.mp4").exists());
    }

    #[tokio::test]
    async fn test_intro_follows_narration_length() {
        let fx = fixture(false);
        let engine = Arc::new(FakeEngine::default());
        let pipeline = FolderPipeline::new(engine.clone(), &fx.config);
        pipeline.process(&fx.job).await.unwrap();

        let calls = engine.calls.lock().unwrap().clone();
        let intro = &calls[0];
        let at = intro.iter().position(|a| a == "-filter_complex").unwrap();
        let tail = &intro[at..];
        assert!(tail.windows(2).any(|w| w[0] == "-t" && w[1] == "4.200"));
    }

    #[tokio::test]
    async fn test_unreadable_clips_fail_folder() {
        let fx = fixture(false);
        let engine = Arc::new(FakeEngine {
            fail_probe: true,
            ..Default::default()
        });
        let pipeline = FolderPipeline::new(engine.clone(), &fx.config);
        let err = pipeline.process(&fx.job).await.unwrap_err();
        assert!(!err.is_fatal());
        assert!(engine.calls.lock().unwrap().is_empty());
    }
}
