//! One-off shuffle merge: a still intro, every clip of a folder in random
//! order, then a fixed outro, concatenated into a single video.
//!
//! Clips are normalised to the first clip's frame size and rate.

use anyhow::{bail, Context as _};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use reelcycle_media::fs_utils::{list_files, list_files_recursive, recreate_dir, VIDEO_EXTS};
use reelcycle_media::{
    Assembler, ClipSource, Compositor, FfmpegEngine, MediaEngine, SegmentRenderer, Treatment,
};
use reelcycle_models::{ColorKey, RenderSettings, SegmentRole, TargetGeometry};
use reelcycle_worker::init_tracing;
use reelcycle_worker::shuffle::{seeded_rng, shuffle_clips};

const INTRO_HOLD_SECS: f64 = 3.0;

#[derive(Parser, Debug)]
#[command(name = "shuffle-merge", version)]
#[command(about = "Shuffle a folder of clips between a still intro and an outro")]
struct Cli {
    /// Folder containing the clips
    #[arg(long)]
    folder: PathBuf,
    /// Audio played under the intro still
    #[arg(long)]
    intro_audio: PathBuf,
    /// Video appended after the clips
    #[arg(long)]
    outro: PathBuf,
    /// Output video path
    #[arg(long)]
    output: PathBuf,
    /// Seed for a reproducible order
    #[arg(long)]
    seed: Option<u64>,
    /// Include clips in subfolders
    #[arg(long)]
    recursive: bool,
    /// Use at most this many clips after shuffling
    #[arg(long)]
    max: Option<usize>,
    /// Working directory for normalised segments
    #[arg(long, default_value = ".tmp_shuffle_merge")]
    tmpdir: PathBuf,
}

fn even(v: u32) -> u32 {
    (v & !1).max(2)
}

async fn probe_clip(engine: &dyn MediaEngine, path: &Path) -> anyhow::Result<ClipSource> {
    let info = engine
        .probe(path)
        .await
        .with_context(|| format!("probe {}", path.display()))?;
    Ok(ClipSource {
        path: path.to_path_buf(),
        has_audio: info.has_audio,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    FfmpegEngine::check_available()?;

    if !cli.folder.is_dir() {
        bail!("Folder not found: {}", cli.folder.display());
    }
    for (label, path) in [("Intro audio", &cli.intro_audio), ("Outro", &cli.outro)] {
        if !path.is_file() {
            bail!("{} not found: {}", label, path.display());
        }
    }

    let found = if cli.recursive {
        list_files_recursive(&cli.folder, VIDEO_EXTS).await
    } else {
        list_files(&cli.folder, VIDEO_EXTS).await
    }
    .with_context(|| format!("list {}", cli.folder.display()))?;
    if found.is_empty() {
        bail!("No video files found in: {}", cli.folder.display());
    }

    let mut rng = match cli.seed {
        Some(seed) => seeded_rng(seed),
        None => StdRng::from_os_rng(),
    };
    let clips = shuffle_clips(&found, &mut rng, cli.max);
    for (i, clip) in clips.iter().enumerate() {
        info!("{:02}. {}", i + 1, clip.display());
    }

    recreate_dir(&cli.tmpdir)
        .await
        .with_context(|| format!("prepare {}", cli.tmpdir.display()))?;
    // Concat list entries resolve relative to the list file, not the cwd.
    let tmpdir = tokio::fs::canonicalize(&cli.tmpdir).await?;

    let engine: Arc<dyn MediaEngine> = Arc::new(FfmpegEngine::new());
    let first = engine
        .probe(&clips[0])
        .await
        .with_context(|| format!("probe {}", clips[0].display()))?;
    let video = first.require_video()?;
    let mut settings = RenderSettings {
        force_fps: false,
        color_key: ColorKey {
            enabled: false,
            ..ColorKey::default()
        },
        ..RenderSettings::default()
    };
    let geometry = TargetGeometry::new(
        even(video.width),
        even(video.height),
        settings.effective_fps(video.fps),
    );
    settings.geometry = geometry;
    info!(
        width = geometry.width,
        height = geometry.height,
        fps = geometry.fps,
        "Target geometry from first clip"
    );

    let encoding = settings.encoding.clone();
    let renderer = SegmentRenderer::new(engine.clone(), Compositor::new(settings));
    let assembler = Assembler::new(engine.clone(), encoding);

    let frame = tmpdir.join("first_frame.png");
    renderer.extract_first_frame(&clips[0], &frame).await?;
    let intro = renderer.compositor().still_spec(
        SegmentRole::Intro,
        &frame,
        &cli.intro_audio,
        geometry,
        Some(INTRO_HOLD_SECS),
    );
    let mut segments = vec![renderer.render(&intro, &tmpdir.join("norm_00_intro.mp4")).await?.path];

    let identity = Treatment::identity();
    for (i, clip) in clips.iter().enumerate() {
        let source = probe_clip(engine.as_ref(), clip).await?;
        let spec = renderer
            .compositor()
            .body_spec(i + 1, &source, geometry, &identity, None, None);
        let output = tmpdir.join(format!("norm_{:02}.mp4", i + 1));
        let rendered = renderer
            .render(&spec, &output)
            .await
            .with_context(|| format!("normalise {}", clip.display()))?;
        segments.push(rendered.path);
    }

    let outro = probe_clip(engine.as_ref(), &cli.outro).await?;
    let spec = renderer.compositor().outro_spec(&outro, geometry);
    let output = tmpdir.join(format!("norm_{:02}_outro.mp4", clips.len() + 1));
    segments.push(renderer.render(&spec, &output).await?.path);

    let outcome = assembler
        .assemble_with_fallback(&segments, &cli.output)
        .await
        .with_context(|| format!("concatenate into {}", cli.output.display()))?;

    info!(?outcome, output = %cli.output.display(), "Done");
    info!("Temporary files kept in {}", tmpdir.display());
    Ok(())
}
