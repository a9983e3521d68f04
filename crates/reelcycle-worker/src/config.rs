//! Worker configuration.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use reelcycle_media::fs_utils::{list_files, AUDIO_EXTS};
use reelcycle_models::render::DEFAULT_FPS;
use reelcycle_models::{ColorKey, EncodingConfig, Palettes, RenderSettings, ScaleMode, TargetGeometry};

use crate::error::{WorkerError, WorkerResult};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Directory of content-group subfolders
    pub root_dir: PathBuf,
    /// Fixed closing clip
    pub outro: PathBuf,
    /// Intro narration used when the rotation directory has no tracks
    pub intro_fallback: PathBuf,
    /// Directory of rotating intro narration tracks
    pub intro_dir: PathBuf,
    /// Call-to-action narration; `None` disables the segment
    pub cta_audio: Option<PathBuf>,
    /// Banner image for social body segments; `None` disables it
    pub banner: Option<PathBuf>,
    /// Rendition directories are created under this
    pub output_dir: PathBuf,
    /// Folders processed per run
    pub picks_per_run: usize,
    /// Clips kept per folder after the shuffle; `None` keeps all
    pub max_clips_per_folder: Option<usize>,
    /// Persisted round-robin state
    pub state_file: PathBuf,
    /// Base seed mixed into every per-folder shuffle
    pub base_seed: u64,
    /// Per-folder scratch directories live under this
    pub scratch_dir: PathBuf,
    /// Keep scratch files after a successful folder
    pub keep_scratch: bool,
    pub render: RenderSettings,
    pub palettes: Palettes,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("./dramas"),
            outro: PathBuf::from("./outro.mp4"),
            intro_fallback: PathBuf::from("./intro.mp3"),
            intro_dir: PathBuf::from("./intro_voices"),
            cta_audio: Some(PathBuf::from("./cta_audio.mp3")),
            banner: Some(PathBuf::from("./banner.png")),
            output_dir: PathBuf::from("./outputs"),
            picks_per_run: 6,
            max_clips_per_folder: Some(3),
            state_file: PathBuf::from(".koko_merge_state.json"),
            base_seed: 42,
            scratch_dir: PathBuf::from(".tmp_shuffle_merge"),
            keep_scratch: false,
            render: RenderSettings::default(),
            palettes: Palettes::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from any key lookup, falling back to defaults per field.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string());
        let parse = |key: &str| var(key).filter(|v| !v.is_empty());

        let fps: f64 = parsed(parse("REELCYCLE_FPS"), DEFAULT_FPS);
        let geometry = TargetGeometry::new(
            parsed(parse("REELCYCLE_WIDTH"), defaults.render.geometry.width),
            parsed(parse("REELCYCLE_HEIGHT"), defaults.render.geometry.height),
            if fps > 0.0 { fps } else { DEFAULT_FPS },
        );

        let encoding = EncodingConfig::default()
            .with_crf(parsed(parse("REELCYCLE_CRF"), defaults.render.encoding.crf))
            .with_preset(parse("REELCYCLE_PRESET").unwrap_or(defaults.render.encoding.preset.clone()));

        let render = RenderSettings {
            geometry,
            // REELCYCLE_FPS=0 means "use the first clip's rate"
            force_fps: fps > 0.0,
            scale_mode: parsed(parse("REELCYCLE_SCALE_MODE"), ScaleMode::Fit),
            color_key: ColorKey {
                enabled: parsed_bool(parse("REELCYCLE_COLOR_KEY"), true),
                similarity: parsed(parse("REELCYCLE_COLOR_KEY_SIMILARITY"), defaults.render.color_key.similarity),
                blend: parsed(parse("REELCYCLE_COLOR_KEY_BLEND"), defaults.render.color_key.blend),
            },
            tint_strength: parsed(parse("REELCYCLE_TINT_STRENGTH"), defaults.render.tint_strength),
            banner_delay: parsed(parse("REELCYCLE_BANNER_DELAY"), defaults.render.banner_delay),
            encoding,
            ..defaults.render.clone()
        };

        Self {
            root_dir: parse("REELCYCLE_ROOT_DIR").map(PathBuf::from).unwrap_or(defaults.root_dir),
            outro: parse("REELCYCLE_OUTRO").map(PathBuf::from).unwrap_or(defaults.outro),
            intro_fallback: parse("REELCYCLE_INTRO_AUDIO")
                .map(PathBuf::from)
                .unwrap_or(defaults.intro_fallback),
            intro_dir: parse("REELCYCLE_INTRO_DIR").map(PathBuf::from).unwrap_or(defaults.intro_dir),
            // Set but empty disables the asset
            cta_audio: optional_path(var("REELCYCLE_CTA_AUDIO"), defaults.cta_audio),
            banner: optional_path(var("REELCYCLE_BANNER"), defaults.banner),
            output_dir: parse("REELCYCLE_OUTPUT_DIR").map(PathBuf::from).unwrap_or(defaults.output_dir),
            picks_per_run: parsed(parse("REELCYCLE_PICKS_PER_RUN"), defaults.picks_per_run),
            max_clips_per_folder: match parse("REELCYCLE_MAX_CLIPS").and_then(|v| v.parse::<usize>().ok()) {
                Some(0) => None,
                Some(n) => Some(n),
                None => defaults.max_clips_per_folder,
            },
            state_file: parse("REELCYCLE_STATE_FILE").map(PathBuf::from).unwrap_or(defaults.state_file),
            base_seed: parsed(parse("REELCYCLE_SEED"), defaults.base_seed),
            scratch_dir: parse("REELCYCLE_SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.scratch_dir),
            keep_scratch: parsed_bool(parse("REELCYCLE_KEEP_SCRATCH"), defaults.keep_scratch),
            render,
            palettes: defaults.palettes,
        }
    }

    /// Directory for one rendition's outputs.
    pub fn rendition_dir(&self, kind: reelcycle_models::RenditionKind) -> PathBuf {
        self.output_dir.join(kind.as_str())
    }

    /// Reject configurations that cannot produce any output.
    pub async fn validate(&self) -> WorkerResult<()> {
        if !is_dir(&self.root_dir).await {
            return Err(WorkerError::config_error(format!(
                "Folder not found: {}",
                self.root_dir.display()
            )));
        }
        if !is_file(&self.outro).await {
            return Err(WorkerError::config_error(format!(
                "Outro video not found: {}",
                self.outro.display()
            )));
        }
        if !is_file(&self.intro_fallback).await && list_files(&self.intro_dir, AUDIO_EXTS).await?.is_empty() {
            return Err(WorkerError::config_error(format!(
                "Intro audio not found: {} (and no tracks in {})",
                self.intro_fallback.display(),
                self.intro_dir.display()
            )));
        }
        if self.picks_per_run == 0 {
            return Err(WorkerError::config_error("REELCYCLE_PICKS_PER_RUN must be at least 1"));
        }
        let geometry = self.render.geometry;
        if geometry.width == 0 || geometry.height == 0 {
            return Err(WorkerError::config_error(format!(
                "Invalid target size {}x{}",
                geometry.width, geometry.height
            )));
        }
        Ok(())
    }
}

fn parsed<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn parsed_bool(value: Option<String>, default: bool) -> bool {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("1" | "true" | "yes" | "on") => true,
        Some("0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

fn optional_path(value: Option<String>, default: Option<PathBuf>) -> Option<PathBuf> {
    match value {
        Some(v) if v.is_empty() => None,
        Some(v) => Some(PathBuf::from(v)),
        None => default,
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}
