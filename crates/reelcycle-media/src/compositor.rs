//! Segment recipe construction.
//!
//! The compositor turns a [`SegmentSpec`] into a [`SegmentRecipe`]: the
//! ordered FFmpeg inputs plus one validated filter graph with exactly one
//! video and one audio output pin. Stages, in order:
//!
//! 1. geometry conform (`fit` pads, `fill` crops)
//! 2. timestamp reset
//! 3. speed warp (video PTS rescale, audio tempo chain)
//! 4. frame-rate conform
//! 5. look filter chain
//! 6. digital zoom with center crop
//! 7. folder overlay with black color key and tint
//! 8. time-gated banner overlay
//! 9. audio conform, synthesizing silence when the source has none
//!
//! Construction is pure: the same spec and settings always give the same recipe.

use std::path::{Path, PathBuf};

use reelcycle_models::encoding::{AUDIO_CHANNEL_LAYOUT, AUDIO_SAMPLE_RATE};
use reelcycle_models::{EncodingConfig, RenderSettings, Rgb, ScaleMode, SegmentRole, TargetGeometry};

use crate::command::{FfmpegCommand, FfmpegInput};
use crate::error::{MediaError, MediaResult};
use crate::graph::{CompiledGraph, Filter, FilterGraph, Pin};

/// Zoom factors at or below this are treated as no zoom.
pub const MIN_ZOOM: f64 = 1.0001;
/// Speeds closer than this to 1.0 are treated as native speed.
const SPEED_EPSILON: f64 = 1e-6;
/// Tint strengths at or above this use the mixer output directly.
const FULL_TINT: f64 = 0.999;

/// Per-cycle visual treatment.
#[derive(Debug, Clone, PartialEq)]
pub struct Treatment {
    /// Look filter chain, inserted verbatim
    pub look: Option<String>,
    pub zoom: f64,
    pub speed: f64,
    /// Folder overlay tint
    pub tint: Option<Rgb>,
}

impl Treatment {
    /// No look, no zoom, native speed, no tint.
    pub fn identity() -> Self {
        Self {
            look: None,
            zoom: 1.0,
            speed: 1.0,
            tint: None,
        }
    }

    pub fn has_speed_change(&self) -> bool {
        (self.speed - 1.0).abs() > SPEED_EPSILON
    }

    pub fn has_zoom(&self) -> bool {
        self.zoom > MIN_ZOOM
    }
}

impl Default for Treatment {
    fn default() -> Self {
        Self::identity()
    }
}

/// Where the segment's pictures come from.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoSource {
    /// A video file, optionally trimmed at input level
    Clip {
        path: PathBuf,
        start: Option<f64>,
        duration: Option<f64>,
    },
    /// A single image held for the length of the audio
    Still { path: PathBuf },
}

impl VideoSource {
    pub fn clip(path: impl Into<PathBuf>) -> Self {
        VideoSource::Clip {
            path: path.into(),
            start: None,
            duration: None,
        }
    }
}

/// Where the segment's sound comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioSource {
    /// The video input's own audio stream
    Embedded,
    /// Generated silence, cut to the video length
    Silent,
    /// A separate audio file
    External {
        path: PathBuf,
        /// Apply the treatment's tempo change to this track
        follow_speed: bool,
    },
}

/// Everything that varies from one segment to the next.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSpec {
    pub role: SegmentRole,
    pub video: VideoSource,
    pub audio: AudioSource,
    pub geometry: TargetGeometry,
    pub treatment: Treatment,
    pub folder_overlay: Option<PathBuf>,
    pub banner: Option<PathBuf>,
    /// Output duration clamp
    pub max_duration: Option<f64>,
}

/// A fully resolved render instruction for one segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRecipe {
    pub role: SegmentRole,
    pub inputs: Vec<FfmpegInput>,
    pub graph: CompiledGraph,
    pub max_duration: Option<f64>,
}

impl SegmentRecipe {
    /// Engine invocation writing this segment to `output`.
    pub fn to_command(&self, output: impl AsRef<Path>, encoding: &EncodingConfig) -> FfmpegCommand {
        let mut cmd = FfmpegCommand::new(output)
            .inputs(self.inputs.iter().cloned())
            .filter_complex(&self.graph.description)
            .map(&self.graph.video_out)
            .map(&self.graph.audio_out)
            .shortest();
        if let Some(duration) = self.max_duration {
            cmd = cmd.max_duration(duration);
        }
        cmd.encoding(encoding)
    }
}

/// A source clip plus what introspection said about it.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipSource {
    pub path: PathBuf,
    pub has_audio: bool,
}

/// Builds segment specs and recipes from shared render settings.
#[derive(Debug, Clone)]
pub struct Compositor {
    settings: RenderSettings,
}

impl Compositor {
    pub fn new(settings: RenderSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Intro length for a narration track of the given duration.
    pub fn intro_duration(&self, narration_duration: Option<f64>) -> f64 {
        narration_duration
            .filter(|d| d.is_finite() && *d > 0.05)
            .unwrap_or(self.settings.intro_fallback_duration)
    }

    /// Body segment: one transformed source clip.
    pub fn body_spec(
        &self,
        index: usize,
        clip: &ClipSource,
        geometry: TargetGeometry,
        treatment: &Treatment,
        folder_overlay: Option<&Path>,
        banner: Option<&Path>,
    ) -> SegmentSpec {
        SegmentSpec {
            role: SegmentRole::Body(index),
            video: VideoSource::clip(&clip.path),
            audio: if clip.has_audio {
                AudioSource::Embedded
            } else {
                AudioSource::Silent
            },
            geometry,
            treatment: treatment.clone(),
            folder_overlay: folder_overlay.map(Path::to_path_buf),
            banner: banner.map(Path::to_path_buf),
            max_duration: None,
        }
    }

    /// Intro segment: the first clip re-voiced with the narration track.
    ///
    /// The source slice is `duration * speed` long so that after the speed
    /// warp the pictures last exactly as long as the untouched narration.
    pub fn intro_spec(
        &self,
        first_clip: &Path,
        narration: &Path,
        narration_duration: Option<f64>,
        geometry: TargetGeometry,
        treatment: &Treatment,
        folder_overlay: Option<&Path>,
    ) -> SegmentSpec {
        let duration = self.intro_duration(narration_duration);
        let speed = if treatment.has_speed_change() {
            treatment.speed
        } else {
            1.0
        };
        SegmentSpec {
            role: SegmentRole::Intro,
            video: VideoSource::Clip {
                path: first_clip.to_path_buf(),
                start: Some(self.settings.intro_lead_trim),
                duration: Some(duration * speed),
            },
            audio: AudioSource::External {
                path: narration.to_path_buf(),
                follow_speed: false,
            },
            geometry,
            treatment: treatment.clone(),
            folder_overlay: folder_overlay.map(Path::to_path_buf),
            banner: None,
            max_duration: Some(duration),
        }
    }

    /// Call-to-action segment: a held frame with its own narration.
    pub fn pre_outro_spec(&self, frame: &Path, narration: &Path, geometry: TargetGeometry) -> SegmentSpec {
        self.still_spec(SegmentRole::PreOutro, frame, narration, geometry, None)
    }

    /// A held image with a narration track.
    ///
    /// Without `hold` the segment lasts as long as the narration. With it the
    /// narration is padded with silence and the output cut to exactly `hold`.
    pub fn still_spec(
        &self,
        role: SegmentRole,
        frame: &Path,
        narration: &Path,
        geometry: TargetGeometry,
        hold: Option<f64>,
    ) -> SegmentSpec {
        SegmentSpec {
            role,
            video: VideoSource::Still {
                path: frame.to_path_buf(),
            },
            audio: AudioSource::External {
                path: narration.to_path_buf(),
                follow_speed: false,
            },
            geometry,
            treatment: Treatment::identity(),
            folder_overlay: None,
            banner: None,
            max_duration: hold,
        }
    }

    /// Outro segment: conformed only, no treatment or overlays.
    pub fn outro_spec(&self, outro: &ClipSource, geometry: TargetGeometry) -> SegmentSpec {
        SegmentSpec {
            role: SegmentRole::Outro,
            video: VideoSource::clip(&outro.path),
            audio: if outro.has_audio {
                AudioSource::Embedded
            } else {
                AudioSource::Silent
            },
            geometry,
            treatment: Treatment::identity(),
            folder_overlay: None,
            banner: None,
            max_duration: None,
        }
    }

    /// Build the recipe for a segment.
    pub fn compose(&self, spec: &SegmentSpec) -> MediaResult<SegmentRecipe> {
        let treatment = &spec.treatment;
        if !(treatment.speed.is_finite() && treatment.speed > 0.0) {
            return Err(MediaError::InvalidVideo(format!(
                "speed multiplier must be positive, got {}",
                treatment.speed
            )));
        }
        let geometry = spec.geometry;
        if geometry.width == 0 || geometry.height == 0 || !(geometry.fps > 0.0) {
            return Err(MediaError::InvalidVideo(format!(
                "invalid target geometry {}x{}@{}",
                geometry.width, geometry.height, geometry.fps
            )));
        }

        let mut inputs = Vec::new();
        let mut graph = FilterGraph::new(0);

        // Input 0 is always the picture source
        let video_input = push_input(&mut inputs, match &spec.video {
            VideoSource::Clip { path, start, duration } => {
                let mut input = FfmpegInput::file(path);
                if let Some(start) = start {
                    input = input.seek(*start);
                }
                if let Some(duration) = duration {
                    input = input.duration(*duration);
                }
                input
            }
            VideoSource::Still { path } => FfmpegInput::looped_image(path),
        });

        let audio_pin = match &spec.audio {
            AudioSource::Embedded => Pin::audio(video_input),
            AudioSource::Silent => Pin::audio(push_input(
                &mut inputs,
                FfmpegInput::lavfi(format!(
                    "anullsrc=channel_layout={}:sample_rate={}",
                    AUDIO_CHANNEL_LAYOUT, AUDIO_SAMPLE_RATE
                )),
            )),
            AudioSource::External { path, .. } => {
                Pin::audio(push_input(&mut inputs, FfmpegInput::file(path)))
            }
        };

        let folder_overlay = spec
            .folder_overlay
            .as_ref()
            .map(|path| push_input(&mut inputs, FfmpegInput::looped_image(path)));
        let banner = spec
            .banner
            .as_ref()
            .map(|path| push_input(&mut inputs, FfmpegInput::looped_image(path)));
        graph.set_input_count(inputs.len());

        // Stages 1-6
        let has_overlays = folder_overlay.is_some() || banner.is_some();
        let mut base = self.base_filters(geometry, treatment);
        let mut current = if has_overlays {
            base.push(Filter::new("format").arg("rgba"));
            graph.chain([Pin::video(video_input)], base, "v_base")
        } else {
            base.push(Filter::new("format").arg("yuv420p"));
            graph.chain([Pin::video(video_input)], base, "v_out")
        };

        // Stage 7
        if let Some(index) = folder_overlay {
            let overlay = self.overlay_chains(&mut graph, index, geometry, treatment.tint);
            current = graph.chain(
                [current, overlay],
                vec![Filter::new("overlay").arg(0).arg(0).kv("format", "auto")],
                "v_folder",
            );
        }

        // Stage 8
        if let Some(index) = banner {
            let mut filters = vec![
                Filter::new("scale").arg(geometry.width).arg(geometry.height),
                Filter::new("format").arg("rgba"),
            ];
            filters.extend(self.color_key());
            let banner_pin = graph.chain([Pin::video(index)], filters, "banner");
            current = graph.chain(
                [current, banner_pin],
                vec![Filter::new("overlay")
                    .arg(0)
                    .arg(0)
                    .kv("format", "auto")
                    .kv("enable", format!("'gte(t,{})'", fmt_num(self.settings.banner_delay.max(0.0))))],
                "v_banner",
            );
        }

        if has_overlays {
            current = graph.chain(
                [current],
                vec![Filter::new("setsar").arg(1), Filter::new("format").arg("yuv420p")],
                "v_out",
            );
        }

        // Stage 9
        let follow_speed = match &spec.audio {
            AudioSource::Embedded => true,
            AudioSource::Silent => false,
            AudioSource::External { follow_speed, .. } => *follow_speed,
        };
        let mut audio_filters = vec![Filter::new("asetpts").arg("PTS-STARTPTS")];
        if follow_speed && treatment.has_speed_change() {
            audio_filters.extend(atempo_chain(treatment.speed));
        }
        if matches!(spec.video, VideoSource::Still { .. }) && spec.max_duration.is_some() {
            audio_filters.push(Filter::new("apad"));
        }
        audio_filters.push(
            Filter::new("aformat")
                .kv("sample_rates", AUDIO_SAMPLE_RATE)
                .kv("channel_layouts", AUDIO_CHANNEL_LAYOUT),
        );
        let audio_out = graph.chain([audio_pin], audio_filters, "a_out");

        let compiled = graph.compile(&current, &audio_out)?;

        Ok(SegmentRecipe {
            role: spec.role,
            inputs,
            graph: compiled,
            max_duration: spec.max_duration,
        })
    }

    /// Geometry conform through zoom.
    fn base_filters(&self, geometry: TargetGeometry, treatment: &Treatment) -> Vec<Filter> {
        let (w, h) = (geometry.width, geometry.height);
        let mut filters = match self.settings.scale_mode {
            ScaleMode::Fit => vec![
                Filter::new("scale").arg(w).arg(h).kv("force_original_aspect_ratio", "decrease"),
                Filter::new("pad").arg(w).arg(h).arg("(ow-iw)/2").arg("(oh-ih)/2"),
            ],
            ScaleMode::Fill => vec![
                Filter::new("scale").arg(w).arg(h).kv("force_original_aspect_ratio", "increase"),
                Filter::new("crop").arg(w).arg(h),
            ],
        };
        filters.push(Filter::new("setsar").arg(1));
        filters.push(Filter::new("setpts").arg("PTS-STARTPTS"));
        if treatment.has_speed_change() {
            filters.push(Filter::new("setpts").arg(format!("PTS/{}", fmt_num(treatment.speed))));
        }
        filters.push(Filter::new("fps").arg(fmt_num(geometry.fps)));
        if let Some(look) = treatment.look.as_deref().filter(|l| !l.trim().is_empty()) {
            filters.push(Filter::raw(look));
        }
        if treatment.has_zoom() {
            let z = fmt_num(treatment.zoom);
            filters.push(
                Filter::new("scale")
                    .arg(format!("trunc(iw*{}/2)*2", z))
                    .arg(format!("trunc(ih*{}/2)*2", z)),
            );
            filters.push(Filter::new("crop").arg(w).arg(h));
        }
        filters
    }

    /// Folder overlay: stretch to frame, key out black, then tint.
    fn overlay_chains(
        &self,
        graph: &mut FilterGraph,
        input: usize,
        geometry: TargetGeometry,
        tint: Option<Rgb>,
    ) -> Pin {
        let mut filters = vec![
            Filter::new("scale")
                .arg(geometry.width)
                .arg(geometry.height)
                .kv("force_original_aspect_ratio", "disable"),
            Filter::new("format").arg("rgba"),
        ];
        filters.extend(self.color_key());

        let Some(rgb) = tint else {
            return graph.chain([Pin::video(input)], filters, "ov_folder");
        };

        let mixer = Filter::new("colorchannelmixer")
            .kv("rr", fmt_num(rgb.r))
            .kv("gg", fmt_num(rgb.g))
            .kv("bb", fmt_num(rgb.b))
            .kv("aa", 1);
        let strength = self.settings.clamped_tint_strength();

        if strength >= FULL_TINT {
            filters.push(mixer);
            return graph.chain([Pin::video(input)], filters, "ov_folder");
        }

        let raw = graph.chain([Pin::video(input)], filters, "ov_raw");
        let split = graph.chain_multi([raw], vec![Filter::new("split").arg(2)], &["ov_plain", "ov_src"]);
        let tinted = graph.chain([split[1].clone()], vec![mixer], "ov_tinted");
        graph.chain(
            [tinted, split[0].clone()],
            vec![Filter::new("blend")
                .kv("all_mode", "normal")
                .kv("all_opacity", fmt_num(strength))],
            "ov_folder",
        )
    }

    fn color_key(&self) -> Option<Filter> {
        let key = self.settings.color_key;
        key.enabled.then(|| {
            Filter::new("colorkey")
                .arg("0x000000")
                .arg(fmt_num(key.similarity))
                .arg(fmt_num(key.blend))
        })
    }
}

fn push_input(inputs: &mut Vec<FfmpegInput>, input: FfmpegInput) -> usize {
    inputs.push(input);
    inputs.len() - 1
}

/// Tempo change split into `atempo` stages that each stay within [0.5, 2.0].
pub fn atempo_chain(speed: f64) -> Vec<Filter> {
    let mut factors = Vec::new();
    let mut remaining = speed;
    while remaining > 2.0 {
        factors.push(2.0);
        remaining /= 2.0;
    }
    while remaining < 0.5 {
        factors.push(0.5);
        remaining /= 0.5;
    }
    factors.push(remaining);
    factors
        .into_iter()
        .map(|f| Filter::new("atempo").arg(fmt_num(f)))
        .collect()
}

/// Format a float for filter arguments: up to six decimals, no trailing zeros.
pub fn fmt_num(value: f64) -> String {
    let text = format!("{:.6}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text.is_empty() || text == "-" {
        "0".to_string()
    } else {
        text.to_string()
    }
}
