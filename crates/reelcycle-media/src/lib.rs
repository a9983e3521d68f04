#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for the compilation pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multiple inputs
//! - Progress parsing from `-progress pipe:2`
//! - FFprobe introspection
//! - A validated filter-graph builder and the segment compositor
//! - Segment rendering and sequence assembly behind the [`MediaEngine`] trait

pub mod command;
pub mod compositor;
pub mod concat;
pub mod engine;
pub mod error;
pub mod fs_utils;
pub mod graph;
pub mod probe;
pub mod progress;
pub mod render;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegInput, FfmpegRunner};
pub use compositor::{
    AudioSource, ClipSource, Compositor, SegmentRecipe, SegmentSpec, Treatment, VideoSource,
};
pub use concat::{Assembler, ConcatOutcome};
pub use engine::{FfmpegEngine, MediaEngine};
pub use error::{MediaError, MediaResult};
pub use graph::{CompiledGraph, Filter, FilterGraph, GraphError, Pin};
pub use probe::{probe_media, MediaInfo, VideoStreamInfo};
pub use progress::FfmpegProgress;
pub use render::{RenderedSegment, SegmentRenderer};
