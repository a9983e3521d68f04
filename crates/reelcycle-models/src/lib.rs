//! Shared data models for the ReelCycle compilation pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Encoding and render settings
//! - Look, tint and speed/zoom palettes
//! - The persisted round-robin run state
//! - Segment roles and rendition kinds

pub mod encoding;
pub mod palette;
pub mod render;
pub mod segment;
pub mod state;

// Re-export common types
pub use encoding::EncodingConfig;
pub use palette::{LookProfile, Palettes, Rgb, SpeedZoomPreset, TintColor};
pub use render::{ColorKey, RenderSettings, ScaleMode, TargetGeometry};
pub use segment::{RenditionKind, SegmentRole};
pub use state::RunState;
