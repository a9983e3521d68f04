//! Rotating compilation worker.
//!
//! This crate provides:
//! - Environment-driven configuration
//! - The persisted round-robin cycle state
//! - Deterministic per-cycle look, tint, preset and narration selection
//! - Folder discovery and seeded clip shuffling
//! - The run orchestrator and the FFmpeg-backed folder pipeline

pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod pipeline;
pub mod scan;
pub mod selector;
pub mod shuffle;
pub mod state_store;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::{init_tracing, RunLogger};
pub use orchestrator::{FolderJob, FolderOutputs, FolderProcessor, RunOrchestrator, RunSummary};
pub use pipeline::FolderPipeline;
pub use scan::Folder;
pub use selector::CycleSelection;
pub use state_store::StateStore;
