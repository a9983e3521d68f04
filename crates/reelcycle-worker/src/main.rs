//! Rotating compilation worker binary.
//!
//! Processes the next batch of content-group folders for the current cycle
//! and exits. Run it again to continue the rotation.

use std::sync::Arc;
use tracing::{error, info};

use reelcycle_media::FfmpegEngine;
use reelcycle_worker::{init_tracing, FolderPipeline, RunOrchestrator, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting reelcycle-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if let Err(e) = FfmpegEngine::check_available() {
        error!("Media engine unavailable: {}", e);
        return Err(e.into());
    }
    if let Err(e) = config.validate().await {
        error!("{}", e);
        return Err(e.into());
    }
    if let Some(banner) = config.banner.as_deref().filter(|p| !p.exists()) {
        tracing::warn!("Banner image not found: {}", banner.display());
    }
    if let Some(cta) = config.cta_audio.as_deref().filter(|p| !p.exists()) {
        tracing::warn!("Call-to-action audio not found: {}", cta.display());
    }

    let engine = Arc::new(FfmpegEngine::new());
    let pipeline = FolderPipeline::new(engine, &config);
    let orchestrator = RunOrchestrator::new(config, pipeline);

    let summary = match orchestrator.run().await {
        Ok(summary) => summary,
        Err(e) => {
            error!("Run failed: {}", e);
            return Err(e.into());
        }
    };

    if summary.cycle_completed() {
        info!("Cycle {} complete, next cycle: {}", summary.cycle, summary.next_cycle);
    } else {
        info!(
            "State saved for cycle {}, {} folder(s) remaining",
            summary.next_cycle, summary.remaining
        );
    }
    if !summary.failed.is_empty() {
        info!("Skipped this run: {}", summary.failed.join(", "));
    }

    Ok(())
}
