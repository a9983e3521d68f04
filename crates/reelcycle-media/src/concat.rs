//! Sequence assembly.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use reelcycle_models::EncodingConfig;

use crate::command::{FfmpegCommand, FfmpegInput};
use crate::engine::MediaEngine;
use crate::error::{MediaError, MediaResult};
use crate::graph::{Filter, FilterGraph, Pin};

/// How a two-step concatenation finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcatOutcome {
    /// The concat demuxer copied streams without re-encoding
    StreamCopy,
    /// Stream copy failed and the list was re-encoded
    Reencoded,
}

/// Joins conformed segment files into one output.
#[derive(Clone)]
pub struct Assembler {
    engine: Arc<dyn MediaEngine>,
    encoding: EncodingConfig,
}

impl Assembler {
    pub fn new(engine: Arc<dyn MediaEngine>, encoding: EncodingConfig) -> Self {
        Self { engine, encoding }
    }

    /// Concatenate `segments` in order with the concat filter, re-encoding once.
    pub async fn assemble(&self, segments: &[PathBuf], output: &Path) -> MediaResult<()> {
        let cmd = concat_filter_command(segments, output, &self.encoding)?;
        ensure_parent(output).await?;
        self.engine.run(&cmd).await?;
        info!(output = %output.display(), segments = segments.len(), "Sequence assembled");
        Ok(())
    }

    /// Concatenate through the concat demuxer: stream copy first, and on
    /// failure the same list re-encoded.
    pub async fn assemble_with_fallback(&self, segments: &[PathBuf], output: &Path) -> MediaResult<ConcatOutcome> {
        if segments.is_empty() {
            return Err(MediaError::InvalidVideo("no segments to concatenate".to_string()));
        }
        ensure_parent(output).await?;

        let list_path = output.with_extension("concat.txt");
        tokio::fs::write(&list_path, concat_list(segments)).await?;

        let outcome = match self.engine.run(&demuxer_command(&list_path, output).codec_copy()).await {
            Ok(()) => Ok(ConcatOutcome::StreamCopy),
            Err(e) => {
                warn!("Stream copy concat failed, re-encoding: {}", e);
                let reencode = demuxer_command(&list_path, output).encoding(&self.encoding);
                self.engine.run(&reencode).await.map(|()| ConcatOutcome::Reencoded)
            }
        };

        // The list is removed whether or not either attempt succeeded.
        if let Err(e) = tokio::fs::remove_file(&list_path).await {
            warn!("Failed to remove concat list {}: {}", list_path.display(), e);
        }
        outcome
    }
}

/// Engine invocation joining every segment's video and audio pins with the concat filter.
pub fn concat_filter_command(
    segments: &[PathBuf],
    output: &Path,
    encoding: &EncodingConfig,
) -> MediaResult<FfmpegCommand> {
    if segments.is_empty() {
        return Err(MediaError::InvalidVideo("no segments to concatenate".to_string()));
    }

    let mut graph = FilterGraph::new(segments.len());
    let inputs = (0..segments.len()).flat_map(|i| [Pin::video(i), Pin::audio(i)]);
    let pins = graph.chain_multi(
        inputs,
        vec![Filter::new("concat")
            .kv("n", segments.len())
            .kv("v", 1)
            .kv("a", 1)],
        &["v", "a"],
    );
    let compiled = graph.compile(&pins[0], &pins[1])?;

    Ok(FfmpegCommand::new(output)
        .inputs(segments.iter().map(FfmpegInput::file))
        .filter_complex(compiled.description)
        .map(&compiled.video_out)
        .map(&compiled.audio_out)
        .encoding(encoding))
}

/// Concat demuxer list body; single quotes in paths are escaped.
pub fn concat_list(segments: &[PathBuf]) -> String {
    segments
        .iter()
        .map(|p| format!("file '{}'\n", p.to_string_lossy().replace('\'', "'\\''")))
        .collect()
}

fn demuxer_command(list_path: &Path, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(output).input(
        FfmpegInput::file(list_path)
            .arg("-f")
            .arg("concat")
            .arg("-safe")
            .arg("0"),
    )
}

async fn ensure_parent(output: &Path) -> MediaResult<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}
