//! Cycle state store.
//!
//! A single JSON record read wholesale at the start of a run and rewritten
//! after each processed folder. There is no locking; one active run at a time
//! is assumed.

use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use reelcycle_media::fs_utils::write_atomic;
use reelcycle_models::RunState;

use crate::error::{WorkerError, WorkerResult};

#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current state, or the default `{cycle: 1, done: []}` when the file is
    /// missing, unreadable or malformed.
    pub async fn load(&self) -> RunState {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No state file, starting at cycle 1");
                return RunState::default();
            }
            Err(e) => {
                warn!(path = %self.path.display(), "Unreadable state file, resetting: {}", e);
                return RunState::default();
            }
        };

        RunState::from_json(&text).unwrap_or_else(|| {
            warn!(path = %self.path.display(), "Malformed state file, resetting");
            RunState::default()
        })
    }

    /// Persist the full state, replacing the previous file atomically.
    pub async fn save(&self, state: &RunState) -> WorkerResult<()> {
        let stamped = RunState {
            updated_at: Some(Utc::now()),
            ..state.clone()
        };
        let json = stamped.to_json()?;
        write_atomic(&self.path, json.as_bytes())
            .await
            .map_err(|e| WorkerError::state(format!("{}: {}", self.path.display(), e)))
    }
}
