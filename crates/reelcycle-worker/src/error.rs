//! Worker error types.

use std::path::PathBuf;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("No eligible folders under {}", .0.display())]
    NoEligibleFolders(PathBuf),

    #[error("Folder {folder} failed: {reason}")]
    FolderFailed { folder: String, reason: String },

    #[error("State persistence failed: {0}")]
    State(String),

    #[error("Media error: {0}")]
    Media(#[from] reelcycle_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn folder_failed(folder: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FolderFailed {
            folder: folder.into(),
            reason: reason.into(),
        }
    }

    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    /// Whether the whole run must stop. Everything else only fails the folder in flight.
    pub fn is_fatal(&self) -> bool {
        match self {
            WorkerError::ConfigError(_) | WorkerError::NoEligibleFolders(_) => true,
            WorkerError::Media(e) => e.is_missing_binary(),
            _ => false,
        }
    }
}
