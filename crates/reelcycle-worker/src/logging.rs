//! Structured run logging utilities.
//!
//! Provides subscriber setup shared by the binaries and consistent per-folder
//! logging with tracing spans and contextual information.

use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber: coloured text by default, JSON when `LOG_FORMAT=json`.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("reelcycle=info,shuffle_merge=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Folder logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct RunLogger {
    folder: String,
    cycle: u32,
}

impl RunLogger {
    pub fn new(folder: &str, cycle: u32) -> Self {
        Self {
            folder: folder.to_string(),
            cycle,
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(folder = %self.folder, cycle = self.cycle, "Folder started: {}", message);
    }

    pub fn log_progress(&self, message: &str) {
        info!(folder = %self.folder, cycle = self.cycle, "Folder progress: {}", message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!(folder = %self.folder, cycle = self.cycle, "Folder warning: {}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(folder = %self.folder, cycle = self.cycle, "Folder error: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(folder = %self.folder, cycle = self.cycle, "Folder completed: {}", message);
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }

    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    /// Span wrapping everything done for this folder.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("folder", folder = %self.folder, cycle = self.cycle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_logger_creation() {
        let logger = RunLogger::new("ep 10", 3);
        assert_eq!(logger.folder(), "ep 10");
        assert_eq!(logger.cycle(), 3);
    }
}
