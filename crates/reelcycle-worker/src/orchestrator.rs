//! Run orchestration.
//!
//! One run moves through scanning, selecting, processing and state update:
//! - scan the root for eligible folders (fatal when there are none)
//! - reconcile the persisted state against them and pick the next folders
//!   not yet done this cycle, capped per run, in natural order
//! - process each picked folder; a failure skips the folder, which stays
//!   pending for a later run
//! - mark each success done and persist, advancing the cycle once every
//!   eligible folder is done

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{error, info, warn};

use reelcycle_models::RenditionKind;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::scan::{resolve_narration, scan_folders, Folder};
use crate::selector::CycleSelection;
use crate::shuffle::folder_seed;
use crate::state_store::StateStore;

/// One folder's work order.
#[derive(Debug, Clone)]
pub struct FolderJob {
    /// 1-based position in this run; names the output files
    pub index: usize,
    pub folder: Folder,
    pub selection: CycleSelection,
    pub narration: PathBuf,
    /// Shuffle seed for this folder
    pub seed: u64,
}

/// What a successfully processed folder produced.
#[derive(Debug, Clone, PartialEq)]
pub struct FolderOutputs {
    pub folder: String,
    /// Clips used, in shuffled order
    pub clips: Vec<PathBuf>,
    pub renditions: Vec<(RenditionKind, PathBuf)>,
}

/// Processes one folder into its renditions.
#[async_trait]
pub trait FolderProcessor: Send + Sync {
    async fn process(&self, job: &FolderJob) -> WorkerResult<FolderOutputs>;
}

/// Outcome of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Cycle the run's parameters were selected for
    pub cycle: u32,
    pub look: String,
    pub preset: String,
    pub processed: Vec<String>,
    pub failed: Vec<String>,
    /// Cycle persisted at the end of the run
    pub next_cycle: u32,
    /// Eligible folders still pending in `next_cycle`
    pub remaining: usize,
}

impl RunSummary {
    pub fn cycle_completed(&self) -> bool {
        self.next_cycle > self.cycle
    }
}

pub struct RunOrchestrator<P> {
    config: WorkerConfig,
    store: StateStore,
    processor: P,
}

impl<P: FolderProcessor> RunOrchestrator<P> {
    pub fn new(config: WorkerConfig, processor: P) -> Self {
        let store = StateStore::new(&config.state_file);
        Self {
            config,
            store,
            processor,
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Execute one run.
    pub async fn run(&self) -> WorkerResult<RunSummary> {
        let root = &self.config.root_dir;
        let folders = scan_folders(root)
            .await
            .map_err(|e| WorkerError::config_error(format!("Cannot scan {}: {}", root.display(), e)))?;
        if folders.is_empty() {
            return Err(WorkerError::NoEligibleFolders(root.clone()));
        }
        let eligible: BTreeSet<String> = folders.iter().map(|f| f.name.clone()).collect();

        let mut state = self.store.load().await;
        let loaded = state.clone();
        if state.reconcile(&eligible) {
            info!(cycle = state.cycle, "All folders already done, advancing cycle");
        }
        if state != loaded {
            self.store.save(&state).await?;
        }

        let cycle = state.cycle;
        let selection = CycleSelection::select(cycle, &self.config.palettes);
        let narration = resolve_narration(&self.config.intro_dir, &self.config.intro_fallback, cycle)
            .await?
            .ok_or_else(|| {
                WorkerError::config_error(format!(
                    "Intro audio not found: {}",
                    self.config.intro_fallback.display()
                ))
            })?;

        let remaining: Vec<String> = state
            .remaining(folders.iter().map(|f| f.name.as_str()))
            .into_iter()
            .map(String::from)
            .collect();
        let picked: Vec<&Folder> = folders
            .iter()
            .filter(|f| remaining.contains(&f.name))
            .take(self.config.picks_per_run)
            .collect();

        info!(
            cycle,
            look = selection.look_name(),
            preset = %selection.preset.name,
            tint = selection.tint.as_ref().map(|t| t.0.as_str()).unwrap_or("none"),
            narration = %narration.display(),
            eligible = eligible.len(),
            pending = remaining.len(),
            picked = picked.len(),
            "Run info"
        );

        let mut processed = Vec::new();
        let mut failed = Vec::new();

        for (i, folder) in picked.into_iter().enumerate() {
            let job = FolderJob {
                index: i + 1,
                folder: folder.clone(),
                selection: selection.clone(),
                narration: narration.clone(),
                seed: folder_seed(self.config.base_seed, &folder.name, cycle),
            };

            match self.processor.process(&job).await {
                Ok(outputs) => {
                    for (kind, path) in &outputs.renditions {
                        info!(folder = %folder.name, rendition = %kind, output = %path.display(), "Rendition written");
                    }
                    if state.mark_done(&folder.name, &eligible) {
                        info!(cycle = state.cycle, "Cycle complete, next cycle starts");
                    }
                    self.store.save(&state).await?;
                    metrics::counter!("reelcycle_folders_processed_total").increment(1);
                    processed.push(folder.name.clone());
                }
                Err(e) if e.is_fatal() => {
                    error!(folder = %folder.name, "Fatal error, stopping run: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    warn!(folder = %folder.name, "Skipping folder: {}", e);
                    metrics::counter!("reelcycle_folders_failed_total").increment(1);
                    failed.push(folder.name.clone());
                }
            }
        }

        let summary = RunSummary {
            cycle,
            look: selection.look_name().to_string(),
            preset: selection.preset.name.clone(),
            processed,
            failed,
            next_cycle: state.cycle,
            remaining: eligible.len().saturating_sub(state.done.len()),
        };
        info!(
            processed = summary.processed.len(),
            failed = summary.failed.len(),
            next_cycle = summary.next_cycle,
            remaining = summary.remaining,
            "Run finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct Recorder {
        jobs: Mutex<Vec<(usize, String, u32)>>,
    }

    #[async_trait]
    impl FolderProcessor for Recorder {
        async fn process(&self, job: &FolderJob) -> WorkerResult<FolderOutputs> {
            self.jobs
                .lock()
                .unwrap()
                .push((job.index, job.folder.name.clone(), job.selection.cycle));
            Ok(FolderOutputs {
                folder: job.folder.name.clone(),
                clips: job.folder.clips.clone(),
                renditions: Vec::new(),
            })
        }
    }

    fn setup(folders: &[&str]) -> (TempDir, WorkerConfig) {
        let dir = TempDir::new().unwrap();
        for name in folders {
            let path = dir.path().join("dramas").join(name);
            std::fs::create_dir_all(&path).unwrap();
            std::fs::write(path.join("a.mp4"), b"x").unwrap();
        }
        std::fs::write(dir.path().join("intro.mp3"), b"x").unwrap();
        let config = WorkerConfig {
            root_dir: dir.path().join("dramas"),
            intro_fallback: dir.path().join("intro.mp3"),
            intro_dir: dir.path().join("intro_voices"),
            state_file: dir.path().join("state.json"),
            picks_per_run: 2,
            ..WorkerConfig::default()
        };
        (dir, config)
    }

    #[tokio::test]
    async fn test_picks_in_natural_order() {
        let (_dir, config) = setup(&["ep10", "ep2", "ep1"]);
        let orchestrator = RunOrchestrator::new(
            config,
            Recorder {
                jobs: Mutex::new(Vec::new()),
            },
        );
        let summary = orchestrator.run().await.unwrap();
        assert_eq!(summary.processed, vec!["ep1", "ep2"]);
        assert_eq!(
            *orchestrator.processor.jobs.lock().unwrap(),
            vec![(1, "ep1".to_string(), 1), (2, "ep2".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn test_no_eligible_folders_is_fatal() {
        let (_dir, config) = setup(&[]);
        std::fs::create_dir_all(&config.root_dir).unwrap();
        let orchestrator = RunOrchestrator::new(
            config,
            Recorder {
                jobs: Mutex::new(Vec::new()),
            },
        );
        let err = orchestrator.run().await.unwrap_err();
        assert!(matches!(err, WorkerError::NoEligibleFolders(_)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_missing_narration_is_fatal() {
        let (dir, config) = setup(&["ep1"]);
        std::fs::remove_file(dir.path().join("intro.mp3")).unwrap();
        let orchestrator = RunOrchestrator::new(
            config,
            Recorder {
                jobs: Mutex::new(Vec::new()),
            },
        );
        assert!(orchestrator.run().await.unwrap_err().is_fatal());
    }
}
