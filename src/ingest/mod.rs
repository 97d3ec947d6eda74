//! Batch ingestion of uploaded exports.
//!
//! Each file is one cooperative unit of work: the processor yields to the
//! runtime, checks the cancel token, normalizes the file, and filters the
//! resulting widgets against everything accepted so far (earlier sessions
//! and earlier files of this batch). A bad file is recorded and skipped.

pub mod files;

pub use files::{UploadedFile, load_files};

use crate::config::IngestConfig;
use crate::error::Result;
use crate::widget::dedup::{DuplicateIndex, filter_with_index};
use crate::widget::{DuplicateEntry, Widget, normalize_with};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileError {
    pub file_name: String,
    pub error: String,
}

/// Progress snapshot handed to observers after every change.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingState {
    pub is_processing: bool,
    pub current_file: Option<String>,
    /// 0 to 100.
    pub progress: f64,
    pub total_files: usize,
    pub processed_files: usize,
    pub errors: Vec<FileError>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
}

/// Cooperative cancellation flag, checked once per file boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Widgets accepted from one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileResult {
    pub name: String,
    pub widgets: Vec<Widget>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub status: BatchStatus,
    pub results: Vec<FileResult>,
    pub duplicates: Vec<DuplicateEntry>,
    pub state: ProcessingState,
}

impl BatchOutcome {
    pub fn duplicate_count(&self) -> usize {
        self.duplicates.len()
    }

    pub fn widgets(&self) -> impl Iterator<Item = &Widget> {
        self.results.iter().flat_map(|r| r.widgets.iter())
    }

    pub fn into_widgets(self) -> Vec<Widget> {
        self.results.into_iter().flat_map(|r| r.widgets).collect()
    }
}

/// Receives progress snapshots and the final result of a batch.
pub trait BatchObserver {
    fn on_progress(&mut self, _state: &ProcessingState) {}

    fn on_complete(&mut self, _results: &[FileResult], _duplicate_count: usize) {}
}

impl BatchObserver for () {}

/// State that goes stale when new data is loaded.
pub trait CacheReset {
    fn reset(&mut self);
}

pub struct BatchProcessor {
    config: IngestConfig,
    state: ProcessingState,
    status: BatchStatus,
    cancel: CancelToken,
}

impl BatchProcessor {
    pub fn new(config: IngestConfig) -> Self {
        Self {
            config,
            state: ProcessingState::default(),
            status: BatchStatus::Idle,
            cancel: CancelToken::new(),
        }
    }

    pub fn state(&self) -> &ProcessingState {
        &self.state
    }

    pub fn status(&self) -> BatchStatus {
        self.status
    }

    /// Handle for cancelling the running (or next) batch from elsewhere.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Parse and normalize a single file.
    pub fn process_one(&self, file: &UploadedFile) -> Result<Vec<Widget>> {
        let raw: Value = serde_json::from_str(&file.contents)?;
        normalize_with(&raw, &self.config)
    }

    /// Run one batch.
    ///
    /// `cache` is reset before anything else, since its contents describe
    /// the previous data. Callers must not start a batch while another is
    /// running; `&mut self` enforces that for a single processor.
    pub async fn process_files<O>(
        &mut self,
        files: Vec<UploadedFile>,
        existing: &[Widget],
        cache: &mut dyn CacheReset,
        observer: &mut O,
    ) -> BatchOutcome
    where
        O: BatchObserver + ?Sized,
    {
        self.cancel.clear();
        cache.reset();

        let total = files.len();
        self.status = BatchStatus::Running;
        self.state = ProcessingState {
            is_processing: true,
            total_files: total,
            ..ProcessingState::default()
        };
        observer.on_progress(&self.state);
        info!(files = total, existing = existing.len(), "batch started");

        let mut index = DuplicateIndex::from_widgets(existing);
        let mut results: Vec<FileResult> = Vec::new();
        let mut duplicates: Vec<DuplicateEntry> = Vec::new();

        for (i, file) in files.into_iter().enumerate() {
            if self.config.yield_between_files {
                tokio::task::yield_now().await;
            }
            if self.cancel.is_cancelled() {
                info!(processed = i, total, "batch cancelled");
                self.status = BatchStatus::Cancelled;
                break;
            }

            self.state.current_file = Some(file.name.clone());
            observer.on_progress(&self.state);

            match self.process_one(&file) {
                Ok(widgets) => {
                    let parsed = widgets.len();
                    let report = filter_with_index(widgets, &mut index);
                    debug!(
                        file = %file.name,
                        parsed,
                        unique = report.unique.len(),
                        duplicates = report.duplicates.len(),
                        "file processed"
                    );
                    duplicates.extend(report.duplicates);
                    if !report.unique.is_empty() {
                        results.push(FileResult {
                            name: file.name,
                            widgets: report.unique,
                        });
                    }
                }
                Err(e) => {
                    warn!(file = %file.name, error = %e, "file rejected, continuing batch");
                    self.state.errors.push(FileError {
                        file_name: file.name,
                        error: e.to_string(),
                    });
                }
            }

            self.state.processed_files = i + 1;
            self.state.progress = (i + 1) as f64 / total as f64 * 100.0;
            observer.on_progress(&self.state);
        }

        if self.status == BatchStatus::Running {
            self.status = BatchStatus::Completed;
            self.state.progress = 100.0;
        }
        self.state.is_processing = false;
        self.state.current_file = None;
        observer.on_progress(&self.state);
        observer.on_complete(&results, duplicates.len());

        info!(
            status = ?self.status,
            accepted = results.iter().map(|r| r.widgets.len()).sum::<usize>(),
            duplicates = duplicates.len(),
            errors = self.state.errors.len(),
            "batch finished"
        );

        BatchOutcome {
            status: self.status,
            results,
            duplicates,
            state: self.state.clone(),
        }
    }
}

impl Default for BatchProcessor {
    fn default() -> Self {
        Self::new(IngestConfig::default())
    }
}
