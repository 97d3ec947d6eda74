//! Top-level application state: accepted widgets plus everything derived from them.

use crate::analysis::{AnalysisSession, CategoryDigest, build_digest};
use crate::category::CategoryKind;
use crate::config::Config;
use crate::filter::KeywordFilter;
use crate::ingest::{
    BatchObserver, BatchOutcome, BatchProcessor, CancelToken, ProcessingState, UploadedFile,
};
use crate::series::{InstallSeries, reconstruct};
use crate::widget::Widget;
use std::collections::BTreeMap;
use tracing::info;

pub struct Dashboard {
    config: Config,
    accepted: Vec<Widget>,
    analysis: AnalysisSession,
    processor: BatchProcessor,
}

impl Dashboard {
    pub fn new(config: Config) -> Self {
        let processor = BatchProcessor::new(config.ingest.clone());
        Self {
            config,
            accepted: Vec::new(),
            analysis: AnalysisSession::new(),
            processor,
        }
    }

    /// Start from widgets accepted in an earlier session.
    pub fn with_widgets(config: Config, widgets: Vec<Widget>) -> Self {
        let mut dashboard = Self::new(config);
        dashboard.accepted = widgets;
        dashboard
    }

    /// Run one batch against everything accepted so far and keep the unique
    /// widgets. The analysis session is reset at the start of the batch.
    pub async fn load_files<O>(&mut self, files: Vec<UploadedFile>, observer: &mut O) -> BatchOutcome
    where
        O: BatchObserver + ?Sized,
    {
        let outcome = self
            .processor
            .process_files(files, &self.accepted, &mut self.analysis, observer)
            .await;
        let before = self.accepted.len();
        self.accepted.extend(outcome.widgets().cloned());
        info!(
            added = self.accepted.len() - before,
            total = self.accepted.len(),
            "dashboard updated"
        );
        outcome
    }

    pub fn clear(&mut self) {
        self.accepted.clear();
        self.analysis.reset();
        info!("dashboard cleared");
    }

    pub fn widgets(&self) -> &[Widget] {
        &self.accepted
    }

    pub fn widgets_in(&self, category: CategoryKind) -> Vec<&Widget> {
        self.accepted
            .iter()
            .filter(|w| CategoryKind::of(w) == category)
            .collect()
    }

    /// Widgets of one category with the keyword filter applied.
    pub fn filtered_widgets(&self, category: CategoryKind, filter: &KeywordFilter) -> Vec<Widget> {
        let members: Vec<Widget> = self.widgets_in(category).into_iter().cloned().collect();
        filter.apply(category, &members)
    }

    /// `None` when no accepted widget yields an installation series.
    pub fn installation_series(&self) -> Option<Vec<InstallSeries>> {
        reconstruct(&self.accepted, &self.config.series)
    }

    pub fn digest(&self) -> BTreeMap<String, CategoryDigest> {
        build_digest(&self.accepted)
    }

    /// Raw JSON context for the analysis service, one entry per widget.
    pub fn raw_context(&self) -> Vec<String> {
        self.accepted
            .iter()
            .filter_map(|w| serde_json::to_string(w).ok())
            .collect()
    }

    pub fn analysis(&self) -> &AnalysisSession {
        &self.analysis
    }

    pub fn analysis_mut(&mut self) -> &mut AnalysisSession {
        &mut self.analysis
    }

    pub fn processing_state(&self) -> &ProcessingState {
        self.processor.state()
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.processor.cancel_token()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
