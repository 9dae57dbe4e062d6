//! The clustering orchestrator.
//!
//! `ClusteringEngine` owns one `PipelineState` and drives it through
//! encode → reduce → cluster → summarize. Each stage consumes the whole output
//! of the previous one. The state is only replaced once every stage has
//! succeeded, so a failed run leaves the previous results in place.

mod progress;
mod state;

#[cfg(test)]
mod tests;

pub use progress::{MonotonicReporter, NoopReporter, ProgressReporter, Stage};
pub use state::PipelineState;

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::clusterer::DensityClusterer;
use crate::config::{EngineSettings, KeywordConfig, RunConfig};
use crate::embedder::client::check_shape;
use crate::embedder::{Batcher, EmbedError, EmbeddingProvider};
use crate::error::EngineError;
use crate::evaluate::Evaluator;
use crate::labeler::{self, ClusterLabeler};
use crate::merge::{ClusterMerger, MergeReport};
use crate::reducer::Umap;
use crate::statepack::{StatePackReader, StatePackWriter};
use crate::summarizer::KeywordSummarizer;
use crate::table::{ClusterSummary, EmbeddingMatrix, Partition, Record, ReducedMatrix, ResultTable};

pub struct ClusteringEngine {
    provider: Arc<dyn EmbeddingProvider>,
    settings: EngineSettings,
    reporter: Arc<dyn ProgressReporter>,
    state: PipelineState,
    keywords: KeywordConfig,
}

/// Output of reduce → cluster → summarize, not yet committed.
struct Derived {
    reduced: ReducedMatrix,
    partition: Partition,
    summaries: ClusterSummary,
}

impl ClusteringEngine {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            settings: EngineSettings::default(),
            reporter: Arc::new(NoopReporter),
            state: PipelineState::default(),
            keywords: KeywordConfig::default(),
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn set_reporter(&mut self, reporter: Arc<dyn ProgressReporter>) {
        self.reporter = reporter;
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Embeddings of the current state, `None` before any run or load.
    pub fn embeddings(&self) -> Option<&EmbeddingMatrix> {
        self.state.has_embeddings().then_some(&self.state.embeddings)
    }

    /// Result table of the current state, `None` before any run or load.
    pub fn results(&self) -> Option<&ResultTable> {
        (!self.state.is_empty()).then_some(&self.state.results)
    }

    /// Full pipeline over `records`. Blank texts are dropped first.
    pub fn run(&mut self, records: Vec<Record>, config: &RunConfig) -> Result<ResultTable, EngineError> {
        config.validate()?;
        let total = records.len();
        let records: Vec<Record> = records.into_iter().filter(|r| !r.is_blank()).collect();
        if records.is_empty() {
            return Err(EngineError::validation(format!(
                "no non-blank records to cluster ({total} given)"
            )));
        }
        if total != records.len() {
            warn!(dropped = total - records.len(), "dropped blank records");
        }
        let width = self.provider.model_info().dim;
        if config.reducer.n_components >= width {
            return Err(EngineError::validation(format!(
                "n_components {} must be smaller than the embedding width {width}",
                config.reducer.n_components
            )));
        }

        info!(records = records.len(), model = %self.provider.model_info().name, "starting run");
        let embeddings = self.encode(&records)?;
        let derived = self.derive(&records, &embeddings, config)?;

        self.state = PipelineState::new(
            records,
            embeddings,
            derived.reduced,
            derived.partition,
            derived.summaries,
        )?;
        self.keywords = config.keywords.clone();
        self.finish();
        Ok(self.state.results.clone())
    }

    /// Reduce, cluster and summarize again over the stored embeddings.
    pub fn re_cluster(&mut self, config: &RunConfig) -> Result<ResultTable, EngineError> {
        if !self.state.has_embeddings() {
            return Err(EngineError::state(
                "no embeddings available; run the pipeline or load a saved state first",
            ));
        }
        config.validate()?;

        info!(records = self.state.records.len(), "re-clustering stored embeddings");
        let derived = self.derive(&self.state.records, &self.state.embeddings, config)?;

        self.state.reduced = derived.reduced;
        self.state.partition = derived.partition;
        self.state.summaries = derived.summaries;
        self.state.results =
            ResultTable::assemble(&self.state.records, &self.state.partition, &self.state.summaries)?;
        self.keywords = config.keywords.clone();
        self.finish();
        Ok(self.state.results.clone())
    }

    /// Fold near-duplicate clusters together, see [`ClusterMerger`].
    ///
    /// Keywords are kept as they were unless
    /// `refresh_keywords_after_merge` is set.
    pub fn merge_similar_clusters(&mut self, threshold: f32) -> Result<MergeReport, EngineError> {
        let merger = ClusterMerger::new(threshold)?;
        if self.state.is_empty() {
            warn!("no clustering results to merge");
            return Ok(MergeReport::skipped("no clustering results"));
        }

        let mut partition = self.state.partition.clone();
        let report = merger.merge(&mut partition, &self.state.embeddings)?;
        if report.merges.is_empty() {
            return Ok(report);
        }

        self.state.partition = partition;
        let summaries = if self.settings.refresh_keywords_after_merge {
            debug!("refreshing keywords after merge");
            KeywordSummarizer::new(self.keywords.clone())
                .summarize(&texts(&self.state.records), &self.state.partition)?
        } else {
            self.state.summaries.clone()
        };
        self.state.relabel(summaries)?;
        Ok(report)
    }

    /// Write the state to `path`. Before any run this only logs a warning.
    pub fn save_state(&self, path: &Path) -> Result<(), EngineError> {
        if self.state.is_empty() {
            warn!(path = %path.display(), "nothing to save yet");
            return Ok(());
        }
        StatePackWriter::new(
            &self.state,
            self.provider.model_info().name.clone(),
            &self.keywords,
        )
            .and_then(|mut writer| writer.write_to_file(path))
            .map_err(|e| EngineError::dependency("persistence", format!("{e:#}")))
    }

    /// Replace the state, and the keyword settings it was summarized with, by
    /// the ones stored at `path`.
    ///
    /// `false` means "start fresh": the file is missing or unreadable. The
    /// current state is untouched in that case.
    pub fn load_state(&mut self, path: &Path) -> bool {
        if !path.exists() {
            info!(path = %path.display(), "no saved state");
            return false;
        }
        match StatePackReader::open(path) {
            Ok(reader) => {
                self.keywords = reader.manifest.keywords.clone();
                self.state = reader.into_state();
                info!(
                    rows = self.state.results.len(),
                    clusters = self.state.results.cluster_count(),
                    "restored saved state"
                );
                true
            }
            Err(e) => {
                let err = EngineError::state(format!("{e:#}"));
                warn!(path = %path.display(), error = %err, "saved state is unusable");
                false
            }
        }
    }

    /// Evaluator over the current results and embeddings.
    pub fn evaluator(&self) -> Result<Evaluator<'_>, EngineError> {
        if self.state.is_empty() {
            return Err(EngineError::state("no clustering results to evaluate"));
        }
        Evaluator::new(&self.state.results, &self.state.embeddings)
    }

    /// Name every cluster with `labeler`, reporting through the engine's reporter.
    pub fn label_clusters(
        &self,
        labeler: &dyn ClusterLabeler,
        seed: u64,
    ) -> Result<ClusterSummary, EngineError> {
        if self.state.is_empty() {
            return Err(EngineError::state("no clustering results to label"));
        }
        Ok(labeler::label_clusters(
            &self.state.results,
            labeler,
            self.reporter.as_ref(),
            seed,
        ))
    }

    fn encode(&self, records: &[Record]) -> Result<EmbeddingMatrix, EngineError> {
        let texts = texts(records);
        let max_batch = self.provider.model_info().max_batch;
        let batcher = Batcher::capped(self.settings.batch_size, max_batch);
        let total = batcher.batch_count(texts.len());
        let batches = batcher.split(&texts);
        self.progress(Stage::Encoding, 0, total, "encoding texts");

        let mut embeddings: EmbeddingMatrix = Vec::with_capacity(texts.len());
        for (i, batch) in batches.into_iter().enumerate() {
            let rows = self.provider.encode(batch)?;
            check_shape(batch.len(), &rows)?;
            if let (Some(first), Some(row)) = (embeddings.first(), rows.first()) {
                if first.len() != row.len() {
                    return Err(EmbedError::WidthMismatch {
                        expected: first.len(),
                        received: row.len(),
                    }
                    .into());
                }
            }
            embeddings.extend(rows);
            debug!(batch = i + 1, of = total, "encoded batch");
            self.progress(Stage::Encoding, i + 1, total, &format!("encoded batch {}/{total}", i + 1));
        }
        Ok(embeddings)
    }

    fn derive(
        &self,
        records: &[Record],
        embeddings: &[Vec<f32>],
        config: &RunConfig,
    ) -> Result<Derived, EngineError> {
        self.progress(Stage::Reduction, 0, 1, "reducing dimensions");
        let reduced = Umap::new(config.reducer.clone()).fit_transform(embeddings)?;
        self.progress(Stage::Reduction, 1, 1, "dimensions reduced");

        self.progress(Stage::Clustering, 0, 1, "clustering");
        let clustering = DensityClusterer::new(config.density.clone()).fit(&reduced)?;
        info!(
            clusters = clustering.cluster_count,
            noise = clustering.noise_count,
            noise_ratio = clustering.noise_ratio(),
            "clustering finished"
        );
        self.progress(Stage::Clustering, 1, 1, "clusters found");

        self.progress(Stage::Summarization, 0, 1, "extracting keywords");
        let summaries = KeywordSummarizer::new(config.keywords.clone())
            .summarize(&texts(records), &clustering.labels)?;

        Ok(Derived {
            reduced,
            partition: clustering.labels,
            summaries,
        })
    }

    fn progress(&self, stage: Stage, done: usize, total: usize, message: &str) {
        self.reporter
            .report(stage.percent(done, total), 100, &format!("[{}] {message}", stage.name()));
    }

    fn finish(&self) {
        self.reporter.report(100, 100, "done");
        info!(
            rows = self.state.results.len(),
            clusters = self.state.results.cluster_count(),
            noise = self.state.results.noise_count(),
            "pipeline state updated"
        );
    }
}

fn texts(records: &[Record]) -> Vec<String> {
    records.iter().map(|r| r.text.clone()).collect()
}
