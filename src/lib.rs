// Public API exports
pub mod clusterer;
pub mod config;
pub mod db;
pub mod embedder;
pub mod engine;
pub mod error;
pub mod evaluate;
pub mod extract;
pub mod labeler;
pub mod merge;
pub mod reducer;
pub mod statepack;
pub mod summarizer;
pub mod table;
pub mod tasks;

// Re-export main types for convenience
pub use config::{AppConfig, DensityConfig, EngineSettings, KeywordConfig, ReducerConfig, RunConfig};
pub use error::EngineError;

pub use table::{
    ClusterSummary, EmbeddingMatrix, NOISE_LABEL, NOISE_SUMMARY, Partition, Record, ReducedMatrix,
    ResultRow, ResultTable,
};

pub use extract::ExtractionStrategy;

pub use embedder::{Batcher, EmbedError, EmbeddingClient, EmbeddingModelInfo, EmbeddingProvider, HashingEmbedder};

pub use reducer::Umap;

pub use clusterer::{Clustering, DensityClusterer};

pub use summarizer::KeywordSummarizer;

pub use labeler::{ClusterLabeler, LabelError, LabelerClient};

pub use merge::{ClusterMerger, MergeReport};

pub use evaluate::{EvaluationReport, Evaluator, MetricValue};

pub use engine::{ClusteringEngine, NoopReporter, PipelineState, ProgressReporter};

pub use tasks::{TaskRegistry, TaskSnapshot, TaskStatus};
