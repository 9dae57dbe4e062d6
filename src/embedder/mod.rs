pub mod batcher;
pub mod client;
pub mod hashing;
pub mod model;
pub mod types;


pub use batcher::Batcher;
pub use client::{EmbedError, EmbeddingClient};
pub use hashing::HashingEmbedder;
pub use model::EmbeddingModelInfo;
pub use types::{EmbeddingRequest, EmbeddingResponse};

/// Maps text to fixed-width dense vectors.
///
/// Output rows follow input order. Implementations must be deterministic for
/// a fixed model; a failure aborts the whole pipeline run.
pub trait EmbeddingProvider: Send + Sync {
    fn model_info(&self) -> &EmbeddingModelInfo;

    fn encode(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;
}
