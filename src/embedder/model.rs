// model.rs - metadata about the encoder in use
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingModelInfo {
    pub dim: usize,
    pub name: String,
    pub max_batch: usize,
}

impl EmbeddingModelInfo {
    pub fn new(name: impl Into<String>, dim: usize, max_batch: usize) -> Self {
        Self {
            name: name.into(),
            dim,
            max_batch,
        }
    }

    pub fn bge_large_zh() -> Self {
        Self::new("BAAI/bge-large-zh-v1.5", 1024, 32)
    }
}

impl Default for EmbeddingModelInfo {
    fn default() -> Self {
        Self::bge_large_zh()
    }
}
