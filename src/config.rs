use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::EngineError;

/// Neighbourhood-graph projection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReducerConfig {
    /// Neighbourhood size. Smaller favours fine local clusters.
    pub n_neighbors: usize,
    /// Target dimensionality; 5-10 suits the density clusterer.
    pub n_components: usize,
    pub min_dist: f32,
    pub spread: f32,
    /// Optimisation epochs. `None` picks 500 for small inputs, 200 for large.
    pub n_epochs: Option<usize>,
    pub negative_sample_rate: usize,
    pub seed: u64,
}

impl Default for ReducerConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 15,
            n_components: 5,
            min_dist: 0.1,
            spread: 1.0,
            n_epochs: None,
            negative_sample_rate: 5,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DensityConfig {
    /// Smallest group that counts as a cluster; anything sparser is noise.
    pub min_cluster_size: usize,
    /// Core-distance neighbour count. Defaults to `min_cluster_size`.
    pub min_samples: Option<usize>,
}

impl Default for DensityConfig {
    fn default() -> Self {
        Self {
            min_cluster_size: 10,
            min_samples: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    pub top_n: usize,
    /// Lower document-frequency bound as a fraction of the cluster count.
    pub min_df_fraction: f64,
    /// Upper document-frequency bound as a fraction of the cluster count.
    pub max_df_fraction: f64,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            top_n: 5,
            min_df_fraction: 0.5,
            max_df_fraction: 0.7,
        }
    }
}

/// Parameters for one `run` or `re_cluster` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub reducer: ReducerConfig,
    pub density: DensityConfig,
    pub keywords: KeywordConfig,
}

impl RunConfig {
    pub fn with_min_cluster_size(mut self, size: usize) -> Self {
        self.density.min_cluster_size = size;
        self
    }

    pub fn with_neighbors(mut self, n_neighbors: usize) -> Self {
        self.reducer.n_neighbors = n_neighbors;
        self
    }

    pub fn with_components(mut self, n_components: usize) -> Self {
        self.reducer.n_components = n_components;
        self
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.keywords.top_n = top_n;
        self
    }

    /// Reject parameter combinations no stage can work with.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.reducer.n_neighbors < 2 {
            return Err(EngineError::validation(format!(
                "n_neighbors must be >= 2, got {}",
                self.reducer.n_neighbors
            )));
        }
        if self.reducer.n_components == 0 {
            return Err(EngineError::validation("n_components must be >= 1"));
        }
        if self.density.min_cluster_size == 0 {
            return Err(EngineError::validation("min_cluster_size must be >= 1"));
        }
        if self.keywords.top_n == 0 {
            return Err(EngineError::validation("keyword top_n must be >= 1"));
        }
        let fractions = [self.keywords.min_df_fraction, self.keywords.max_df_fraction];
        if fractions.iter().any(|f| !(0.0..=1.0).contains(f)) {
            return Err(EngineError::validation(
                "document-frequency fractions must lie in [0, 1]",
            ));
        }
        Ok(())
    }
}

/// Orchestrator-wide settings that outlive a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Records per encoding request.
    pub batch_size: usize,
    /// Re-extract keywords after a merge instead of keeping the old ones.
    pub refresh_keywords_after_merge: bool,
    pub merge_threshold: f32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            batch_size: 32,
            refresh_keywords_after_merge: false,
            merge_threshold: 0.9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding server base URL. Without one, the offline hashing provider is used.
    pub endpoint: Option<String>,
    pub model: String,
    /// Width of the offline hashing provider.
    pub hashing_dim: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: "BAAI/bge-large-zh-v1.5".to_string(),
            hashing_dim: 512,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelerSettings {
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
    pub seed: u64,
}

impl Default for LabelerSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: 180,
            seed: 42,
        }
    }
}

/// Everything the command-line front end reads from its TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub embedding: EmbeddingSettings,
    pub pipeline: RunConfig,
    pub engine: EngineSettings,
    pub labeler: LabelerSettings,
}

impl AppConfig {
    /// Load from a TOML file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .context(format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&raw).context(format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_pipeline_conventions() {
        let config = RunConfig::default();
        assert_eq!(config.reducer.n_neighbors, 15);
        assert_eq!(config.reducer.n_components, 5);
        assert_eq!(config.reducer.seed, 42);
        assert_eq!(config.density.min_cluster_size, 10);
        assert_eq!(config.keywords.top_n, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(RunConfig::default().with_neighbors(1).validate().is_err());
        assert!(RunConfig::default().with_components(0).validate().is_err());
        assert!(RunConfig::default().with_min_cluster_size(0).validate().is_err());
        assert!(RunConfig::default().with_top_n(0).validate().is_err());

        let mut config = RunConfig::default();
        config.keywords.max_df_fraction = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [pipeline.density]
            min_cluster_size = 4

            [engine]
            refresh_keywords_after_merge = true

            [embedding]
            endpoint = "http://localhost:18115"
            "#,
        )
        .unwrap();

        assert_eq!(config.pipeline.density.min_cluster_size, 4);
        assert_eq!(config.pipeline.reducer.n_neighbors, 15);
        assert!(config.engine.refresh_keywords_after_merge);
        assert_eq!(config.engine.batch_size, 32);
        assert_eq!(
            config.embedding.endpoint.as_deref(),
            Some("http://localhost:18115")
        );
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(AppConfig::from_toml("").unwrap(), AppConfig::default());
    }
}
