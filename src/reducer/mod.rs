//! Neighbourhood-preserving projection of embeddings into a few dimensions.
//!
//! The pipeline is: cosine k-nearest-neighbours, a fuzzy neighbourhood graph
//! with per-point bandwidths, then a stochastic layout that pulls graph
//! neighbours together and pushes random pairs apart. Components too small to
//! fill a neighbourhood, such as records orthogonal to everything else, are
//! then moved outside the main layout. Every random draw comes from one seeded
//! ChaCha stream, so identical inputs give identical outputs.

mod graph;
mod knn;
mod layout;
mod pca;


pub use layout::find_ab_params;
pub use pca::principal_components;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::config::ReducerConfig;
use crate::error::EngineError;
use crate::table::ReducedMatrix;

/// Seeded UMAP-style reducer.
pub struct Umap {
    config: ReducerConfig,
}

impl Umap {
    pub fn new(config: ReducerConfig) -> Self {
        Self { config }
    }

    /// Two-dimensional projection used for plotting.
    pub fn planar(n_neighbors: usize, seed: u64) -> Self {
        Self::new(ReducerConfig {
            n_neighbors,
            n_components: 2,
            seed,
            ..ReducerConfig::default()
        })
    }

    pub fn config(&self) -> &ReducerConfig {
        &self.config
    }

    /// Project an (n × d) matrix to (n × k), k = `n_components` < d.
    pub fn fit_transform(&self, data: &[Vec<f32>]) -> Result<ReducedMatrix, EngineError> {
        let n = data.len();
        let k = self.config.n_components;
        if n == 0 {
            return Err(EngineError::validation("cannot reduce an empty matrix"));
        }
        let dim = data[0].len();
        if data.iter().any(|row| row.len() != dim) {
            return Err(EngineError::validation("embedding rows differ in width"));
        }
        if k == 0 || k >= dim {
            return Err(EngineError::validation(format!(
                "target dimensionality {k} must be between 1 and input width {dim} (exclusive)"
            )));
        }
        if n == 1 {
            return Ok(vec![vec![0.0; k]]);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let n_neighbors = self.config.n_neighbors.max(2).min(n);

        let knn = knn::cosine_knn(data, n_neighbors - 1, &mut rng);
        let edges = graph::fuzzy_edges(&knn);
        let component = graph::components(n, &edges);
        debug!(points = n, edges = edges.len(), "built neighbourhood graph");

        let mut embedding = initial_layout(data, k, &mut rng);

        let n_epochs = self
            .config
            .n_epochs
            .unwrap_or(if n <= 10_000 { 500 } else { 200 });
        let (a, b) = find_ab_params(self.config.spread, self.config.min_dist);
        layout::optimize(
            &mut embedding,
            k,
            &edges,
            layout::Schedule {
                n_epochs,
                a,
                b,
                negative_sample_rate: self.config.negative_sample_rate,
            },
            &mut rng,
        );
        layout::detach_small_components(&mut embedding, k, &component, n_neighbors, &mut rng);

        Ok(embedding.chunks(k).map(|row| row.to_vec()).collect())
    }
}

/// Principal-axis start scaled into [-10, 10], jittered so coincident points
/// can separate. Falls back to a uniform scatter when the data has no spread.
fn initial_layout(data: &[Vec<f32>], k: usize, rng: &mut ChaCha8Rng) -> Vec<f32> {
    let normalised: Vec<Vec<f32>> = data.iter().map(|row| unit(row)).collect();
    let projected = principal_components(&normalised, k, rng);

    let max_abs = projected
        .iter()
        .flatten()
        .fold(0.0f32, |acc, v| acc.max(v.abs()));

    if max_abs <= f32::EPSILON {
        return (0..data.len() * k)
            .map(|_| rng.gen_range(-10.0..10.0))
            .collect();
    }

    let scale = 10.0 / max_abs;
    projected
        .into_iter()
        .flatten()
        .map(|v| v * scale + rng.gen_range(-1e-4..1e-4))
        .collect()
}

fn unit(row: &[f32]) -> Vec<f32> {
    let norm = row.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return row.to_vec();
    }
    row.iter().map(|x| x / norm).collect()
}
