use std::collections::BTreeMap;

use hdbscan::{DistanceMetric, Hdbscan, HdbscanHyperParams};
use tracing::{debug, warn};

use super::types::Clustering;
use crate::config::DensityConfig;
use crate::error::EngineError;
use crate::table::NOISE_LABEL;

/// HDBSCAN over Euclidean distance with excess-of-mass cluster selection.
pub struct DensityClusterer {
    config: DensityConfig,
}

impl DensityClusterer {
    pub fn new(config: DensityConfig) -> Self {
        Self { config }
    }

    /// Label every row of `points`: `-1` for noise, `0..m` for clusters.
    ///
    /// A minimum cluster size of 1 means "no noise": the pass runs with size
    /// 2 and each leftover point becomes a cluster of its own.
    pub fn fit(&self, points: &[Vec<f32>]) -> Result<Clustering, EngineError> {
        if points.iter().flatten().any(|v| !v.is_finite()) {
            return Err(EngineError::validation("reduced matrix contains non-finite values"));
        }
        let singletons = self.config.min_cluster_size <= 1;
        let min_cluster_size = self.config.min_cluster_size.max(2);
        let min_samples = self.config.min_samples.unwrap_or(min_cluster_size).max(1);
        let n = points.len();

        let raw = if n < 2 || n <= min_samples || n < min_cluster_size {
            warn!(
                points = n,
                min_cluster_size, min_samples, "too few points for density clustering"
            );
            vec![NOISE_LABEL; n]
        } else {
            let data: Vec<Vec<f64>> = points
                .iter()
                .map(|row| row.iter().map(|&v| v as f64).collect())
                .collect();
            let params = HdbscanHyperParams::builder()
                .min_cluster_size(min_cluster_size)
                .min_samples(min_samples)
                .dist_metric(DistanceMetric::Euclidean)
                .build();
            Hdbscan::new(&data, params)
                .cluster()
                .map_err(|e| EngineError::dependency("clustering", format!("{e:?}")))?
        };

        let mut labels = densify(&raw);
        if singletons {
            let mut next = labels.iter().copied().max().unwrap_or(NOISE_LABEL) + 1;
            for label in labels.iter_mut().filter(|l| **l == NOISE_LABEL) {
                *label = next;
                next += 1;
            }
        }

        let clustering = Clustering::from_labels(labels);
        debug!(
            clusters = clustering.cluster_count,
            noise = clustering.noise_count,
            "density clustering finished"
        );
        Ok(clustering)
    }
}

/// Map raw non-noise labels onto `0..m`, keeping their relative order.
pub(crate) fn densify(raw: &[i32]) -> Vec<i32> {
    let mut mapping = BTreeMap::new();
    for &label in raw {
        if label >= 0 {
            mapping.insert(label, 0);
        }
    }
    for (dense, slot) in mapping.values_mut().enumerate() {
        *slot = dense as i32;
    }
    raw.iter()
        .map(|l| mapping.get(l).copied().unwrap_or(NOISE_LABEL))
        .collect()
}
