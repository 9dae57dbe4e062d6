//! Collapse clusters whose centroids are near-duplicates in cosine space.

mod types;


pub use types::{MergeReport, MergeStep};

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::clusterer::{cluster_centroids, similarity_matrix};
use crate::error::EngineError;
use crate::table::NOISE_LABEL;

/// Greedy centroid merger. Higher labels fold into lower ones.
pub struct ClusterMerger {
    threshold: f32,
}

impl ClusterMerger {
    pub fn new(threshold: f32) -> Result<Self, EngineError> {
        if !(threshold > 0.0 && threshold < 1.0) {
            return Err(EngineError::validation(format!(
                "merge threshold must lie in (0, 1), got {threshold}"
            )));
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Rewrite `labels` in place until no pair of clusters is above the
    /// threshold. Noise rows are never read or written.
    ///
    /// Passes repeat until one changes nothing. Each fold moves the surviving
    /// centroid, so a single call can also collapse chains that only cross
    /// the threshold after earlier folds, and a second call finds nothing.
    pub fn merge(
        &self,
        labels: &mut [i32],
        embeddings: &[Vec<f32>],
    ) -> Result<MergeReport, EngineError> {
        if labels.len() != embeddings.len() {
            return Err(EngineError::validation(format!(
                "{} labels for {} embeddings",
                labels.len(),
                embeddings.len()
            )));
        }

        let clusters = cluster_centroids(embeddings, labels).len();
        if clusters < 2 {
            warn!(clusters, "fewer than two clusters, nothing to merge");
            return Ok(MergeReport::skipped(format!(
                "{clusters} non-noise cluster(s), at least 2 required"
            )));
        }

        let mut report = MergeReport::default();
        loop {
            let steps = self.merge_pass(labels, embeddings);
            report.passes += 1;
            if steps.is_empty() {
                break;
            }
            debug!(pass = report.passes, merges = steps.len(), "merge pass");
            report.merges.extend(steps);
        }

        if report.merges.is_empty() {
            info!(threshold = self.threshold, "no clusters above merge threshold");
        } else {
            info!(
                threshold = self.threshold,
                merged = report.merges.len(),
                passes = report.passes,
                "merged similar clusters"
            );
        }
        Ok(report)
    }

    /// One descending scan over current centroids, then a rewrite of `labels`.
    fn merge_pass(&self, labels: &mut [i32], embeddings: &[Vec<f32>]) -> Vec<MergeStep> {
        let centroids = cluster_centroids(embeddings, labels);
        let ids: Vec<i32> = centroids.keys().copied().collect();
        let vectors: Vec<Vec<f32>> = centroids.into_values().collect();
        let sim = similarity_matrix(&vectors);

        let mut parent: BTreeMap<i32, i32> = ids.iter().map(|&id| (id, id)).collect();
        let mut chosen = Vec::new();
        for i in (1..ids.len()).rev() {
            let mut best: Option<(usize, f32)> = None;
            for j in 0..i {
                let s = sim[i][j];
                if s > self.threshold && best.map_or(true, |(_, b)| s > b) {
                    best = Some((j, s));
                }
            }
            if let Some((j, s)) = best {
                parent.insert(ids[i], ids[j]);
                chosen.push((ids[i], s));
            }
        }

        let resolve = |mut id: i32| {
            while let Some(&next) = parent.get(&id) {
                if next == id {
                    break;
                }
                id = next;
            }
            id
        };

        for label in labels.iter_mut().filter(|l| **l != NOISE_LABEL) {
            *label = resolve(*label);
        }

        chosen
            .into_iter()
            .map(|(source, similarity)| MergeStep {
                source,
                target: resolve(source),
                similarity,
            })
            .collect()
    }
}
