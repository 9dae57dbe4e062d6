//! Read-only quality measures over a finished result table.

mod metrics;
mod types;

#[cfg(test)]
mod tests;

pub use metrics::{calinski_harabasz, silhouette};
pub use types::{
    ClusterSize, EvaluationReport, MergeCandidate, MetricValue, Metrics, ProjectedPoint,
    SimilarityReport,
};

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::clusterer::{cluster_centroids, similarity_matrix};
use crate::error::EngineError;
use crate::reducer::Umap;
use crate::table::{ResultTable, NOISE_LABEL};

/// Pairs of cluster centroids above this similarity are flagged for review.
pub const MERGE_CANDIDATE_SIMILARITY: f32 = 0.85;

/// Clusters listed in a report's size distribution.
pub const REPORT_TOP_CLUSTERS: usize = 20;

pub struct Evaluator<'a> {
    table: &'a ResultTable,
    embeddings: &'a [Vec<f32>],
}

impl<'a> Evaluator<'a> {
    pub fn new(table: &'a ResultTable, embeddings: &'a [Vec<f32>]) -> Result<Self, EngineError> {
        if table.len() != embeddings.len() {
            return Err(EngineError::validation(format!(
                "result table has {} rows but {} embeddings were given",
                table.len(),
                embeddings.len()
            )));
        }
        Ok(Self { table, embeddings })
    }

    pub fn compute_metrics(&self) -> Metrics {
        let total = self.table.len();
        let noise_count = self.table.noise_count();
        let clusters = self.table.cluster_count();
        let noise_ratio = if total == 0 {
            0.0
        } else {
            noise_count as f64 / total as f64
        };

        let (points, labels): (Vec<&[f32]>, Vec<i32>) = self
            .table
            .rows()
            .iter()
            .zip(self.embeddings)
            .filter(|(row, _)| row.cluster != NOISE_LABEL)
            .map(|(row, e)| (e.as_slice(), row.cluster))
            .unzip();

        let (silhouette, calinski_harabasz) = if clusters < 2 {
            warn!(clusters, "cluster quality scores need at least two clusters");
            let reason = format!("{clusters} non-noise cluster(s)");
            (
                MetricValue::NotApplicable(reason.clone()),
                MetricValue::NotApplicable(reason),
            )
        } else {
            (
                metrics::silhouette(&points, &labels),
                metrics::calinski_harabasz(&points, &labels),
            )
        };

        info!(total, clusters, noise_ratio, "computed cluster metrics");
        Metrics {
            total,
            clusters,
            noise_count,
            noise_ratio,
            silhouette,
            calinski_harabasz,
        }
    }

    /// Centroid similarity matrix and the pairs above
    /// `MERGE_CANDIDATE_SIMILARITY`. Advisory only.
    pub fn analyze_similarity(&self) -> SimilarityReport {
        let labels = self.table.labels();
        let centroids = cluster_centroids(self.embeddings, &labels);
        let summaries = self.table.summaries();

        let cluster_ids: Vec<i32> = centroids.keys().copied().collect();
        let names = cluster_ids
            .iter()
            .map(|id| {
                let first = summaries
                    .get(id)
                    .and_then(|kw| kw.split(',').next())
                    .unwrap_or("")
                    .trim();
                format!("C{id}: {first}")
            })
            .collect();
        let matrix = similarity_matrix(&centroids.into_values().collect::<Vec<_>>());

        let mut candidates = Vec::new();
        for i in 0..cluster_ids.len() {
            for j in i + 1..cluster_ids.len() {
                if matrix[i][j] > MERGE_CANDIDATE_SIMILARITY {
                    candidates.push(MergeCandidate {
                        left: cluster_ids[i],
                        right: cluster_ids[j],
                        similarity: matrix[i][j],
                    });
                }
            }
        }

        if cluster_ids.len() < 2 {
            warn!(clusters = cluster_ids.len(), "too few clusters for similarity analysis");
        } else {
            info!(candidates = candidates.len(), "analysed cluster similarity");
        }
        SimilarityReport {
            cluster_ids,
            labels: names,
            matrix,
            candidates,
        }
    }

    /// The `top_n` largest clusters, largest first; equal sizes by label.
    pub fn size_distribution(&self, top_n: usize) -> Vec<ClusterSize> {
        let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
        for row in self.table.rows() {
            if row.cluster != NOISE_LABEL {
                *counts.entry(row.cluster).or_default() += 1;
            }
        }
        let summaries = self.table.summaries();

        let mut sizes: Vec<ClusterSize> = counts
            .into_iter()
            .map(|(cluster, count)| ClusterSize {
                cluster,
                count,
                label: summaries
                    .get(&cluster)
                    .map(|kw| short_keywords(kw))
                    .unwrap_or_default(),
            })
            .collect();
        sizes.sort_by(|a, b| b.count.cmp(&a.count).then(a.cluster.cmp(&b.cluster)));
        sizes.truncate(top_n);
        sizes
    }

    /// Seeded 2-D projection of the embeddings for scatter plots.
    pub fn projection_2d(&self) -> Result<Vec<ProjectedPoint>, EngineError> {
        let planar = Umap::planar(15, 42).fit_transform(self.embeddings)?;
        Ok(planar
            .into_iter()
            .zip(self.table.rows())
            .map(|(xy, row)| ProjectedPoint {
                x: xy[0],
                y: xy[1],
                cluster: row.cluster,
            })
            .collect())
    }

    /// Metrics, sizes, similarity and projection together. A projection
    /// failure is logged and leaves `projection` empty.
    pub fn report(&self) -> EvaluationReport {
        let projection = match self.projection_2d() {
            Ok(points) => Some(points),
            Err(err) => {
                warn!(error = %err, "skipping 2-D projection");
                None
            }
        };
        EvaluationReport {
            metrics: self.compute_metrics(),
            size_distribution: self.size_distribution(REPORT_TOP_CLUSTERS),
            similarity: self.analyze_similarity(),
            projection,
        }
    }
}

fn short_keywords(keywords: &str) -> String {
    keywords
        .split(',')
        .take(2)
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(",")
}
