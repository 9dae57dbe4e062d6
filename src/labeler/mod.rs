//! Optional LLM naming of clusters from a small seeded sample of members.

mod client;
mod types;


pub use client::{LabelError, LabelerClient};
pub use types::{SummarizeRequest, SummarizeResponse};

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use crate::engine::ProgressReporter;
use crate::table::{ClusterSummary, ResultTable, NOISE_LABEL, NOISE_SUMMARY};

/// Label written for a cluster whose labelling call failed.
pub const LABEL_FAILED: &str = "Labelling failed";

const MIN_SAMPLES: usize = 5;
const MAX_SAMPLES: usize = 50;

/// Anything that can name a cluster from sample member texts.
pub trait ClusterLabeler: Send + Sync {
    fn label(&self, samples: &[String]) -> Result<String, LabelError>;
}

/// Ten percent of the cluster, rounded up, kept within `[5, 50]` and never
/// more than the cluster holds.
pub fn sample_size(cluster_len: usize) -> usize {
    cluster_len
        .div_ceil(10)
        .max(MIN_SAMPLES)
        .min(MAX_SAMPLES)
        .min(cluster_len)
}

/// Seeded sample of member texts, in member order.
pub fn sample_cluster_texts(members: &[&str], seed: u64) -> Vec<String> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut picked: Vec<usize> = (0..members.len()).collect();
    picked.shuffle(&mut rng);
    picked.truncate(sample_size(members.len()));
    picked.sort_unstable();
    picked.into_iter().map(|i| members[i].to_string()).collect()
}

/// Ask `labeler` for one label per non-noise cluster of `table`.
///
/// Failed calls become `LABEL_FAILED` and the remaining clusters are still
/// labelled. Progress is reported per cluster as `(done, total, message)`.
pub fn label_clusters(
    table: &ResultTable,
    labeler: &dyn ClusterLabeler,
    reporter: &dyn ProgressReporter,
    seed: u64,
) -> ClusterSummary {
    let mut members: BTreeMap<i32, Vec<&str>> = BTreeMap::new();
    for row in table.rows() {
        members.entry(row.cluster).or_default().push(row.text.as_str());
    }

    let mut labels = ClusterSummary::new();
    if members.remove(&NOISE_LABEL).is_some() {
        labels.insert(NOISE_LABEL, NOISE_SUMMARY.to_string());
    }

    let total = members.len();
    info!(clusters = total, "labelling clusters");
    for (done, (cluster, texts)) in members.into_iter().enumerate() {
        reporter.report(done, total, &format!("labelling cluster {cluster}"));
        let samples = sample_cluster_texts(&texts, seed);
        let label = match labeler.label(&samples) {
            Ok(label) => label,
            Err(err) => {
                warn!(cluster, error = %err, "cluster labelling failed");
                LABEL_FAILED.to_string()
            }
        };
        labels.insert(cluster, label);
    }
    reporter.report(total, total, "all clusters labelled");

    labels
}
