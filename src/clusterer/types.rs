use serde::{Deserialize, Serialize};

use crate::table::{Partition, NOISE_LABEL};

/// Labels produced by one density-clustering pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clustering {
    pub labels: Partition,
    pub cluster_count: usize,
    pub noise_count: usize,
}

impl Clustering {
    pub(crate) fn from_labels(labels: Partition) -> Self {
        let noise_count = labels.iter().filter(|&&l| l == NOISE_LABEL).count();
        let cluster_count = labels
            .iter()
            .filter(|&&l| l != NOISE_LABEL)
            .max()
            .map_or(0, |&m| m as usize + 1);
        Self {
            labels,
            cluster_count,
            noise_count,
        }
    }

    pub fn noise_ratio(&self) -> f32 {
        if self.labels.is_empty() {
            0.0
        } else {
            self.noise_count as f32 / self.labels.len() as f32
        }
    }
}
