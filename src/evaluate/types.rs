use serde::{Deserialize, Serialize};

/// A score, or the reason it could not be computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricValue {
    Value(f64),
    NotApplicable(String),
}

impl MetricValue {
    pub fn value(&self) -> Option<f64> {
        match self {
            MetricValue::Value(v) => Some(*v),
            MetricValue::NotApplicable(_) => None,
        }
    }

    pub fn is_applicable(&self) -> bool {
        matches!(self, MetricValue::Value(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub total: usize,
    pub clusters: usize,
    pub noise_count: usize,
    pub noise_ratio: f64,
    /// Mean silhouette over non-noise rows, cosine distance.
    pub silhouette: MetricValue,
    /// Variance ratio over non-noise rows, Euclidean.
    pub calinski_harabasz: MetricValue,
}

/// A pair of clusters worth a human look before merging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeCandidate {
    pub left: i32,
    pub right: i32,
    pub similarity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityReport {
    pub cluster_ids: Vec<i32>,
    /// `C{id}: {first keyword}` per cluster, for axis labels.
    pub labels: Vec<String>,
    pub matrix: Vec<Vec<f32>>,
    pub candidates: Vec<MergeCandidate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSize {
    pub cluster: i32,
    pub count: usize,
    /// First two keywords of the cluster summary.
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedPoint {
    pub x: f32,
    pub y: f32,
    pub cluster: i32,
}

/// Everything the evaluator knows, in one serializable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub metrics: Metrics,
    pub size_distribution: Vec<ClusterSize>,
    pub similarity: SimilarityReport,
    pub projection: Option<Vec<ProjectedPoint>>,
}
