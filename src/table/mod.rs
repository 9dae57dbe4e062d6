mod types;


pub use types::{
    ClusterSummary, EmbeddingMatrix, Partition, Record, ReducedMatrix, ResultRow, ResultTable,
};

/// Reserved partition value for records outside every dense cluster.
pub const NOISE_LABEL: i32 = -1;

/// Summary carried by the noise label in place of extracted keywords.
pub const NOISE_SUMMARY: &str = "Noise/Outliers";
