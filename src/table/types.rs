use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::{NOISE_LABEL, NOISE_SUMMARY};
use crate::error::EngineError;

/// One embedding per record, index-aligned with the records.
pub type EmbeddingMatrix = Vec<Vec<f32>>;

/// Low-dimensional projection of an `EmbeddingMatrix`. Regenerable, so a cache.
pub type ReducedMatrix = Vec<Vec<f32>>;

/// Cluster label per record; `NOISE_LABEL` for outliers.
pub type Partition = Vec<i32>;

/// Keyword string per cluster label.
pub type ClusterSummary = BTreeMap<i32, String>;

/// A single input unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub text: String,
    /// Opaque caller identifier, carried through untouched
    #[serde(default, alias = "id", skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

impl Record {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            external_id: None,
        }
    }

    pub fn with_id(text: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            external_id: Some(id.into()),
        }
    }

    /// Pair texts with optional identifiers. Counts must agree.
    pub fn zip(texts: Vec<String>, ids: Option<Vec<String>>) -> Result<Vec<Record>, EngineError> {
        match ids {
            None => Ok(texts.into_iter().map(Record::new).collect()),
            Some(ids) if ids.len() != texts.len() => Err(EngineError::validation(format!(
                "text count ({}) does not match identifier count ({})",
                texts.len(),
                ids.len()
            ))),
            Some(ids) => Ok(texts
                .into_iter()
                .zip(ids)
                .map(|(text, id)| Record::with_id(text, id))
                .collect()),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Flat, exportable row: identifier, text, cluster label, keyword summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub external_id: Option<String>,
    pub text: String,
    pub cluster: i32,
    pub keywords: String,
}

/// Join of records, partition and cluster summaries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    rows: Vec<ResultRow>,
}

impl ResultTable {
    /// Build the table. Labels without a summary fall back to an empty string,
    /// the noise label always carries `NOISE_SUMMARY`.
    pub fn assemble(
        records: &[Record],
        partition: &[i32],
        summaries: &ClusterSummary,
    ) -> Result<Self, EngineError> {
        if records.len() != partition.len() {
            return Err(EngineError::validation(format!(
                "partition has {} labels for {} records",
                partition.len(),
                records.len()
            )));
        }

        let rows = records
            .iter()
            .zip(partition)
            .map(|(record, &cluster)| ResultRow {
                external_id: record.external_id.clone(),
                text: record.text.clone(),
                cluster,
                keywords: summary_for(summaries, cluster),
            })
            .collect();

        Ok(Self { rows })
    }

    pub fn from_rows(rows: Vec<ResultRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn labels(&self) -> Partition {
        self.rows.iter().map(|r| r.cluster).collect()
    }

    pub fn records(&self) -> Vec<Record> {
        self.rows
            .iter()
            .map(|r| Record {
                text: r.text.clone(),
                external_id: r.external_id.clone(),
            })
            .collect()
    }

    /// Distinct non-noise labels, ascending
    pub fn cluster_ids(&self) -> Vec<i32> {
        self.rows
            .iter()
            .map(|r| r.cluster)
            .filter(|&c| c != NOISE_LABEL)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn cluster_count(&self) -> usize {
        self.cluster_ids().len()
    }

    pub fn noise_count(&self) -> usize {
        self.rows.iter().filter(|r| r.cluster == NOISE_LABEL).count()
    }

    /// Keyword string per label, as currently carried by the rows.
    pub fn summaries(&self) -> ClusterSummary {
        self.rows
            .iter()
            .map(|r| (r.cluster, r.keywords.clone()))
            .collect()
    }
}

fn summary_for(summaries: &ClusterSummary, cluster: i32) -> String {
    if cluster == NOISE_LABEL {
        return NOISE_SUMMARY.to_string();
    }
    summaries.get(&cluster).cloned().unwrap_or_default()
}
