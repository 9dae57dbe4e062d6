use std::collections::BTreeSet;

use crate::error::EngineError;
use crate::table::{ClusterSummary, EmbeddingMatrix, Partition, Record, ReducedMatrix, ResultTable};

/// Everything one engine instance knows about its corpus.
///
/// Built whole by `run`, replaced whole by `re_cluster`, rewritten in place by
/// a merge. `records`, `embeddings`, `reduced` and `partition` stay
/// index-aligned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineState {
    pub records: Vec<Record>,
    pub embeddings: EmbeddingMatrix,
    pub reduced: ReducedMatrix,
    pub partition: Partition,
    pub summaries: ClusterSummary,
    pub results: ResultTable,
}

impl PipelineState {
    pub fn new(
        records: Vec<Record>,
        embeddings: EmbeddingMatrix,
        reduced: ReducedMatrix,
        partition: Partition,
        summaries: ClusterSummary,
    ) -> Result<Self, EngineError> {
        let n = records.len();
        if embeddings.len() != n || partition.len() != n || (!reduced.is_empty() && reduced.len() != n)
        {
            return Err(EngineError::state(format!(
                "misaligned state: {n} records, {} embeddings, {} reduced rows, {} labels",
                embeddings.len(),
                reduced.len(),
                partition.len()
            )));
        }
        let results = ResultTable::assemble(&records, &partition, &summaries)?;
        Ok(Self {
            records,
            embeddings,
            reduced,
            partition,
            summaries,
            results,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_embeddings(&self) -> bool {
        !self.embeddings.is_empty()
    }

    /// Drop summaries of labels no longer present and rebuild the table.
    pub(crate) fn relabel(&mut self, summaries: ClusterSummary) -> Result<(), EngineError> {
        let live: BTreeSet<i32> = self.partition.iter().copied().collect();
        self.summaries = summaries
            .into_iter()
            .filter(|(label, _)| live.contains(label))
            .collect();
        self.results = ResultTable::assemble(&self.records, &self.partition, &self.summaries)?;
        Ok(())
    }
}
