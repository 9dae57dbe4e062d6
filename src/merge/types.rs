use serde::{Deserialize, Serialize};

/// One cluster folded into another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeStep {
    pub source: i32,
    /// Final label after transitive resolution.
    pub target: i32,
    pub similarity: f32,
}

/// Outcome of a merge. `skipped` explains a no-op.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeReport {
    pub merges: Vec<MergeStep>,
    pub passes: usize,
    pub skipped: Option<String>,
}

impl MergeReport {
    pub(crate) fn skipped(reason: impl Into<String>) -> Self {
        Self {
            skipped: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn merged_count(&self) -> usize {
        self.merges.len()
    }
}
