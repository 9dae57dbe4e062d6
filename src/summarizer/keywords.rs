use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use super::tokenizer::tokenize;
use crate::config::KeywordConfig;
use crate::error::EngineError;
use crate::table::{ClusterSummary, NOISE_LABEL, NOISE_SUMMARY};

/// Inclusive document-frequency window for `clusters` aggregate documents.
pub fn df_bounds(clusters: usize, min_fraction: f64, max_fraction: f64) -> (usize, usize) {
    let min_df = if clusters > 2 {
        ((clusters as f64 * min_fraction) as usize).max(1)
    } else {
        1
    };
    let max_df = clusters
        .saturating_sub(1)
        .max((clusters as f64 * max_fraction) as usize)
        .max(min_df);
    (min_df, max_df)
}

/// Class-based keyword extraction: every cluster's texts are concatenated
/// into one document, and terms are counted per cluster document.
pub struct KeywordSummarizer {
    config: KeywordConfig,
}

impl KeywordSummarizer {
    pub fn new(config: KeywordConfig) -> Self {
        Self { config }
    }

    /// One comma-joined keyword string per non-noise label, plus the noise
    /// sentinel when any record is noise.
    pub fn summarize<S: AsRef<str>>(
        &self,
        texts: &[S],
        labels: &[i32],
    ) -> Result<ClusterSummary, EngineError> {
        if texts.len() != labels.len() {
            return Err(EngineError::validation(format!(
                "{} texts but {} labels",
                texts.len(),
                labels.len()
            )));
        }

        let mut documents: BTreeMap<i32, BTreeMap<String, usize>> = BTreeMap::new();
        let mut has_noise = false;
        for (text, &label) in texts.iter().zip(labels) {
            if label == NOISE_LABEL {
                has_noise = true;
                continue;
            }
            let counts = documents.entry(label).or_default();
            for token in tokenize(text.as_ref()) {
                *counts.entry(token).or_default() += 1;
            }
        }

        let mut summary = ClusterSummary::new();
        if has_noise {
            summary.insert(NOISE_LABEL, NOISE_SUMMARY.to_string());
        }
        if documents.is_empty() {
            return Ok(summary);
        }

        let (min_df, max_df) = df_bounds(
            documents.len(),
            self.config.min_df_fraction,
            self.config.max_df_fraction,
        );
        let mut document_frequency: BTreeMap<&str, usize> = BTreeMap::new();
        for counts in documents.values() {
            for term in counts.keys() {
                *document_frequency.entry(term.as_str()).or_default() += 1;
            }
        }
        let vocabulary: BTreeSet<&str> = document_frequency
            .into_iter()
            .filter(|&(_, df)| df >= min_df && df <= max_df)
            .map(|(term, _)| term)
            .collect();

        if vocabulary.is_empty() {
            warn!(
                clusters = documents.len(),
                min_df, max_df, "no terms survive the document-frequency window"
            );
        }
        debug!(
            clusters = documents.len(),
            vocabulary = vocabulary.len(),
            min_df,
            max_df,
            "built cluster term counts"
        );

        for (&label, counts) in &documents {
            let mut ranked: Vec<(&str, usize)> = counts
                .iter()
                .filter(|(term, count)| **count > 0 && vocabulary.contains(term.as_str()))
                .map(|(term, &count)| (term.as_str(), count))
                .collect();
            ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
            ranked.truncate(self.config.top_n);

            let keywords: Vec<&str> = ranked.into_iter().map(|(term, _)| term).collect();
            summary.insert(label, keywords.join(", "));
        }

        Ok(summary)
    }
}
