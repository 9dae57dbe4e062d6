use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

use super::{EmbedError, EmbeddingModelInfo, EmbeddingProvider};
use crate::summarizer::is_cjk;

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+").expect("word pattern is valid"));

/// Offline encoder: signed feature hashing of words and CJK character
/// bigrams, L2-normalised.
///
/// Texts sharing vocabulary point the same way, which is all the pipeline
/// needs when no model server is reachable.
pub struct HashingEmbedder {
    info: EmbeddingModelInfo,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self {
            info: EmbeddingModelInfo::new("feature-hashing", dim.max(1), 256),
        }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let dim = self.info.dim;
        let mut out = vec![0.0f32; dim];

        for feature in features(text) {
            let digest = Sha256::digest(feature.as_bytes());
            let mut head = [0u8; 8];
            head.copy_from_slice(&digest[..8]);
            let h = u64::from_le_bytes(head);
            let slot = (h % dim as u64) as usize;
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            out[slot] += sign;
        }

        let norm = out.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut out {
                *x /= norm;
            }
        }
        out
    }
}

impl EmbeddingProvider for HashingEmbedder {
    fn model_info(&self) -> &EmbeddingModelInfo {
        &self.info
    }

    fn encode(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(batch.iter().map(|t| self.embed_one(t)).collect())
    }
}

fn features(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut out = Vec::new();

    for word in WORD.find_iter(&lowered).map(|m| m.as_str()) {
        let chars: Vec<char> = word.chars().collect();
        if chars.iter().any(|c| is_cjk(*c)) && chars.len() > 1 {
            out.extend(chars.windows(2).map(|w| w.iter().collect::<String>()));
        } else {
            out.push(word.to_string());
        }
    }
    out
}
