use std::collections::BTreeMap;

use crate::table::NOISE_LABEL;

pub fn compute_centroid(vectors: &[&[f32]]) -> Vec<f32> {
    let Some(first) = vectors.first() else {
        return Vec::new();
    };
    let dim = first.len();
    let mut out = vec![0.0; dim];

    for v in vectors {
        for (o, x) in out.iter_mut().zip(v.iter()) {
            *o += x;
        }
    }

    let n = vectors.len() as f32;
    for o in &mut out {
        *o /= n;
    }

    out
}

/// Mean vector of every non-noise label, keyed and ordered by label.
pub fn cluster_centroids(embeddings: &[Vec<f32>], labels: &[i32]) -> BTreeMap<i32, Vec<f32>> {
    let mut members: BTreeMap<i32, Vec<&[f32]>> = BTreeMap::new();
    for (row, &label) in embeddings.iter().zip(labels) {
        if label != NOISE_LABEL {
            members.entry(label).or_default().push(row);
        }
    }

    members
        .into_iter()
        .map(|(label, rows)| (label, compute_centroid(&rows)))
        .collect()
}
