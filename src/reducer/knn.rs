use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::clusterer::cosine_similarity;

/// Nearest neighbours of every point, self excluded, closest first.
pub(crate) struct KnnGraph {
    pub indices: Vec<Vec<usize>>,
    pub distances: Vec<Vec<f32>>,
}

/// Exhaustive cosine-distance neighbour search.
///
/// Exact ties are ordered by a random rank drawn once per point from `rng`,
/// so equidistant candidates are not all taken from the front of the input.
pub(crate) fn cosine_knn(data: &[Vec<f32>], k: usize, rng: &mut ChaCha8Rng) -> KnnGraph {
    let n = data.len();
    let k = k.min(n.saturating_sub(1));
    let rank: Vec<u64> = (0..n).map(|_| rng.gen()).collect();
    let mut indices = Vec::with_capacity(n);
    let mut distances = Vec::with_capacity(n);

    for i in 0..n {
        let mut row: Vec<(f32, usize)> = (0..n)
            .filter(|&j| j != i)
            .map(|j| ((1.0 - cosine_similarity(&data[i], &data[j])).max(0.0), j))
            .collect();
        row.sort_by(|a, b| {
            a.0.total_cmp(&b.0)
                .then(rank[a.1].cmp(&rank[b.1]))
                .then(a.1.cmp(&b.1))
        });
        row.truncate(k);

        indices.push(row.iter().map(|&(_, j)| j).collect());
        distances.push(row.iter().map(|&(d, _)| d).collect());
    }

    KnnGraph { indices, distances }
}
