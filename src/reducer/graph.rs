use std::collections::BTreeMap;

use super::knn::KnnGraph;

const SMOOTH_K_TOLERANCE: f32 = 1e-5;
const MIN_K_DIST_SCALE: f32 = 1e-3;
const BANDWIDTH_ITERATIONS: usize = 64;
/// Cosine distance at which two vectors share no direction at all.
const DISCONNECTION_DISTANCE: f32 = 1.0;

/// Weighted undirected edge, stored once per direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Edge {
    pub head: usize,
    pub tail: usize,
    pub weight: f32,
}

/// Fuzzy neighbourhood graph: each point's nearest neighbour gets weight 1,
/// farther ones decay with a bandwidth chosen so the weights sum to
/// log2(k + 1). Directed weights are then combined as a fuzzy union.
///
/// Neighbours at [`DISCONNECTION_DISTANCE`] or beyond are dropped before
/// weighting: a point orthogonal to everything gets no edges instead of
/// full-weight links to whichever equidistant points ranked first.
pub(crate) fn fuzzy_edges(knn: &KnnGraph) -> Vec<Edge> {
    let n = knn.indices.len();
    let mean_all = mean(
        knn.distances
            .iter()
            .flatten()
            .copied()
            .filter(|&d| d < DISCONNECTION_DISTANCE),
    );

    let mut directed: Vec<BTreeMap<usize, f32>> = vec![BTreeMap::new(); n];
    for i in 0..n {
        let (neighbours, dists): (Vec<usize>, Vec<f32>) = knn.indices[i]
            .iter()
            .zip(&knn.distances[i])
            .filter(|&(_, &d)| d < DISCONNECTION_DISTANCE)
            .map(|(&j, &d)| (j, d))
            .unzip();
        if dists.is_empty() {
            continue;
        }
        let (rho, sigma) = smooth_bandwidth(&dists, mean_all);
        for (&j, &d) in neighbours.iter().zip(&dists) {
            let w = if d - rho <= 0.0 || sigma == 0.0 {
                1.0
            } else {
                (-(d - rho) / sigma).exp()
            };
            directed[i].insert(j, w);
        }
    }

    let mut symmetric: Vec<BTreeMap<usize, f32>> = vec![BTreeMap::new(); n];
    for i in 0..n {
        for (&j, &w_ij) in &directed[i] {
            let w_ji = directed[j].get(&i).copied().unwrap_or(0.0);
            let w = w_ij + w_ji - w_ij * w_ji;
            symmetric[i].insert(j, w);
            symmetric[j].insert(i, w);
        }
    }

    symmetric
        .into_iter()
        .enumerate()
        .flat_map(|(head, row)| {
            row.into_iter()
                .filter(|&(_, w)| w > 0.0)
                .map(move |(tail, weight)| Edge { head, tail, weight })
        })
        .collect()
}

/// Connected-component id of every vertex; ids are the smallest member index.
pub(crate) fn components(n: usize, edges: &[Edge]) -> Vec<usize> {
    let mut parent: Vec<usize> = (0..n).collect();
    for edge in edges {
        let a = find_root(&mut parent, edge.head);
        let b = find_root(&mut parent, edge.tail);
        if a != b {
            parent[a.max(b)] = a.min(b);
        }
    }
    (0..n).map(|v| find_root(&mut parent, v)).collect()
}

fn find_root(parent: &mut [usize], mut v: usize) -> usize {
    while parent[v] != v {
        parent[v] = parent[parent[v]];
        v = parent[v];
    }
    v
}

/// Distance to the nearest non-identical neighbour and the decay bandwidth.
fn smooth_bandwidth(dists: &[f32], mean_all: f32) -> (f32, f32) {
    let target = ((dists.len() + 1) as f32).log2();
    let rho = dists.iter().copied().find(|&d| d > 0.0).unwrap_or(0.0);

    let mut lo = 0.0f32;
    let mut hi = f32::INFINITY;
    let mut mid = 1.0f32;

    for _ in 0..BANDWIDTH_ITERATIONS {
        let psum: f32 = dists
            .iter()
            .map(|&d| {
                let excess = d - rho;
                if excess > 0.0 {
                    (-excess / mid).exp()
                } else {
                    1.0
                }
            })
            .sum();

        if (psum - target).abs() < SMOOTH_K_TOLERANCE {
            break;
        }
        if psum > target {
            hi = mid;
            mid = (lo + hi) / 2.0;
        } else {
            lo = mid;
            mid = if hi.is_infinite() {
                mid * 2.0
            } else {
                (lo + hi) / 2.0
            };
        }
    }

    let floor = if rho > 0.0 {
        MIN_K_DIST_SCALE * mean(dists.iter().copied())
    } else {
        MIN_K_DIST_SCALE * mean_all
    };
    (rho, mid.max(floor))
}

fn mean(values: impl Iterator<Item = f32>) -> f32 {
    let (sum, count) = values.fold((0.0f32, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f32
    }
}
