use std::collections::BTreeMap;

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use super::graph::Edge;

const GRADIENT_CLIP: f32 = 4.0;
const REPULSION_EPSILON: f32 = 1e-3;
/// Shell spacing for detached components, in multiples of the widest extent.
const DETACH_SPACING: f32 = 5.0;

pub(crate) struct Schedule {
    pub n_epochs: usize,
    pub a: f32,
    pub b: f32,
    pub negative_sample_rate: usize,
}

/// Fit `a` and `b` of the low-dimensional similarity `1 / (1 + a·x^(2b))` to
/// an offset exponential decay with the given `spread` and `min_dist`.
///
/// Coarse-to-fine grid search on the squared error over 300 samples of
/// [0, 3·spread]. Deterministic and accurate to roughly 1e-3.
pub fn find_ab_params(spread: f32, min_dist: f32) -> (f32, f32) {
    let spread = spread as f64;
    let min_dist = min_dist as f64;
    let xs: Vec<f64> = (0..300).map(|i| 3.0 * spread * i as f64 / 299.0).collect();
    let ys: Vec<f64> = xs
        .iter()
        .map(|&x| {
            if x < min_dist {
                1.0
            } else {
                (-(x - min_dist) / spread).exp()
            }
        })
        .collect();

    let error = |a: f64, b: f64| -> f64 {
        xs.iter()
            .zip(&ys)
            .map(|(&x, &y)| {
                let fit = 1.0 / (1.0 + a * x.powf(2.0 * b));
                (fit - y).powi(2)
            })
            .sum()
    };

    let (mut a_lo, mut a_hi) = (0.001f64, 10.0f64);
    let (mut b_lo, mut b_hi) = (0.1f64, 3.0f64);
    let steps = 24;
    let (mut best_a, mut best_b) = (1.0, 1.0);

    for _ in 0..12 {
        let mut best_err = f64::INFINITY;
        for i in 0..=steps {
            let a = a_lo + (a_hi - a_lo) * i as f64 / steps as f64;
            for j in 0..=steps {
                let b = b_lo + (b_hi - b_lo) * j as f64 / steps as f64;
                let err = error(a, b);
                if err < best_err {
                    best_err = err;
                    best_a = a;
                    best_b = b;
                }
            }
        }
        let a_step = (a_hi - a_lo) / steps as f64;
        let b_step = (b_hi - b_lo) / steps as f64;
        a_lo = (best_a - 2.0 * a_step).max(1e-6);
        a_hi = best_a + 2.0 * a_step;
        b_lo = (best_b - 2.0 * b_step).max(1e-6);
        b_hi = best_b + 2.0 * b_step;
    }

    (best_a as f32, best_b as f32)
}

/// Stochastic layout optimisation over a flat row-major `embedding`.
///
/// Each edge is sampled in proportion to its weight. A sample pulls both
/// endpoints together, then pushes the head away from a few random points.
/// The learning rate decays linearly to zero.
pub(crate) fn optimize(
    embedding: &mut [f32],
    dim: usize,
    edges: &[Edge],
    schedule: Schedule,
    rng: &mut ChaCha8Rng,
) {
    let n_vertices = embedding.len() / dim;
    let Schedule {
        n_epochs,
        a,
        b,
        negative_sample_rate,
    } = schedule;
    if n_epochs == 0 || edges.is_empty() {
        return;
    }

    let max_weight = edges.iter().fold(0.0f32, |m, e| m.max(e.weight));
    let cutoff = max_weight / n_epochs as f32;
    let edges: Vec<Edge> = edges.iter().copied().filter(|e| e.weight >= cutoff).collect();

    let epochs_per_sample: Vec<f32> = edges.iter().map(|e| max_weight / e.weight).collect();
    let neg_rate = negative_sample_rate.max(1) as f32;
    let epochs_per_negative: Vec<f32> = epochs_per_sample.iter().map(|e| e / neg_rate).collect();
    let mut next_sample = epochs_per_sample.clone();
    let mut next_negative = epochs_per_negative.clone();

    let clip = |v: f32| v.clamp(-GRADIENT_CLIP, GRADIENT_CLIP);
    let mut alpha = 1.0f32;

    for epoch in 0..n_epochs {
        let now = epoch as f32;
        for (e, edge) in edges.iter().enumerate() {
            if next_sample[e] > now {
                continue;
            }
            let (j, k) = (edge.head, edge.tail);

            let d2 = squared_distance(embedding, dim, j, k);
            let attract = if d2 > 0.0 {
                -2.0 * a * b * d2.powf(b - 1.0) / (a * d2.powf(b) + 1.0)
            } else {
                0.0
            };
            for d in 0..dim {
                let grad = clip(attract * (embedding[j * dim + d] - embedding[k * dim + d]));
                embedding[j * dim + d] += grad * alpha;
                embedding[k * dim + d] -= grad * alpha;
            }
            next_sample[e] += epochs_per_sample[e];

            let n_neg = ((now - next_negative[e]) / epochs_per_negative[e]).max(0.0) as usize;
            for _ in 0..n_neg {
                let other = rng.gen_range(0..n_vertices);
                if other == j {
                    continue;
                }
                let d2 = squared_distance(embedding, dim, j, other);
                let repel = if d2 > 0.0 {
                    2.0 * b / ((REPULSION_EPSILON + d2) * (a * d2.powf(b) + 1.0))
                } else {
                    0.0
                };
                for d in 0..dim {
                    let grad = if repel > 0.0 {
                        clip(repel * (embedding[j * dim + d] - embedding[other * dim + d]))
                    } else {
                        GRADIENT_CLIP
                    };
                    embedding[j * dim + d] += grad * alpha;
                }
            }
            next_negative[e] += n_neg as f32 * epochs_per_negative[e];
        }
        alpha = 1.0 - (epoch + 1) as f32 / n_epochs as f32;
    }
}

/// Move every component with fewer than `min_size` vertices out of the main
/// layout, each as a rigid group onto its own shell around the centre of the
/// remaining points.
///
/// Shell `s` sits `DETACH_SPACING · (s + 1)` extents out, so any distance to
/// a detached vertex exceeds every distance within the main layout. The
/// largest component always stays, whatever `min_size` says.
pub(crate) fn detach_small_components(
    embedding: &mut [f32],
    dim: usize,
    component: &[usize],
    min_size: usize,
    rng: &mut ChaCha8Rng,
) {
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (vertex, &id) in component.iter().enumerate() {
        groups.entry(id).or_default().push(vertex);
    }
    let largest = groups.values().map(Vec::len).max().unwrap_or(0);
    let min_size = min_size.min(largest);

    let (anchored, detached): (Vec<Vec<usize>>, Vec<Vec<usize>>) =
        groups.into_values().partition(|group| group.len() >= min_size);
    if detached.is_empty() {
        return;
    }

    let anchored: Vec<usize> = anchored.into_iter().flatten().collect();
    let centre = centroid(embedding, dim, &anchored);
    let extent = detached
        .iter()
        .map(|group| reach(embedding, dim, group, &centroid(embedding, dim, group)))
        .fold(reach(embedding, dim, &anchored, &centre), f32::max)
        .max(1.0);

    for (shell, group) in detached.iter().enumerate() {
        let own = centroid(embedding, dim, group);
        let direction = random_direction(dim, rng);
        let radius = DETACH_SPACING * extent * (shell + 1) as f32;
        for &v in group {
            for d in 0..dim {
                embedding[v * dim + d] += centre[d] + direction[d] * radius - own[d];
            }
        }
    }
}

fn centroid(embedding: &[f32], dim: usize, vertices: &[usize]) -> Vec<f32> {
    let mut centre = vec![0.0f32; dim];
    for &v in vertices {
        for (d, c) in centre.iter_mut().enumerate() {
            *c += embedding[v * dim + d];
        }
    }
    let count = vertices.len().max(1) as f32;
    centre.iter().map(|c| c / count).collect()
}

/// Largest distance from `centre` to any of `vertices`.
fn reach(embedding: &[f32], dim: usize, vertices: &[usize], centre: &[f32]) -> f32 {
    vertices
        .iter()
        .map(|&v| {
            (0..dim)
                .map(|d| (embedding[v * dim + d] - centre[d]).powi(2))
                .sum::<f32>()
                .sqrt()
        })
        .fold(0.0f32, f32::max)
}

fn random_direction(dim: usize, rng: &mut ChaCha8Rng) -> Vec<f32> {
    let raw: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
    let norm = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm <= f32::EPSILON {
        let mut axis = vec![0.0; dim];
        axis[0] = 1.0;
        return axis;
    }
    raw.iter().map(|x| x / norm).collect()
}

fn squared_distance(embedding: &[f32], dim: usize, i: usize, j: usize) -> f32 {
    (0..dim)
        .map(|d| {
            let diff = embedding[i * dim + d] - embedding[j * dim + d];
            diff * diff
        })
        .sum()
}
