use std::collections::BTreeMap;

use crate::clusterer::cosine_distance;

use super::MetricValue;

/// Mean silhouette coefficient with cosine distance.
///
/// Needs at least two clusters and fewer clusters than points. Members of
/// singleton clusters score 0.
pub fn silhouette(points: &[&[f32]], labels: &[i32]) -> MetricValue {
    let groups = group_indices(labels);
    let n = points.len();
    if groups.len() < 2 || groups.len() >= n {
        return MetricValue::NotApplicable(format!(
            "{} clusters over {n} points; need 2..{n}",
            groups.len()
        ));
    }

    let mut total = 0.0f64;
    for i in 0..n {
        let own = &groups[&labels[i]];
        if own.len() == 1 {
            continue;
        }
        let own_mean = mean_distance(points, i, own) * own.len() as f64 / (own.len() - 1) as f64;
        let nearest_other = groups
            .iter()
            .filter(|(&label, _)| label != labels[i])
            .map(|(_, members)| mean_distance(points, i, members))
            .fold(f64::INFINITY, f64::min);

        let denom = own_mean.max(nearest_other);
        if denom > 0.0 {
            total += (nearest_other - own_mean) / denom;
        }
    }

    MetricValue::Value(total / n as f64)
}

/// Ratio of between-cluster to within-cluster dispersion, Euclidean.
pub fn calinski_harabasz(points: &[&[f32]], labels: &[i32]) -> MetricValue {
    let groups = group_indices(labels);
    let n = points.len();
    let k = groups.len();
    if k < 2 || k >= n {
        return MetricValue::NotApplicable(format!("{k} clusters over {n} points; need 2..{n}"));
    }

    let dim = points[0].len();
    let everyone: Vec<usize> = (0..n).collect();
    let overall = mean_of(points, &everyone, dim);

    let mut between = 0.0f64;
    let mut within = 0.0f64;
    for members in groups.values() {
        let centre = mean_of(points, members, dim);
        between += members.len() as f64 * squared(&centre, &overall);
        for &j in members {
            let p: Vec<f64> = points[j].iter().map(|&v| v as f64).collect();
            within += squared(&p, &centre);
        }
    }

    if within == 0.0 {
        return MetricValue::Value(1.0);
    }
    MetricValue::Value(between * (n - k) as f64 / (within * (k - 1) as f64))
}

/// Mean distance from `i` to `members`; `i` itself contributes zero.
fn mean_distance(points: &[&[f32]], i: usize, members: &[usize]) -> f64 {
    let sum: f64 = members
        .iter()
        .filter(|&&j| j != i)
        .map(|&j| cosine_distance(points[i], points[j]) as f64)
        .sum();
    sum / members.len() as f64
}

fn group_indices(labels: &[i32]) -> BTreeMap<i32, Vec<usize>> {
    let mut groups: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        groups.entry(label).or_default().push(i);
    }
    groups
}

fn mean_of(points: &[&[f32]], members: &[usize], dim: usize) -> Vec<f64> {
    let mut out = vec![0.0f64; dim];
    for &j in members {
        for (o, &v) in out.iter_mut().zip(points[j]) {
            *o += v as f64;
        }
    }
    for o in &mut out {
        *o /= members.len() as f64;
    }
    out
}

fn squared(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}
