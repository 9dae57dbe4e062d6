use rand::Rng;
use rand_chacha::ChaCha8Rng;

const POWER_ITERATIONS: usize = 100;

/// Project centred `data` onto its top `k` principal axes.
///
/// Axes come from power iteration on the implicit covariance `XᵀX / n`,
/// each one orthogonalised against the axes already found. A direction with
/// no remaining variance projects to zero.
pub fn principal_components(data: &[Vec<f32>], k: usize, rng: &mut ChaCha8Rng) -> Vec<Vec<f32>> {
    let n = data.len();
    if n == 0 {
        return Vec::new();
    }
    let dim = data[0].len();

    let mut mean = vec![0.0f64; dim];
    for row in data {
        for (m, &v) in mean.iter_mut().zip(row) {
            *m += v as f64;
        }
    }
    for m in &mut mean {
        *m /= n as f64;
    }
    let centred: Vec<Vec<f64>> = data
        .iter()
        .map(|row| row.iter().zip(&mean).map(|(&v, m)| v as f64 - m).collect())
        .collect();

    let mut axes: Vec<Vec<f64>> = Vec::with_capacity(k);
    for _ in 0..k {
        let mut v: Vec<f64> = (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
        orthogonalise(&mut v, &axes);
        if !normalise(&mut v) {
            axes.push(vec![0.0; dim]);
            continue;
        }

        let mut found = true;
        for _ in 0..POWER_ITERATIONS {
            let mut next = covariance_apply(&centred, &v);
            orthogonalise(&mut next, &axes);
            if !normalise(&mut next) {
                found = false;
                break;
            }
            v = next;
        }
        axes.push(if found { v } else { vec![0.0; dim] });
    }

    centred
        .iter()
        .map(|row| axes.iter().map(|axis| dot(row, axis) as f32).collect())
        .collect()
}

/// `Xᵀ(Xv) / n` without materialising the covariance matrix.
fn covariance_apply(centred: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; v.len()];
    for row in centred {
        let proj = dot(row, v);
        for (o, &x) in out.iter_mut().zip(row) {
            *o += proj * x;
        }
    }
    let n = centred.len() as f64;
    for o in &mut out {
        *o /= n;
    }
    out
}

fn orthogonalise(v: &mut [f64], axes: &[Vec<f64>]) {
    for axis in axes {
        let proj = dot(v, axis);
        for (x, a) in v.iter_mut().zip(axis) {
            *x -= proj * a;
        }
    }
}

fn normalise(v: &mut [f64]) -> bool {
    let norm = dot(v, v).sqrt();
    if norm < 1e-12 {
        return false;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
    true
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
