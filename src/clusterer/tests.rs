use super::*;
use crate::config::DensityConfig;
use crate::table::NOISE_LABEL;

fn blobs(centres: &[(f32, f32)], per_blob: usize) -> Vec<Vec<f32>> {
    let mut points = Vec::new();
    for &(cx, cy) in centres {
        for i in 0..per_blob {
            let dx = (i % 4) as f32 * 0.05;
            let dy = (i / 4) as f32 * 0.05;
            points.push(vec![cx + dx, cy + dy]);
        }
    }
    points
}

fn clusterer(min_cluster_size: usize) -> DensityClusterer {
    DensityClusterer::new(DensityConfig {
        min_cluster_size,
        min_samples: None,
    })
}

#[test]
fn test_cosine_similarity_basics() {
    assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
    assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
}

#[test]
fn test_similarity_matrix_is_symmetric() {
    let vectors = vec![vec![1.0, 0.0], vec![1.0, 1.0], vec![0.0, 1.0]];
    let m = similarity_matrix(&vectors);
    for i in 0..3 {
        assert!((m[i][i] - 1.0).abs() < 1e-6);
        for j in 0..3 {
            assert_eq!(m[i][j], m[j][i]);
        }
    }
}

#[test]
fn test_centroids_skip_noise() {
    let embeddings = vec![vec![1.0, 0.0], vec![3.0, 0.0], vec![9.0, 9.0], vec![0.0, 2.0]];
    let labels = vec![0, 0, NOISE_LABEL, 1];

    let centroids = cluster_centroids(&embeddings, &labels);
    assert_eq!(centroids.len(), 2);
    assert_eq!(centroids[&0], vec![2.0, 0.0]);
    assert_eq!(centroids[&1], vec![0.0, 2.0]);
}

#[test]
fn test_compute_centroid_empty() {
    assert!(compute_centroid(&[]).is_empty());
}

#[test]
fn test_separated_blobs_form_clusters() {
    let points = blobs(&[(0.0, 0.0), (10.0, 10.0)], 12);
    let result = clusterer(5).fit(&points).unwrap();

    assert_eq!(result.labels.len(), 24);
    assert_eq!(result.cluster_count, 2);
    let left: Vec<i32> = result.labels[..12].iter().copied().filter(|&l| l != NOISE_LABEL).collect();
    let right: Vec<i32> = result.labels[12..].iter().copied().filter(|&l| l != NOISE_LABEL).collect();
    assert!(!left.is_empty() && !right.is_empty());
    assert!(left.iter().all(|&l| l == left[0]));
    assert!(right.iter().all(|&l| l == right[0]));
    assert_ne!(left[0], right[0]);
}

#[test]
fn test_labels_are_dense() {
    let points = blobs(&[(0.0, 0.0), (10.0, 0.0), (0.0, 10.0)], 12);
    let result = clusterer(5).fit(&points).unwrap();

    let mut distinct: Vec<i32> = result
        .labels
        .iter()
        .copied()
        .filter(|&l| l != NOISE_LABEL)
        .collect();
    distinct.sort_unstable();
    distinct.dedup();
    let expected: Vec<i32> = (0..distinct.len() as i32).collect();
    assert_eq!(distinct, expected);
}

#[test]
fn test_too_few_points_are_noise() {
    let points = blobs(&[(0.0, 0.0)], 4);
    let result = clusterer(10).fit(&points).unwrap();

    assert_eq!(result.labels, vec![NOISE_LABEL; 4]);
    assert_eq!(result.cluster_count, 0);
    assert_eq!(result.noise_ratio(), 1.0);
}

#[test]
fn test_size_one_leaves_no_noise() {
    let mut points = blobs(&[(0.0, 0.0), (10.0, 10.0)], 8);
    points.push(vec![50.0, -50.0]);
    let result = clusterer(1).fit(&points).unwrap();

    assert_eq!(result.noise_count, 0);
    assert_eq!(result.noise_ratio(), 0.0);
    assert!(result.labels.iter().all(|&l| l >= 0));
}

#[test]
fn test_single_point_with_size_one() {
    let result = clusterer(1).fit(&[vec![1.0, 2.0]]).unwrap();
    assert_eq!(result.labels, vec![0]);
}

#[test]
fn test_non_finite_rejected() {
    let err = clusterer(2).fit(&[vec![f32::NAN, 0.0], vec![0.0, 0.0]]).unwrap_err();
    assert!(err.is_precondition());
}

#[test]
fn test_densify_preserves_order() {
    assert_eq!(density::densify(&[4, -1, 7, 4, 9]), vec![0, -1, 1, 0, 2]);
}
