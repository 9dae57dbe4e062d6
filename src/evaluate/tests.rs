use super::*;
use crate::table::{ClusterSummary, Record};

fn fixture() -> (ResultTable, Vec<Vec<f32>>) {
    let mut embeddings = Vec::new();
    let mut labels = Vec::new();
    let axes = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
    for (cluster, axis) in axes.iter().enumerate() {
        for i in 0..(6 - cluster) {
            let mut v = axis.to_vec();
            v[(cluster + 1) % 3] += 0.02 * i as f32;
            embeddings.push(v);
            labels.push(cluster as i32);
        }
    }
    embeddings.push(vec![0.6, 0.6, 0.6]);
    labels.push(NOISE_LABEL);

    let records: Vec<Record> = labels
        .iter()
        .enumerate()
        .map(|(i, _)| Record::with_id(format!("text {i}"), format!("r{i}")))
        .collect();
    let summaries: ClusterSummary = [
        (0, "invoice, refund, delay".to_string()),
        (1, "parking, noise".to_string()),
        (2, "tax".to_string()),
    ]
    .into_iter()
    .collect();
    let table = ResultTable::assemble(&records, &labels, &summaries).unwrap();
    (table, embeddings)
}

#[test]
fn test_metrics_on_separated_clusters() {
    let (table, embeddings) = fixture();
    let metrics = Evaluator::new(&table, &embeddings).unwrap().compute_metrics();

    assert_eq!(metrics.total, 16);
    assert_eq!(metrics.clusters, 3);
    assert_eq!(metrics.noise_count, 1);
    assert!((metrics.noise_ratio - 1.0 / 16.0).abs() < 1e-9);
    assert!(metrics.silhouette.value().unwrap() > 0.9);
    assert!(metrics.calinski_harabasz.value().unwrap() > 10.0);
}

fn scores(rows: &[[f32; 2]], labels: &[i32]) -> (f64, f64) {
    let points: Vec<&[f32]> = rows.iter().map(|r| r.as_slice()).collect();
    (
        silhouette(&points, labels).value().unwrap(),
        calinski_harabasz(&points, labels).value().unwrap(),
    )
}

#[test]
fn test_metrics_match_hand_computed_values() {
    // Each point: own-cluster distance 1, mean distance to the other pair 1.5.
    let (sil, ch) = scores(&[[1.0, 0.0], [0.0, 1.0], [-1.0, 0.0], [0.0, -1.0]], &[0, 0, 1, 1]);
    assert!((sil - 1.0 / 3.0).abs() < 1e-6, "silhouette = {sil}");
    // Between-group 2, within-group 2, (n - k) / (k - 1) = 2.
    assert!((ch - 2.0).abs() < 1e-6, "calinski-harabasz = {ch}");

    let (sil, ch) = scores(
        &[[1.0, 0.0], [0.0, 1.0], [1.0, 1.0], [-1.0, 0.0], [0.0, -1.0]],
        &[0, 0, 0, 1, 1],
    );
    assert!((sil - 0.538_365_993_887_478).abs() < 1e-6, "silhouette = {sil}");
    assert!((ch - 4.2).abs() < 1e-6, "calinski-harabasz = {ch}");
}

#[test]
fn test_silhouette_singleton_scores_zero() {
    // Scores 1/2, 0 and 0 for the singleton.
    let rows = [[1.0f32, 0.0], [0.0, 1.0], [-1.0, 0.0]];
    let points: Vec<&[f32]> = rows.iter().map(|r| r.as_slice()).collect();
    let sil = silhouette(&points, &[0, 0, 1]).value().unwrap();
    assert!((sil - 1.0 / 6.0).abs() < 1e-6, "silhouette = {sil}");
}

#[test]
fn test_single_cluster_metrics_not_applicable() {
    let records = vec![Record::new("a"), Record::new("b"), Record::new("c")];
    let table = ResultTable::assemble(&records, &[0, 0, NOISE_LABEL], &ClusterSummary::new()).unwrap();
    let embeddings = vec![vec![1.0, 0.0], vec![0.9, 0.1], vec![0.0, 1.0]];

    let metrics = Evaluator::new(&table, &embeddings).unwrap().compute_metrics();
    assert!(!metrics.silhouette.is_applicable());
    assert!(!metrics.calinski_harabasz.is_applicable());
    assert!((metrics.noise_ratio - 1.0 / 3.0).abs() < 1e-9);
}

#[test]
fn test_silhouette_needs_fewer_clusters_than_points() {
    let a = [1.0f32, 0.0];
    let b = [0.0f32, 1.0];
    let points: Vec<&[f32]> = vec![&a, &b];
    assert!(!silhouette(&points, &[0, 1]).is_applicable());
    assert!(!calinski_harabasz(&points, &[0, 1]).is_applicable());
}

#[test]
fn test_similarity_flags_close_pairs() {
    let records: Vec<Record> = (0..4).map(|i| Record::new(format!("t{i}"))).collect();
    let summaries: ClusterSummary =
        [(0, "alpha, beta".to_string()), (1, "gamma".to_string()), (2, "delta".to_string())]
            .into_iter()
            .collect();
    let table = ResultTable::assemble(&records, &[0, 1, 2, NOISE_LABEL], &summaries).unwrap();
    let embeddings = vec![
        vec![1.0, 0.0],
        vec![0.95, 0.05],
        vec![0.0, 1.0],
        vec![1.0, 1.0],
    ];

    let report = Evaluator::new(&table, &embeddings).unwrap().analyze_similarity();
    assert_eq!(report.cluster_ids, vec![0, 1, 2]);
    assert_eq!(report.labels[0], "C0: alpha");
    assert_eq!(report.matrix.len(), 3);
    assert_eq!(report.candidates.len(), 1);
    assert_eq!((report.candidates[0].left, report.candidates[0].right), (0, 1));
}

#[test]
fn test_size_distribution_order_and_labels() {
    let (table, embeddings) = fixture();
    let sizes = Evaluator::new(&table, &embeddings).unwrap().size_distribution(2);

    assert_eq!(sizes.len(), 2);
    assert_eq!((sizes[0].cluster, sizes[0].count), (0, 6));
    assert_eq!(sizes[0].label, "invoice,refund");
    assert_eq!((sizes[1].cluster, sizes[1].count), (1, 5));
}

#[test]
fn test_report_includes_projection() {
    let (table, embeddings) = fixture();
    let report = Evaluator::new(&table, &embeddings).unwrap().report();

    let projection = report.projection.unwrap();
    assert_eq!(projection.len(), 16);
    assert_eq!(projection[15].cluster, NOISE_LABEL);
    assert_eq!(report.size_distribution.len(), 3);
    assert_eq!(report.metrics.clusters, 3);
}

#[test]
fn test_mismatched_lengths_rejected() {
    let (table, mut embeddings) = fixture();
    embeddings.pop();
    assert!(Evaluator::new(&table, &embeddings).is_err());
}
