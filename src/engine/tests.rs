use super::*;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::embedder::{EmbeddingModelInfo, HashingEmbedder};
use crate::table::{NOISE_LABEL, NOISE_SUMMARY};

/// Hashing provider that counts calls and can be told to fail.
struct CountingProvider {
    inner: HashingEmbedder,
    info: EmbeddingModelInfo,
    calls: AtomicUsize,
    largest_batch: AtomicUsize,
    fail: AtomicBool,
}

impl CountingProvider {
    fn new() -> Arc<Self> {
        Self::with_max_batch(256)
    }

    fn with_max_batch(max_batch: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: HashingEmbedder::new(256),
            info: EmbeddingModelInfo::new("feature-hashing", 256, max_batch),
            calls: AtomicUsize::new(0),
            largest_batch: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        })
    }
}

impl EmbeddingProvider for CountingProvider {
    fn model_info(&self) -> &EmbeddingModelInfo {
        &self.info
    }

    fn encode(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.largest_batch.fetch_max(batch.len(), Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(EmbedError::ServerError {
                status: 503,
                body: "model unavailable".to_string(),
            });
        }
        self.inner.encode(batch)
    }
}

const TOPICS: [(&str, [&str; 10]); 3] = [
    (
        "restaurant refused to issue invoice after dinner payment",
        [
            "cash", "card", "yesterday", "weekend", "receipt", "manager", "waiter", "bill",
            "table", "evening",
        ],
    ),
    (
        "neighbour construction drilling loud noise late night",
        [
            "hammer", "saw", "midnight", "weekday", "walls", "floor", "renovation", "workers",
            "sleep", "baby",
        ],
    ),
    (
        "pension insurance contribution record missing online account",
        [
            "employer", "months", "login", "portal", "statement", "balance", "transfer", "retired",
            "benefit", "form",
        ],
    ),
];

const ONE_OFFS: [&str; 10] = [
    "zebra migration documentary subtitles",
    "quantum violin tuning workshop",
    "glacier photography permit queue",
    "marathon shoelace sponsorship request",
    "volcano museum ticket refund",
    "origami championship venue lighting",
    "submarine cable fishing license",
    "astronomy club telescope storage",
    "beekeeping honey label printing",
    "chess tournament clock batteries",
];

/// Three topics of thirty varied records each plus ten unrelated one-offs.
fn corpus() -> Vec<Record> {
    let mut records = Vec::new();
    for (t, (base, extras)) in TOPICS.iter().enumerate() {
        for i in 0..30 {
            let text = format!("{base} {} {}", extras[i % 10], extras[(i / 10 + i + 3) % 10]);
            records.push(Record::with_id(text, format!("t{t}-{i}")));
        }
    }
    for (i, text) in ONE_OFFS.iter().enumerate() {
        records.push(Record::with_id(*text, format!("x{i}")));
    }
    records
}

fn engine() -> (ClusteringEngine, Arc<CountingProvider>) {
    let provider = CountingProvider::new();
    let engine = ClusteringEngine::new(provider.clone());
    (engine, provider)
}

fn config() -> RunConfig {
    RunConfig::default().with_min_cluster_size(10)
}

#[test]
fn test_accessors_empty_before_run() {
    let (engine, _) = engine();
    assert!(engine.embeddings().is_none());
    assert!(engine.results().is_none());
}

#[test]
fn test_run_finds_three_topics() {
    let (mut engine, _) = engine();
    let records = corpus();
    let results = engine.run(records.clone(), &config()).unwrap();

    assert_eq!(results.len(), records.len());
    assert_eq!(results.cluster_count(), 3);
    assert!(
        (7..=13).contains(&results.noise_count()),
        "noise = {}",
        results.noise_count()
    );

    let stray_noise = results.rows()[90..]
        .iter()
        .filter(|r| r.cluster == NOISE_LABEL)
        .count();
    assert!(stray_noise >= 7, "only {stray_noise} one-offs left as noise");

    let mut topic_labels = Vec::new();
    for t in 0..3 {
        let rows = &results.rows()[t * 30..(t + 1) * 30];
        let mut labels: Vec<i32> = rows
            .iter()
            .map(|r| r.cluster)
            .filter(|&c| c != NOISE_LABEL)
            .collect();
        assert!(labels.len() >= 20, "topic {t} mostly noise");
        labels.dedup();
        assert_eq!(labels.len(), 1, "topic {t} split over {labels:?}");
        topic_labels.push(labels[0]);
    }
    topic_labels.sort_unstable();
    topic_labels.dedup();
    assert_eq!(topic_labels.len(), 3);

    assert_eq!(results.rows()[0].external_id.as_deref(), Some("t0-0"));
    assert_eq!(engine.embeddings().unwrap().len(), records.len());
}

#[test]
fn test_partition_matches_records_and_blanks_are_dropped() {
    let (mut engine, _) = engine();
    let mut records = corpus();
    records.push(Record::new("   "));
    records.push(Record::new(""));

    let results = engine.run(records, &config()).unwrap();
    assert_eq!(results.len(), 100);
    assert_eq!(engine.state().partition.len(), 100);
    assert_eq!(engine.state().reduced.len(), 100);
}

#[test]
fn test_keywords_and_noise_sentinel() {
    let (mut engine, _) = engine();
    let results = engine.run(corpus(), &config()).unwrap();

    for row in results.rows() {
        if row.cluster == NOISE_LABEL {
            assert_eq!(row.keywords, NOISE_SUMMARY);
        } else {
            assert!(!row.keywords.is_empty());
            assert_ne!(row.keywords, NOISE_SUMMARY);
        }
    }
}

#[test]
fn test_size_one_clusters_leave_no_noise() {
    let (mut engine, _) = engine();
    let results = engine
        .run(corpus(), &RunConfig::default().with_min_cluster_size(1))
        .unwrap();
    assert_eq!(results.noise_count(), 0);
}

#[test]
fn test_empty_and_blank_input_rejected() {
    let (mut engine, provider) = engine();
    assert!(matches!(
        engine.run(Vec::new(), &config()),
        Err(EngineError::Validation(_))
    ));
    assert!(matches!(
        engine.run(vec![Record::new(" \n ")], &config()),
        Err(EngineError::Validation(_))
    ));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_components_wider_than_embeddings_rejected_before_encoding() {
    let (mut engine, provider) = engine();
    let err = engine
        .run(corpus(), &config().with_components(256))
        .unwrap_err();
    assert!(err.is_precondition());
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_encoding_failure_keeps_previous_state() {
    let (mut engine, provider) = engine();
    let first = engine.run(corpus(), &config()).unwrap();

    provider.fail.store(true, Ordering::SeqCst);
    let err = engine.run(corpus(), &config()).unwrap_err();
    assert!(matches!(err, EngineError::Dependency { stage: "encoding", .. }));
    assert_eq!(engine.results(), Some(&first));
}

#[test]
fn test_progress_is_monotonic_and_completes() {
    let (engine, _) = engine();
    let mut engine = engine.with_settings(EngineSettings {
        batch_size: 16,
        ..EngineSettings::default()
    });
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    engine.set_reporter(Arc::new(move |current: usize, total: usize, _message: &str| {
        sink.lock().push((current, total));
    }));

    engine.run(corpus(), &config()).unwrap();

    let seen = seen.lock();
    assert!(seen.iter().all(|&(_, total)| total == 100));
    assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0));
    assert!(seen.iter().any(|&(p, _)| p > 0 && p < 30), "encoding progress reported");
    assert_eq!(seen.last().map(|p| p.0), Some(100));
}

#[test]
fn test_encoding_respects_model_batch_limit() {
    let provider = CountingProvider::with_max_batch(8);
    let mut engine = ClusteringEngine::new(provider.clone()).with_settings(EngineSettings {
        batch_size: 32,
        ..EngineSettings::default()
    });

    engine.run(corpus(), &config()).unwrap();
    assert_eq!(provider.largest_batch.load(Ordering::SeqCst), 8);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 13);
}

#[test]
fn test_recluster_requires_embeddings() {
    let (mut engine, _) = engine();
    let err = engine.re_cluster(&config()).unwrap_err();
    assert!(matches!(err, EngineError::State(_)));
}

#[test]
fn test_recluster_never_reencodes() {
    let (mut engine, provider) = engine();
    engine.run(corpus(), &config()).unwrap();
    let calls = provider.calls.load(Ordering::SeqCst);
    let embeddings = engine.embeddings().unwrap().clone();

    let results = engine
        .re_cluster(&RunConfig::default().with_min_cluster_size(20))
        .unwrap();

    assert_eq!(provider.calls.load(Ordering::SeqCst), calls);
    assert_eq!(engine.embeddings(), Some(&embeddings));
    assert_eq!(results.len(), 100);
}

#[test]
fn test_stricter_density_never_adds_members() {
    let (mut engine, _) = engine();
    let loose = engine.run(corpus(), &config()).unwrap();
    let strict = engine
        .re_cluster(&RunConfig::default().with_min_cluster_size(25))
        .unwrap();

    let members = |t: &ResultTable| t.len() - t.noise_count();
    assert!(members(&strict) <= members(&loose));
}

#[test]
fn test_merge_before_run_is_noop() {
    let (mut engine, _) = engine();
    let report = engine.merge_similar_clusters(0.9).unwrap();
    assert!(report.skipped.is_some());
    assert!(engine.results().is_none());
}

#[test]
fn test_merge_rejects_bad_threshold() {
    let (mut engine, _) = engine();
    engine.run(corpus(), &config()).unwrap();
    assert!(engine.merge_similar_clusters(1.5).unwrap_err().is_precondition());
}

#[test]
fn test_merge_is_idempotent_and_keeps_noise() {
    let (mut engine, _) = engine();
    let before = engine.run(corpus(), &config()).unwrap();

    engine.merge_similar_clusters(0.05).unwrap();
    let once = engine.results().unwrap().clone();
    let again = engine.merge_similar_clusters(0.05).unwrap();

    assert!(again.merges.is_empty());
    assert_eq!(engine.results(), Some(&once));
    for (a, b) in before.rows().iter().zip(once.rows()) {
        assert_eq!(a.cluster == NOISE_LABEL, b.cluster == NOISE_LABEL);
    }
    // Rows take the keywords their new label already had.
    let summaries = &engine.state().summaries;
    for row in once.rows() {
        assert_eq!(summaries.get(&row.cluster), Some(&row.keywords));
    }
    assert!(summaries.keys().all(|label| once.labels().contains(label)));
}

#[test]
fn test_save_before_run_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.bin");
    let (engine, _) = engine();

    engine.save_state(&path).unwrap();
    assert!(!path.exists());
}

#[test]
fn test_save_then_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("s.bin");

    let (mut engine, _) = engine();
    let results = engine.run(corpus(), &config()).unwrap();
    engine.save_state(&path).unwrap();

    let (mut restored, provider) = self::engine();
    assert!(restored.load_state(&path));
    assert_eq!(restored.results(), Some(&results));
    assert_eq!(restored.embeddings(), engine.embeddings());
    assert_eq!(restored.state(), engine.state());
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);

    restored.re_cluster(&config()).unwrap();
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

/// Every topic record opens with the same three words, so topic centroids
/// sit around 0.28 apart in cosine while neighbourhoods stay within topics.
fn corpus_with_shared_opening() -> Vec<Record> {
    corpus()
        .into_iter()
        .enumerate()
        .map(|(i, record)| {
            if i < 90 {
                Record {
                    text: format!("customer complaint hotline {}", record.text),
                    ..record
                }
            } else {
                record
            }
        })
        .collect()
}

#[test]
fn test_reload_keeps_keyword_settings_for_refresh() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keywords.bin");
    let refreshing = EngineSettings {
        refresh_keywords_after_merge: true,
        ..EngineSettings::default()
    };

    let (engine, _) = engine();
    let mut engine = engine.with_settings(refreshing.clone());
    engine
        .run(corpus_with_shared_opening(), &config().with_top_n(2))
        .unwrap();
    engine.save_state(&path).unwrap();

    let (restored, _) = self::engine();
    let mut restored = restored.with_settings(refreshing);
    assert!(restored.load_state(&path));
    assert_eq!(restored.keywords.top_n, 2);

    let report = restored.merge_similar_clusters(0.2).unwrap();
    assert!(report.merged_count() > 0);
    for row in restored.results().unwrap().rows() {
        if row.cluster != NOISE_LABEL {
            assert_eq!(row.keywords.split(", ").count(), 2, "{}", row.keywords);
        }
    }
}

#[test]
fn test_load_missing_file_is_false() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, _) = engine();
    assert!(!engine.load_state(&dir.path().join("absent.bin")));
    assert!(engine.results().is_none());
}

#[test]
fn test_load_corrupt_file_keeps_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corrupt.bin");
    std::fs::write(&path, b"not a zip archive").unwrap();

    let (mut engine, _) = engine();
    let results = engine.run(corpus(), &config()).unwrap();

    assert!(!engine.load_state(&path));
    assert_eq!(engine.results(), Some(&results));
}

#[test]
fn test_label_clusters_requires_results() {
    struct Fixed;
    impl ClusterLabeler for Fixed {
        fn label(&self, _samples: &[String]) -> Result<String, crate::labeler::LabelError> {
            Ok("fixed".to_string())
        }
    }

    let (mut engine, _) = engine();
    assert!(engine.label_clusters(&Fixed, 42).is_err());

    engine.run(corpus(), &config()).unwrap();
    let labels = engine.label_clusters(&Fixed, 42).unwrap();
    let clusters = engine.results().unwrap().cluster_ids();
    assert!(clusters.iter().all(|c| labels[c] == "fixed"));
}

#[test]
fn test_stage_percentages() {
    assert_eq!(Stage::Encoding.percent(0, 4), 0);
    assert_eq!(Stage::Encoding.percent(4, 4), 30);
    assert_eq!(Stage::Reduction.percent(1, 2), 45);
    assert_eq!(Stage::Summarization.percent(0, 0), 100);
}

#[test]
fn test_monotonic_reporter_never_goes_back() {
    let seen = Mutex::new(Vec::new());
    let reporter = MonotonicReporter::new(|current: usize, _total: usize, _message: &str| {
        seen.lock().push(current);
    });

    reporter.report(3, 10, "a");
    reporter.report(1, 10, "b");
    reporter.report(10, 10, "c");
    reporter.report(10, 10, "c again");

    assert_eq!(*seen.lock(), vec![30, 30, 100, 100]);
    assert_eq!(reporter.last_percent(), 100);
}
