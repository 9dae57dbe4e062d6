use super::*;
use crate::config::KeywordConfig;
use crate::table::{NOISE_LABEL, NOISE_SUMMARY};

fn summarizer(top_n: usize) -> KeywordSummarizer {
    KeywordSummarizer::new(KeywordConfig {
        top_n,
        ..KeywordConfig::default()
    })
}

#[test]
fn test_tokenize_drops_short_and_stop_words() {
    let tokens = tokenize("The Invoice was not issued, a refund is due!");
    assert_eq!(tokens, vec!["invoice", "issued", "refund", "due"]);
}

#[test]
fn test_tokenize_cjk_bigrams_break_at_stop_characters() {
    let tokens = tokenize("发票的问题");
    assert_eq!(tokens, vec!["发票", "问题"]);
}

#[test]
fn test_df_bounds() {
    assert_eq!(df_bounds(1, 0.5, 0.7), (1, 1));
    assert_eq!(df_bounds(2, 0.5, 0.7), (1, 1));
    assert_eq!(df_bounds(4, 0.5, 0.7), (2, 3));
    assert_eq!(df_bounds(10, 0.5, 0.7), (5, 9));
    // Upper bound never drops below the lower one.
    assert_eq!(df_bounds(4, 0.9, 0.1), (3, 3));
}

#[test]
fn test_keywords_rank_by_cluster_count() {
    let texts = vec![
        "invoice invoice refund",
        "invoice delay",
        "parking noise parking",
        "parking street",
    ];
    let labels = vec![0, 0, 1, 1];

    let summary = summarizer(2).summarize(&texts, &labels).unwrap();
    assert_eq!(summary[&0], "invoice, delay");
    assert_eq!(summary[&1], "parking, noise");
    assert!(!summary.contains_key(&NOISE_LABEL));
}

#[test]
fn test_terms_shared_by_every_cluster_are_dropped() {
    let texts = vec!["complaint invoice", "complaint parking"];
    let labels = vec![0, 1];

    let summary = summarizer(5).summarize(&texts, &labels).unwrap();
    assert_eq!(summary[&0], "invoice");
    assert_eq!(summary[&1], "parking");
}

#[test]
fn test_short_clusters_are_not_padded() {
    let texts = vec!["refund", "parking meter"];
    let summary = summarizer(5).summarize(&texts, &[0, 1]).unwrap();
    assert_eq!(summary[&0], "refund");
    assert_eq!(summary[&1], "meter, parking");
}

#[test]
fn test_noise_gets_sentinel_and_no_terms() {
    let texts = vec!["refund refund", "unique outlier words"];
    let labels = vec![0, NOISE_LABEL];

    let summary = summarizer(5).summarize(&texts, &labels).unwrap();
    assert_eq!(summary[&NOISE_LABEL], NOISE_SUMMARY);
    assert_eq!(summary[&0], "refund");
}

#[test]
fn test_all_noise_yields_only_sentinel() {
    let summary = summarizer(5)
        .summarize(&["a b c", "d e f"], &[NOISE_LABEL, NOISE_LABEL])
        .unwrap();
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[&NOISE_LABEL], NOISE_SUMMARY);
}

#[test]
fn test_empty_vocabulary_gives_empty_strings() {
    let summary = summarizer(5).summarize(&["the and", "of to"], &[0, 1]).unwrap();
    assert_eq!(summary[&0], "");
    assert_eq!(summary[&1], "");
}

#[test]
fn test_length_mismatch_is_validation_error() {
    let err = summarizer(5).summarize(&["one"], &[0, 1]).unwrap_err();
    assert!(err.is_precondition());
}
