//! Multi-concept conjunctive search against a real store
//!
//! Uses the same keyword-to-basis-vector stub embedder as the single
//! search tests: exchanges sharing keywords with a concept rank close,
//! disjoint ones rank orthogonal.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use approx::assert_relative_eq;
use tempfile::TempDir;
use verdigris::embeddings::{self, EmbeddingEngine};
use verdigris::search::{SearchError, SearchOptions};
use verdigris::store::{Exchange, ExchangeStore};
use verdigris::RecallEngine;

const DIMS: usize = 8;

const TERMS: [&str; 8] = [
    "kubernetes",
    "docker",
    "deploy",
    "caching",
    "eviction",
    "database",
    "rust",
    "async",
];

fn embed_text(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    let mut v = vec![0.0f32; DIMS];
    for (i, term) in TERMS.iter().enumerate() {
        if lower.contains(term) {
            v[i] = 1.0;
        }
    }
    if v.iter().all(|&x| x == 0.0) {
        v = vec![1.0; DIMS];
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    v.iter().map(|x| x / norm).collect()
}

struct StubEmbedder {
    calls: Arc<AtomicUsize>,
}

impl EmbeddingEngine for StubEmbedder {
    fn embed(&mut self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(embed_text(text))
    }

    fn dimension(&self) -> usize {
        DIMS
    }

    fn model_name(&self) -> &str {
        "stub"
    }
}

fn exchange(id: &str, timestamp: &str, user: &str, archive: &str) -> Exchange {
    Exchange {
        id: id.to_string(),
        project: "demo".to_string(),
        timestamp: timestamp.to_string(),
        user_message: user.to_string(),
        assistant_message: "Okay.".to_string(),
        archive_path: archive.to_string(),
        line_start: 1,
        line_end: 10,
        tool_calls: vec![],
    }
}

fn engine_with(exchanges: &[Exchange]) -> (RecallEngine, Arc<AtomicUsize>, TempDir) {
    let dir = TempDir::new().unwrap();
    let mut store = ExchangeStore::open(dir.path(), DIMS).unwrap();
    for ex in exchanges {
        let embedding = embed_text(&ex.combined_text());
        store.insert(ex, &embedding).unwrap();
    }

    let calls = Arc::new(AtomicUsize::new(0));
    let embedder = embeddings::shared(Box::new(StubEmbedder {
        calls: calls.clone(),
    }));
    (RecallEngine::new(store, embedder), calls, dir)
}

fn concepts(phrases: &[&str]) -> Vec<String> {
    phrases.iter().map(|s| s.to_string()).collect()
}

fn limited(limit: usize) -> SearchOptions {
    SearchOptions {
        limit,
        ..SearchOptions::default()
    }
}

#[test]
fn conversation_matching_only_one_concept_is_dropped() {
    // Five conversations cover both concepts; one covers caching alone.
    // With limit 1 each concept fetches 5 candidates, so the caching-only
    // conversation never shows up among the eviction candidates.
    let mut seed = Vec::new();
    for i in 0..5 {
        let archive = format!("/archives/conv-{i}.jsonl");
        seed.push(exchange(
            &format!("evict-{i}"),
            &format!("2025-01-{:02}T10:00:00", i + 1),
            "eviction policy tuning",
            &archive,
        ));
        seed.push(exchange(
            &format!("cache-{i}"),
            &format!("2025-01-{:02}T11:00:00", i + 1),
            "caching with docker",
            &archive,
        ));
    }
    seed.push(exchange(
        "solo",
        "2025-01-06T10:00:00",
        "caching layer design",
        "/archives/solo-caching.jsonl",
    ));

    let (engine, _calls, _dir) = engine_with(&seed);

    // Sanity: on its own, the caching-only conversation is the best
    // vector match for "caching"
    let single = engine
        .search(
            "caching",
            &SearchOptions {
                mode: verdigris::SearchMode::Vector,
                ..limited(1)
            },
        )
        .unwrap();
    assert_eq!(single[0].exchange.id, "solo");

    let results = engine
        .search_concepts(&concepts(&["caching", "eviction"]), &limited(1))
        .unwrap();

    assert_eq!(results.len(), 1);
    assert!(results[0].exchange.archive_path.starts_with("/archives/conv-"));
    assert_eq!(results[0].concept_similarities.len(), 2);
}

#[test]
fn survivors_rank_by_average_similarity() {
    let (engine, _calls, _dir) = engine_with(&[
        // Both concepts in one exchange: similarity 1/sqrt(2) each
        exchange(
            "hi",
            "2025-01-01T10:00:00",
            "caching database queries",
            "/archives/hi.jsonl",
        ),
        // Concepts split across two exchanges, the second diluted
        exchange(
            "med-a",
            "2025-01-02T10:00:00",
            "caching with docker",
            "/archives/med.jsonl",
        ),
        exchange(
            "med-b",
            "2025-01-02T11:00:00",
            "database rust async",
            "/archives/med.jsonl",
        ),
    ]);

    let results = engine
        .search_concepts(&concepts(&["caching", "database"]), &limited(10))
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].exchange.archive_path, "/archives/hi.jsonl");
    assert_eq!(results[1].exchange.archive_path, "/archives/med.jsonl");
    assert!(results[0].average_similarity > results[1].average_similarity);

    // Each survivor carries one similarity per concept, in input order
    for result in &results {
        assert_eq!(result.concept_similarities.len(), 2);
        let mean = result.concept_similarities.iter().sum::<f32>()
            / result.concept_similarities.len() as f32;
        assert_relative_eq!(result.average_similarity, mean, epsilon = 1e-6);
    }
}

#[test]
fn results_truncate_to_limit() {
    let mut seed = Vec::new();
    for i in 0..4 {
        seed.push(exchange(
            &format!("e{i}"),
            &format!("2025-01-{:02}T10:00:00", i + 1),
            "caching database queries",
            &format!("/archives/e{i}.jsonl"),
        ));
    }
    let (engine, _calls, _dir) = engine_with(&seed);

    let results = engine
        .search_concepts(&concepts(&["caching", "database"]), &limited(2))
        .unwrap();
    assert_eq!(results.len(), 2);
}

#[test]
fn concept_count_is_validated_before_embedding() {
    let (engine, calls, _dir) = engine_with(&[]);

    let err = engine
        .search_concepts(&concepts(&["caching"]), &limited(10))
        .unwrap_err();
    assert_eq!(
        err.downcast_ref::<SearchError>(),
        Some(&SearchError::ConceptCount(1))
    );

    let six: Vec<String> = (0..6).map(|i| format!("concept {i}")).collect();
    let err = engine.search_concepts(&six, &limited(10)).unwrap_err();
    assert_eq!(
        err.downcast_ref::<SearchError>(),
        Some(&SearchError::ConceptCount(6))
    );

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn invalid_date_is_rejected_before_embedding() {
    let (engine, calls, _dir) = engine_with(&[]);

    let mut opts = limited(10);
    opts.after = Some("not-a-date".to_string());

    let err = engine
        .search_concepts(&concepts(&["caching", "database"]), &opts)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SearchError>(),
        Some(SearchError::InvalidDate { field: "after", .. })
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn no_candidates_yields_empty_list_not_error() {
    let (engine, _calls, _dir) = engine_with(&[
        exchange(
            "only-caching",
            "2025-06-01T10:00:00",
            "caching strategy",
            "/archives/a.jsonl",
        ),
        exchange(
            "only-database",
            "2025-06-02T10:00:00",
            "database schema",
            "/archives/b.jsonl",
        ),
    ]);

    // Window past every stored exchange
    let mut opts = limited(10);
    opts.after = Some("2026-01-01".to_string());

    let results = engine
        .search_concepts(&concepts(&["caching", "database"]), &opts)
        .unwrap();
    assert!(results.is_empty());
}

#[test]
fn date_range_applies_to_every_concept_query() {
    let (engine, _calls, _dir) = engine_with(&[
        exchange(
            "old-a",
            "2024-01-01T10:00:00",
            "caching database queries",
            "/archives/old.jsonl",
        ),
        exchange(
            "new-a",
            "2025-01-01T10:00:00",
            "caching database queries",
            "/archives/new.jsonl",
        ),
    ]);

    let mut opts = limited(10);
    opts.after = Some("2025-01-01".to_string());

    let results = engine
        .search_concepts(&concepts(&["caching", "database"]), &opts)
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].exchange.archive_path, "/archives/new.jsonl");
}
