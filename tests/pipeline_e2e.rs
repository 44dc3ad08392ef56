//! End-to-end pipeline tests over persisted artifacts.
//!
//! Covers:
//! - JSONL ingest through artifact build and save
//! - Reopening the catalog and index from disk
//! - Filtered re-rank, fallback, and degraded (no extractor) searches
//! - Reloaded artifacts ranking identically to freshly built ones

use std::fs;
use std::sync::Arc;

use media_intent_search::catalog::{catalog_path, ingest};
use media_intent_search::intent::{Intent, IntentError, IntentExtractor};
use media_intent_search::search::embedder::Embedder;
use media_intent_search::search::hash_embedder::HashEmbedder;
use media_intent_search::search::service::{SearchMode, SearchService};
use media_intent_search::search::vector_index::index_path;
use tempfile::TempDir;

struct StubExtractor {
    intent: Option<Intent>,
}

impl IntentExtractor for StubExtractor {
    fn extract(&self, _query: &str) -> Result<Intent, IntentError> {
        self.intent.clone().ok_or(IntentError::EmptyResponse)
    }
}

fn fixture_jsonl() -> String {
    [
        r#"{"show_id": "s1", "type": "Movie", "title": "Planet Wild", "director": "Ana Reyes", "cast": "Narrator One", "country": "United Kingdom", "release_year": 2019, "rating": "TV-PG", "duration": "85 min", "listed_in": "Documentaries, Nature", "description": "sweeping nature documentary footage of wild animals"}"#,
        r#"{"show_id": "s2", "type": "Movie", "title": "Desk Jokes", "cast": "Tom Field, Rita Marsh", "country": "United States", "release_year": 2021, "rating": "PG-13", "duration": "98 min", "listed_in": "Comedies", "description": "a lighthearted office comedy about coworkers"}"#,
        r#"{"show_id": "s3", "type": "TV Show", "title": "Harbor Crimes", "country": "Denmark", "release_year": 2017, "rating": "TV-MA", "duration": "3 Seasons", "listed_in": "Crime TV Shows, TV Dramas", "description": "a dark crime drama set in a small harbor town"}"#,
        r#"{"show_id": "s4", "type": "Movie", "title": "Silent Peaks", "director": "Jon Mark", "country": "Canada", "release_year": 2015, "rating": "R", "listed_in": "Thrillers", "description": "a tense mountain thriller with no way down"}"#,
    ]
    .join("\n")
}

fn build_and_save(dir: &TempDir) -> Arc<dyn Embedder> {
    let input = dir.path().join("titles.jsonl");
    fs::write(&input, fixture_jsonl()).unwrap();

    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::default());
    let raw = ingest::read_jsonl(&input).unwrap();
    let titles = ingest::clean_titles(raw);
    let (store, index) = ingest::build_artifacts(&embedder, titles).unwrap();

    store
        .save(&catalog_path(dir.path(), embedder.id()))
        .unwrap();
    index.save(&index_path(dir.path(), embedder.id())).unwrap();
    embedder
}

fn open(dir: &TempDir, embedder: Arc<dyn Embedder>, intent: Option<Intent>) -> SearchService {
    SearchService::open(
        dir.path(),
        embedder,
        Some(Box::new(StubExtractor { intent })),
    )
    .unwrap()
}

#[test]
fn build_then_reopen_then_filtered_search() {
    let dir = TempDir::new().unwrap();
    let embedder = build_and_save(&dir);

    let intent = Intent::from_json(r#"{"genre": ["documentaries"]}"#).unwrap();
    let service = open(&dir, embedder, Some(intent));

    let outcome = service.search("wildlife documentary", 5).unwrap();
    assert_eq!(outcome.mode, SearchMode::Reranked);
    assert_eq!(outcome.movies.len(), 1);
    assert_eq!(outcome.movies[0].id, "s1");
    assert_eq!(outcome.movies[0].kind, "Movie");
    assert_eq!(outcome.movies[0].duration, "85 min");
}

#[test]
fn unmatchable_intent_falls_back_to_full_index() {
    let dir = TempDir::new().unwrap();
    let embedder = build_and_save(&dir);

    let intent = Intent::from_json(r#"{"country": "Atlantis"}"#).unwrap();
    let service = open(&dir, embedder, Some(intent));

    let outcome = service.search("office comedy with coworkers", 2).unwrap();
    assert_eq!(outcome.mode, SearchMode::Fallback);
    assert_eq!(outcome.movies.len(), 2);
    assert_eq!(outcome.movies[0].id, "s2");
}

#[test]
fn extraction_failure_still_answers() {
    let dir = TempDir::new().unwrap();
    let embedder = build_and_save(&dir);
    let service = open(&dir, embedder, None);

    let outcome = service.search("harbor crime drama", 3).unwrap();
    assert_eq!(outcome.mode, SearchMode::Reranked);
    assert_eq!(outcome.movies.len(), 3);
    assert_eq!(outcome.movies[0].id, "s3");
}

#[test]
fn missing_duration_is_imputed_before_persisting() {
    let dir = TempDir::new().unwrap();
    let embedder = build_and_save(&dir);
    let service = open(&dir, embedder, Some(Intent::default()));

    // s4 had no duration; movie mean of 85 and 98 is 91.5.
    let record = service.catalog().get("s4").unwrap();
    assert_eq!(record.duration_minutes, 91.5);
}

#[test]
fn reloaded_artifacts_rank_like_fresh_ones() {
    let dir = TempDir::new().unwrap();

    let input = dir.path().join("titles.jsonl");
    fs::write(&input, fixture_jsonl()).unwrap();
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::default());
    let raw = ingest::read_jsonl(&input).unwrap();
    let titles = ingest::clean_titles(raw);
    let (store, index) = ingest::build_artifacts(&embedder, titles).unwrap();
    store
        .save(&catalog_path(dir.path(), embedder.id()))
        .unwrap();
    index.save(&index_path(dir.path(), embedder.id())).unwrap();

    let fresh = SearchService::new(store, index, embedder.clone(), None).unwrap();
    let reloaded = SearchService::open(dir.path(), embedder, None).unwrap();

    for query in ["nature documentary", "funny office show", "crime series"] {
        let a = fresh.search(query, 4).unwrap();
        let b = reloaded.search(query, 4).unwrap();
        let ids_a: Vec<&str> = a.movies.iter().map(|m| m.id.as_str()).collect();
        let ids_b: Vec<&str> = b.movies.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids_a, ids_b, "query {query:?} ranked differently");
    }
}

#[test]
fn open_without_artifacts_is_an_error() {
    let dir = TempDir::new().unwrap();
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::default());
    let err = SearchService::open(dir.path(), embedder, None).unwrap_err();
    assert!(err.to_string().contains("catalog"));
}
