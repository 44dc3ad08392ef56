//! The owned search pipeline: intent → filter → re-rank, with fallback.
//!
//! A [`SearchService`] is constructed once at startup from the persisted
//! artifacts and then only read. Each request runs synchronously through
//! the stages below; nothing request-scoped outlives the call.
//!
//! ```text
//! RECEIVED → INTENT_EXTRACTED (or failed → empty intent)
//!          → FILTERED → { RERANKED | FALLBACK } → RESULT
//! ```
//!
//! Intent failures degrade (empty intent, no filters); embedding failures
//! abort the request - a partially ranked answer is worse than an error.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::Serialize;

use crate::catalog::{CatalogStore, catalog_path};
use crate::intent::{Intent, IntentExtractor};
use crate::model::{ApiMovie, RankedHit};

use super::embedder::Embedder;
use super::filter::filter_catalog;
use super::rerank::{enrich_query, rerank};
use super::vector_index::{VectorIndex, index_path};

/// Default result count for search and evaluation.
pub const DEFAULT_TOP_K: usize = 5;

/// Which path produced the results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Candidates survived filtering and were re-ranked.
    Reranked,
    /// Filtering emptied the catalog; raw-query search over the full index.
    Fallback,
}

/// One completed search: ranked projections plus how they were produced.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub movies: Vec<ApiMovie>,
    pub mode: SearchMode,
}

pub struct SearchService {
    store: CatalogStore,
    index: VectorIndex,
    embedder: Arc<dyn Embedder>,
    extractor: Option<Box<dyn IntentExtractor>>,
}

impl std::fmt::Debug for SearchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchService")
            .field("embedder", &self.embedder.id())
            .finish_non_exhaustive()
    }
}

impl SearchService {
    /// Assemble a service and verify the artifacts agree with the live
    /// embedder. Any disagreement is fatal: serving against the wrong
    /// embedding space would silently return garbage rankings.
    pub fn new(
        store: CatalogStore,
        index: VectorIndex,
        embedder: Arc<dyn Embedder>,
        extractor: Option<Box<dyn IntentExtractor>>,
    ) -> Result<Self> {
        if store.embedder_id() != embedder.id() {
            bail!(
                "catalog was built with embedder {:?}, active embedder is {:?}",
                store.embedder_id(),
                embedder.id()
            );
        }
        if store.dimension() != embedder.dimension() {
            bail!(
                "catalog dimension {} disagrees with embedder dimension {}",
                store.dimension(),
                embedder.dimension()
            );
        }
        if index.header().embedder_id != embedder.id() {
            bail!(
                "index was built with embedder {:?}, active embedder is {:?}",
                index.header().embedder_id,
                embedder.id()
            );
        }
        if index.dimension() != embedder.dimension() {
            bail!(
                "index dimension {} disagrees with embedder dimension {}",
                index.dimension(),
                embedder.dimension()
            );
        }
        if index.len() != store.len() {
            bail!(
                "index holds {} vectors but catalog holds {} records",
                index.len(),
                store.len()
            );
        }
        for slot in 0..index.len() {
            let id = index.id_at(slot)?;
            if store.get(id).is_none() {
                bail!("index slot {slot} maps to unknown record id {id:?}");
            }
        }

        if extractor.is_none() {
            tracing::warn!(
                "no intent extractor configured; serving in degraded mode (no structured filters)"
            );
        }

        Ok(Self {
            store,
            index,
            embedder,
            extractor,
        })
    }

    /// Load both artifacts for the active embedder from `data_dir`.
    pub fn open(
        data_dir: &Path,
        embedder: Arc<dyn Embedder>,
        extractor: Option<Box<dyn IntentExtractor>>,
    ) -> Result<Self> {
        let catalog_file = catalog_path(data_dir, embedder.id());
        let index_file = index_path(data_dir, embedder.id());
        let store = CatalogStore::load(&catalog_file)
            .with_context(|| format!("load catalog {catalog_file:?} (run `misearch build` first)"))?;
        let index = VectorIndex::load(&index_file)
            .with_context(|| format!("load vector index {index_file:?}"))?;
        Self::new(store, index, embedder, extractor)
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.store
    }

    /// Run one query through the pipeline and return up to `top_k` ranked
    /// projections. Never returns partial results: embedding failures
    /// surface as errors, empty filtering falls back to the full index.
    pub fn search(&self, query: &str, top_k: usize) -> Result<SearchOutcome> {
        tracing::debug!(query, top_k, "search received");

        let intent = self.extract_intent(query);
        let candidates = filter_catalog(&self.store, &intent);
        tracing::debug!(candidates = candidates.len(), "filtered catalog");

        let (hits, mode) = if candidates.is_empty() {
            (self.fallback(query, top_k)?, SearchMode::Fallback)
        } else {
            let enriched = enrich_query(query, &intent);
            let query_embedding = self.embedder.embed_one(&enriched)?;
            (
                rerank(&self.store, &candidates, &query_embedding, top_k),
                SearchMode::Reranked,
            )
        };

        let movies = self.project(&hits)?;
        tracing::info!(
            query,
            results = movies.len(),
            mode = ?mode,
            "search completed"
        );
        Ok(SearchOutcome { movies, mode })
    }

    /// Intent extraction with the fail-safe contract: any extractor error
    /// degrades to the empty intent and the pipeline keeps going.
    fn extract_intent(&self, query: &str) -> Intent {
        let Some(extractor) = &self.extractor else {
            return Intent::default();
        };
        match extractor.extract(query) {
            Ok(intent) => {
                tracing::debug!(?intent, "intent extracted");
                intent
            }
            Err(err) => {
                tracing::warn!(error = %err, "intent extraction failed; continuing unfiltered");
                Intent::default()
            }
        }
    }

    /// Unfiltered nearest-neighbor search over the whole index with the
    /// raw query. Trades the precision of intent filtering for guaranteed
    /// results when filtering eliminated everything.
    fn fallback(&self, query: &str, top_k: usize) -> Result<Vec<RankedHit>> {
        tracing::debug!("candidate set empty; falling back to raw index search");
        let query_embedding = self.embedder.embed_one(query)?;
        let hits = self.index.search_top_k(&query_embedding, top_k)?;
        hits.into_iter()
            .map(|hit| {
                Ok(RankedHit {
                    id: self.index.id_at(hit.slot)?.to_string(),
                    score: hit.score,
                })
            })
            .collect()
    }

    fn project(&self, hits: &[RankedHit]) -> Result<Vec<ApiMovie>> {
        hits.iter()
            .map(|hit| {
                let record = self
                    .store
                    .get(&hit.id)
                    .with_context(|| format!("ranked id {:?} missing from catalog", hit.id))?;
                Ok(ApiMovie::from_record(record))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::IntentError;
    use crate::model::{TitleKind, TitleRecord};
    use crate::search::hash_embedder::HashEmbedder;

    /// Extractor returning a canned intent, or failing on demand.
    struct StubExtractor {
        intent: Option<Intent>,
    }

    impl IntentExtractor for StubExtractor {
        fn extract(&self, _query: &str) -> Result<Intent, IntentError> {
            self.intent.clone().ok_or(IntentError::EmptyResponse)
        }
    }

    fn record(embedder: &HashEmbedder, id: &str, listed_in: &str, description: &str) -> TitleRecord {
        let embedding = embedder
            .embed_one(&format!("{description}. {listed_in}"))
            .unwrap();
        TitleRecord {
            id: id.to_string(),
            title: format!("title {id}"),
            kind: TitleKind::Movie,
            director: "Unknown".into(),
            cast: "Alice Stone".into(),
            country: "United States".into(),
            release_year: Some(2020),
            rating: "PG".into(),
            duration_minutes: 90.0,
            listed_in: listed_in.to_string(),
            description: description.to_string(),
            embedding,
        }
    }

    fn service(intent: Option<Intent>) -> SearchService {
        let embedder = HashEmbedder::default();
        let records = vec![
            record(
                &embedder,
                "doc",
                "Documentaries",
                "wild nature footage across the planet",
            ),
            record(
                &embedder,
                "com",
                "Comedies",
                "a lighthearted comedy about office life",
            ),
        ];
        let index = VectorIndex::from_embeddings(
            "fnv1a-384",
            384,
            records.iter().map(|r| (r.id.clone(), r.embedding.clone())),
        )
        .unwrap();
        let store = CatalogStore::new("fnv1a-384", 384, records).unwrap();
        SearchService::new(
            store,
            index,
            Arc::new(embedder),
            Some(Box::new(StubExtractor { intent })),
        )
        .unwrap()
    }

    #[test]
    fn filtered_query_reranks_the_candidates() {
        let intent = Intent::from_json(r#"{"genre": ["documentary"]}"#).unwrap();
        let svc = service(Some(intent));
        let outcome = svc.search("Any good nature documentaries?", 5).unwrap();
        assert_eq!(outcome.mode, SearchMode::Reranked);
        assert_eq!(outcome.movies.len(), 1);
        assert_eq!(outcome.movies[0].id, "doc");
    }

    #[test]
    fn fallback_triggers_iff_candidates_are_empty() {
        // release_year = -1 matches nothing; the fallback must still answer.
        let intent = Intent::from_json(r#"{"release_year": -1}"#).unwrap();
        let svc = service(Some(intent));
        let outcome = svc.search("nature documentaries", 5).unwrap();
        assert_eq!(outcome.mode, SearchMode::Fallback);
        assert_eq!(outcome.movies.len(), 2);
        assert_eq!(outcome.movies[0].id, "doc");

        // Non-empty candidates never take the fallback path.
        let svc = service(Some(Intent::default()));
        let outcome = svc.search("nature documentaries", 5).unwrap();
        assert_eq!(outcome.mode, SearchMode::Reranked);
    }

    #[test]
    fn extraction_failure_degrades_to_unfiltered_rerank() {
        let svc = service(None);
        let outcome = svc.search("office comedy", 5).unwrap();
        assert_eq!(outcome.mode, SearchMode::Reranked);
        assert_eq!(outcome.movies.len(), 2);
        assert_eq!(outcome.movies[0].id, "com");
    }

    #[test]
    fn top_k_bounds_the_result_length() {
        let svc = service(Some(Intent::default()));
        let outcome = svc.search("anything", 1).unwrap();
        assert_eq!(outcome.movies.len(), 1);
    }

    #[test]
    fn mismatched_embedder_is_fatal_at_construction() {
        let embedder = HashEmbedder::default();
        let records = vec![record(&embedder, "s1", "Dramas", "a film")];
        let index = VectorIndex::from_embeddings(
            "minilm-384",
            384,
            records.iter().map(|r| (r.id.clone(), r.embedding.clone())),
        )
        .unwrap();
        let store = CatalogStore::new("minilm-384", 384, records).unwrap();
        let err = SearchService::new(store, index, Arc::new(embedder), None).unwrap_err();
        assert!(err.to_string().contains("embedder"));
    }
}
