//! Embedding re-rank of filtered candidates.
//!
//! The query embedded here is not the raw user text but an "enriched"
//! variant: the raw text plus every non-blank intent token. Filters already
//! guaranteed the hard constraints; the enrichment pulls the embedding
//! toward the softer ones (mood, setting, theme) that never filter.

use crate::catalog::CatalogStore;
use crate::intent::Intent;
use crate::model::RankedHit;

use super::filter::CandidateSet;

/// Delimiter between the raw query and each flattened intent token.
const ENRICH_DELIMITER: &str = ". ";

/// Raw query text plus flattened intent fields, in declaration order.
pub fn enrich_query(query: &str, intent: &Intent) -> String {
    let mut parts = vec![query.trim().to_string()];
    parts.extend(intent.flatten_strings());
    parts.join(ENRICH_DELIMITER)
}

/// Score every candidate against the enriched-query embedding and keep the
/// best `top_k`. The sort is stable and descending, so equal scores keep
/// candidate-set (i.e. catalog) order. Fewer candidates than `top_k`
/// returns all of them, ranked.
pub fn rerank(
    store: &CatalogStore,
    candidates: &CandidateSet,
    query_embedding: &[f32],
    top_k: usize,
) -> Vec<RankedHit> {
    let mut scored: Vec<RankedHit> = candidates
        .records(store)
        .map(|record| RankedHit {
            id: record.id.clone(),
            score: dot(&record.embedding, query_embedding),
        })
        .collect();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(top_k);
    scored
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
