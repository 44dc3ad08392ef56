//! Embedder trait for semantic search.
//!
//! Two implementations exist: the ML embedder in
//! [`fastembed_embedder`](super::fastembed_embedder) (MiniLM, 384-dim) and
//! the deterministic feature-hashing fallback in
//! [`hash_embedder`](super::hash_embedder). Both emit unit L2-normalized
//! vectors, so similarity everywhere is a plain dot product.

use std::sync::Arc;

use thiserror::Error;

pub type EmbedderResult<T> = Result<T, EmbedderError>;

#[derive(Debug, Error)]
pub enum EmbedderError {
    #[error("embedder unavailable: {0}")]
    Unavailable(String),
    #[error("embedding backend failed: {0}")]
    Backend(String),
}

/// A text-to-vector backend. Implementations must be deterministic for a
/// fixed model revision and must return one vector per input string, all of
/// the advertised dimension.
pub trait Embedder: Send + Sync {
    /// Stable identifier recorded in persisted artifacts (e.g. "minilm-384").
    fn id(&self) -> &str;

    /// Output dimension D.
    fn dimension(&self) -> usize;

    /// Whether this backend captures semantics (vs. lexical hashing).
    fn is_semantic(&self) -> bool;

    /// Embed a batch of texts. One unit-normalized vector per input.
    fn embed(&self, texts: &[String]) -> EmbedderResult<Vec<Vec<f32>>>;

    /// Embed a single query string.
    fn embed_one(&self, text: &str) -> EmbedderResult<Vec<f32>> {
        let mut vectors = self.embed(std::slice::from_ref(&text.to_string()))?;
        vectors
            .pop()
            .ok_or_else(|| EmbedderError::Backend("empty embedding batch".to_string()))
    }
}

/// Scale a vector to unit L2 norm in place. Zero vectors are left alone
/// (they score zero against everything, which is the right degenerate
/// behavior for empty input text).
pub fn normalize_l2(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Default embedder name when none is requested.
pub const DEFAULT_EMBEDDER: &str = "minilm";

/// Resolve an embedder by name: "minilm" (semantic, downloads model files on
/// first use) or "hash" (lexical, always available).
pub fn get_embedder(name: Option<&str>) -> EmbedderResult<Arc<dyn Embedder>> {
    match name.unwrap_or(DEFAULT_EMBEDDER) {
        "minilm" => Ok(Arc::new(super::fastembed_embedder::FastEmbedder::new()?)),
        "hash" => Ok(Arc::new(super::hash_embedder::HashEmbedder::default())),
        other => Err(EmbedderError::Unavailable(format!(
            "unknown embedder '{other}'. Available: minilm, hash"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_produces_unit_vectors() {
        let mut v = vec![3.0, 4.0];
        normalize_l2(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn normalize_leaves_zero_vectors_alone() {
        let mut v = vec![0.0, 0.0, 0.0];
        normalize_l2(&mut v);
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn unknown_embedder_name_is_rejected() {
        let err = get_embedder(Some("word2vec")).err().unwrap();
        assert!(err.to_string().contains("unknown embedder"));
    }

    #[test]
    fn hash_embedder_resolves() {
        let embedder = get_embedder(Some("hash")).unwrap();
        assert_eq!(embedder.id(), "fnv1a-384");
        assert!(!embedder.is_semantic());
    }
}
