//! FNV-1a feature-hashing embedder.
//!
//! A lexical stand-in for the ML embedder: each word and word bigram is
//! hashed into one of D buckets with a sign bit, then the vector is
//! L2-normalized. No model files, fully deterministic, cheap. Shared
//! vocabulary still yields meaningful overlap, which is enough for the
//! degraded path and for exercising the whole pipeline in tests.

use super::embedder::{Embedder, EmbedderResult, normalize_l2};

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

pub const HASH_EMBEDDER_ID: &str = "fnv1a-384";
pub const HASH_DIMENSION: usize = 384;

#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self {
            dimension: HASH_DIMENSION,
        }
    }
}

impl HashEmbedder {
    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let tokens: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
            .collect();

        for token in &tokens {
            self.bump(&mut vector, token);
        }
        for pair in tokens.windows(2) {
            self.bump(&mut vector, &format!("{} {}", pair[0], pair[1]));
        }

        normalize_l2(&mut vector);
        vector
    }

    fn bump(&self, vector: &mut [f32], feature: &str) {
        let hash = fnv1a(feature.as_bytes());
        let bucket = (hash % self.dimension as u64) as usize;
        // One hash bit decides the sign, which keeps unrelated features
        // from accumulating into spurious positive similarity.
        let sign = if hash & (1 << 63) == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign;
    }
}

impl Embedder for HashEmbedder {
    fn id(&self) -> &str {
        HASH_EMBEDDER_ID
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn is_semantic(&self) -> bool {
        false
    }

    fn embed(&self, texts: &[String]) -> EmbedderResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn embeddings_are_deterministic() {
        let embedder = HashEmbedder::default();
        let a = embedder.embed_one("space documentaries").unwrap();
        let b = embedder.embed_one("space documentaries").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn embeddings_are_unit_normalized() {
        let embedder = HashEmbedder::default();
        let v = embedder.embed_one("a long sentence about nature films").unwrap();
        assert_eq!(v.len(), HASH_DIMENSION);
        assert!((norm(&v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn shared_vocabulary_scores_higher_than_disjoint() {
        let embedder = HashEmbedder::default();
        let query = embedder.embed_one("funny comedy movie").unwrap();
        let related = embedder.embed_one("a very funny comedy").unwrap();
        let unrelated = embedder.embed_one("grim war chronicle").unwrap();
        assert!(dot(&query, &related) > dot(&query, &unrelated));
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let embedder = HashEmbedder::default();
        let v = embedder.embed_one("").unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn batch_embeds_one_vector_per_input() {
        let embedder = HashEmbedder::default();
        let vectors = embedder
            .embed(&["one".to_string(), "two".to_string()])
            .unwrap();
        assert_eq!(vectors.len(), 2);
    }
}
