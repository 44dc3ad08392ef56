//! FastEmbed-backed ML embedder (MiniLM-L6-v2, 384 dimensions).
//!
//! Model files are fetched by fastembed on first construction and cached in
//! its local model directory. Outputs are re-normalized defensively so the
//! unit-norm invariant never depends on backend behavior.

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use parking_lot::Mutex;

use super::embedder::{Embedder, EmbedderError, EmbedderResult, normalize_l2};

pub const MINILM_EMBEDDER_ID: &str = "minilm-384";
pub const MINILM_DIMENSION: usize = 384;

pub struct FastEmbedder {
    // The ONNX session is not guaranteed shareable across threads; the
    // mutex keeps the trait object Sync without constraining callers.
    model: Mutex<TextEmbedding>,
}

impl FastEmbedder {
    pub fn new() -> EmbedderResult<Self> {
        let options =
            InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(false);
        let model = TextEmbedding::try_new(options)
            .map_err(|e| EmbedderError::Unavailable(format!("MiniLM init failed: {e}")))?;
        tracing::info!(id = MINILM_EMBEDDER_ID, dimension = MINILM_DIMENSION, "loaded embedder");
        Ok(Self {
            model: Mutex::new(model),
        })
    }
}

impl Embedder for FastEmbedder {
    fn id(&self) -> &str {
        MINILM_EMBEDDER_ID
    }

    fn dimension(&self) -> usize {
        MINILM_DIMENSION
    }

    fn is_semantic(&self) -> bool {
        true
    }

    fn embed(&self, texts: &[String]) -> EmbedderResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut vectors = self
            .model
            .lock()
            .embed(texts.to_vec(), None)
            .map_err(|e| EmbedderError::Backend(e.to_string()))?;
        if vectors.len() != texts.len() {
            return Err(EmbedderError::Backend(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        for vector in &mut vectors {
            if vector.len() != MINILM_DIMENSION {
                return Err(EmbedderError::Backend(format!(
                    "expected dimension {MINILM_DIMENSION}, got {}",
                    vector.len()
                )));
            }
            normalize_l2(vector);
        }
        Ok(vectors)
    }
}
