//! Search layer facade.
//!
//! - **[`embedder`]**: Embedder trait (hash and ML implementations).
//! - **[`fastembed_embedder`]**: FastEmbed-backed MiniLM embedder.
//! - **[`hash_embedder`]**: FNV-1a feature hashing embedder (deterministic fallback).
//! - **[`vector_index`]**: TVIX flat inner-product index with binary persistence.
//! - **[`filter`]**: intent-driven conjunctive catalog filtering.
//! - **[`rerank`]**: enriched-query embedding re-rank of candidates.
//! - **[`service`]**: the owned SearchService running the whole pipeline.

pub mod embedder;
pub mod fastembed_embedder;
pub mod filter;
pub mod hash_embedder;
pub mod rerank;
pub mod service;
pub mod vector_index;
