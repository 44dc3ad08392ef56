//! Offline catalog build: JSONL ingest, field cleanup, embedding input.
//!
//! The upstream preprocessing collaborator emits one raw title per line.
//! This module normalizes the messy fields before embedding:
//!
//! 1. Missing director/cast/country become "Unknown".
//! 2. Duration is reduced to a number (minutes for movies, seasons for
//!    shows). Some source rows carry the duration in the rating column;
//!    those are recovered and the rating reset to Unrated.
//! 3. Missing durations are imputed (movie mean, show median).
//! 4. Each title gets a qualitative duration label and a single
//!    embedding-input text, NFC-normalized for deterministic vectors.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use unicode_normalization::UnicodeNormalization;

use crate::model::{TitleKind, TitleRecord};
use crate::search::embedder::Embedder;
use crate::search::vector_index::VectorIndex;

use super::CatalogStore;

/// Embedding batch size; MiniLM throughput flattens out well before this.
const EMBED_BATCH: usize = 256;

/// One raw title as ingested. Unknown keys (date_added, ...) are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTitle {
    pub show_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub director: Option<String>,
    #[serde(default)]
    pub cast: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub release_year: Option<i32>,
    #[serde(default)]
    pub rating: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub listed_in: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A cleaned title, ready to embed. `duration_minutes` is `None` until
/// imputation fills it.
#[derive(Debug, Clone)]
pub struct CleanTitle {
    pub id: String,
    pub title: String,
    pub kind: TitleKind,
    pub director: String,
    pub cast: String,
    pub country: String,
    pub release_year: Option<i32>,
    pub rating: String,
    pub duration_minutes: Option<f32>,
    pub listed_in: String,
    pub description: String,
}

pub fn read_jsonl(path: &Path) -> Result<Vec<RawTitle>> {
    let file = File::open(path).with_context(|| format!("open catalog input {path:?}"))?;
    let mut titles = Vec::new();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("read line {} of {path:?}", lineno + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let raw: RawTitle = serde_json::from_str(&line)
            .with_context(|| format!("parse line {} of {path:?}", lineno + 1))?;
        titles.push(raw);
    }
    Ok(titles)
}

/// Normalize raw titles and impute missing durations across the batch.
pub fn clean_titles(raw: Vec<RawTitle>) -> Vec<CleanTitle> {
    let mut titles: Vec<CleanTitle> = raw.into_iter().filter_map(clean_one).collect();
    impute_durations(&mut titles);
    titles
}

fn clean_one(raw: RawTitle) -> Option<CleanTitle> {
    let Some(kind) = TitleKind::from_label(&raw.kind) else {
        tracing::warn!(id = %raw.show_id, kind = %raw.kind, "skipping title with unknown type");
        return None;
    };

    let mut rating = raw.rating.unwrap_or_default();
    let mut duration_minutes = raw.duration.as_deref().and_then(extract_number);

    // Some source rows shift the duration into the rating column.
    if duration_minutes.is_none() && rating_holds_duration(&rating) {
        duration_minutes = extract_number(&rating);
        rating = "Unrated".to_string();
    } else if rating_holds_duration(&rating) {
        rating = "Unrated".to_string();
    }

    if rating.trim().is_empty() {
        rating = "Unrated".to_string();
    }
    let rating = rating.trim().to_uppercase();

    let fill = |value: Option<String>| {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "Unknown".to_string())
    };

    Some(CleanTitle {
        id: raw.show_id,
        title: raw.title,
        kind,
        director: fill(raw.director),
        cast: fill(raw.cast),
        country: fill(raw.country),
        release_year: raw.release_year,
        rating,
        duration_minutes,
        listed_in: raw.listed_in.unwrap_or_default(),
        description: raw.description.unwrap_or_default(),
    })
}

fn rating_holds_duration(rating: &str) -> bool {
    rating.contains("min") || rating.contains("Season")
}

/// First contiguous digit run in the string, as a float.
fn extract_number(text: &str) -> Option<f32> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Movies missing a duration get the mean of known movie durations
/// (two decimals); shows get the median season count.
fn impute_durations(titles: &mut [CleanTitle]) {
    let movie_durations: Vec<f32> = titles
        .iter()
        .filter(|t| t.kind == TitleKind::Movie)
        .filter_map(|t| t.duration_minutes)
        .collect();
    let show_durations: Vec<f32> = titles
        .iter()
        .filter(|t| t.kind == TitleKind::TvShow)
        .filter_map(|t| t.duration_minutes)
        .collect();

    let movie_mean = mean(&movie_durations).map(|m| (m * 100.0).round() / 100.0);
    let show_median = median(&show_durations);

    for title in titles.iter_mut() {
        if title.duration_minutes.is_some() {
            continue;
        }
        title.duration_minutes = match title.kind {
            TitleKind::Movie => movie_mean,
            TitleKind::TvShow => show_median,
        };
        if title.duration_minutes.is_none() {
            // No peers to impute from; zero keeps duration filters sane.
            title.duration_minutes = Some(0.0);
        }
    }
}

fn mean(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f32>() / values.len() as f32)
}

fn median(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f32::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Qualitative duration bucket appended to the embedding input.
pub fn duration_label(kind: TitleKind, duration: f32) -> &'static str {
    match kind {
        TitleKind::Movie => {
            if duration < 60.0 {
                "very short movie"
            } else if duration < 120.0 {
                "short movie"
            } else {
                "long movie"
            }
        }
        TitleKind::TvShow => {
            if duration == 1.0 {
                "one season show"
            } else if duration > 1.0 {
                "multi-season show"
            } else {
                "unknown"
            }
        }
    }
}

/// The single text that represents a title in embedding space.
pub fn embedding_input(title: &CleanTitle) -> String {
    let duration = title.duration_minutes.unwrap_or(0.0);
    let year = title
        .release_year
        .map(|y| y.to_string())
        .unwrap_or_default();
    let parts = [
        title.title.as_str(),
        title.description.as_str(),
        title.listed_in.as_str(),
        title.cast.as_str(),
        title.director.as_str(),
        title.country.as_str(),
        title.kind.label(),
        &year,
        title.rating.as_str(),
        &format!("{duration}"),
        duration_label(title.kind, duration),
    ]
    .join(". ");
    parts.nfc().collect()
}

/// Embed every cleaned title and assemble the two query-time artifacts.
/// Records keep ingest order, which downstream code treats as canonical.
pub fn build_artifacts(
    embedder: &Arc<dyn Embedder>,
    titles: Vec<CleanTitle>,
) -> Result<(CatalogStore, VectorIndex)> {
    if titles.is_empty() {
        bail!("catalog input contained no usable titles");
    }

    let inputs: Vec<String> = titles.iter().map(embedding_input).collect();
    let mut embeddings = Vec::with_capacity(inputs.len());
    for batch in inputs.chunks(EMBED_BATCH) {
        embeddings.extend(embedder.embed(batch)?);
    }

    let records: Vec<TitleRecord> = titles
        .into_iter()
        .zip(embeddings)
        .map(|(t, embedding)| TitleRecord {
            id: t.id,
            title: t.title,
            kind: t.kind,
            director: t.director,
            cast: t.cast,
            country: t.country,
            release_year: t.release_year,
            rating: t.rating,
            duration_minutes: t.duration_minutes.unwrap_or(0.0),
            listed_in: t.listed_in,
            description: t.description,
            embedding,
        })
        .collect();

    let index = VectorIndex::from_embeddings(
        embedder.id(),
        embedder.dimension(),
        records
            .iter()
            .map(|r| (r.id.clone(), r.embedding.clone())),
    )?;
    let store = CatalogStore::new(embedder.id(), embedder.dimension(), records)?;

    tracing::info!(
        count = store.len(),
        embedder = embedder.id(),
        "built catalog artifacts"
    );
    Ok((store, index))
}
