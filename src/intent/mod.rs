//! Structured intent extracted from a natural-language query.
//!
//! The language-understanding service answers with a fixed JSON shape; this
//! module is the typed, validated form of that answer. Every field is
//! optional or empty-able: an empty field imposes no filter downstream.
//! Unexpected keys are rejected at deserialization, which fails the
//! extraction as a whole (the caller then degrades to the empty intent).

pub mod extractor;

pub use extractor::{IntentError, IntentExtractor, OpenAiIntentExtractor};

use serde::de::{self, Deserializer};
use serde::Deserialize;

/// Filters inferred from one user query. Per-request, never persisted.
///
/// Field order mirrors the prompt schema; [`Intent::flatten_strings`]
/// depends on it for deterministic enriched queries.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Intent {
    #[serde(default, deserialize_with = "de_string_list")]
    pub genre: Vec<String>,
    #[serde(default, deserialize_with = "de_string_list")]
    pub mood: Vec<String>,
    #[serde(default, deserialize_with = "de_string_list")]
    pub setting: Vec<String>,
    /// Qualitative duration label ("short", "binge", ...). Not a filter,
    /// only enriched-query material.
    #[serde(default, deserialize_with = "de_string")]
    pub duration: String,
    /// Comparison expression over cleaned minutes, e.g. "< 60" or
    /// "between 60 and 90". Parsed leniently by the catalog filter.
    #[serde(default, deserialize_with = "de_string")]
    pub duration_minutes: String,
    #[serde(default, rename = "type", deserialize_with = "de_string_list")]
    pub kind: Vec<String>,
    #[serde(default, deserialize_with = "de_string_list")]
    pub actors: Vec<String>,
    #[serde(default, deserialize_with = "de_string_list")]
    pub theme: Vec<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub director: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub cast: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub rating: Option<String>,
    #[serde(default, deserialize_with = "de_release_year")]
    pub release_year: Option<i32>,
}

impl Intent {
    /// Parse a JSON object into an intent. Unknown keys or a non-object
    /// payload are errors; missing fields default to empty.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// True when no field would filter or enrich anything.
    pub fn is_empty(&self) -> bool {
        self == &Intent::default()
    }

    /// Flatten every non-blank string-valued field into individual tokens,
    /// in declaration order. List fields contribute one token per element;
    /// `release_year` is numeric and deliberately excluded.
    pub fn flatten_strings(&self) -> Vec<String> {
        let mut parts = Vec::new();
        let mut push = |value: &str| {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                parts.push(trimmed.to_string());
            }
        };

        for v in &self.genre {
            push(v);
        }
        for v in &self.mood {
            push(v);
        }
        for v in &self.setting {
            push(v);
        }
        push(&self.duration);
        push(&self.duration_minutes);
        for v in &self.kind {
            push(v);
        }
        for v in &self.actors {
            push(v);
        }
        for v in &self.theme {
            push(v);
        }
        for v in [&self.director, &self.title, &self.cast, &self.country, &self.rating]
            .into_iter()
            .flatten()
        {
            push(v);
        }

        parts
    }
}

/// String field: accepts a string or null.
fn de_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}

/// Optional string field: null and blank both mean "unset". A one-element
/// list is tolerated (some model answers list-wrap scalar fields).
fn de_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        One(Option<String>),
        Many(Vec<String>),
    }

    let value = match Raw::deserialize(deserializer)? {
        Raw::One(v) => v,
        Raw::Many(items) => items.into_iter().find(|s| !s.trim().is_empty()),
    };
    Ok(value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
}

/// List field: accepts a list, a bare string, or null. Blank elements are
/// dropped so downstream filters never see whitespace-only tokens.
fn de_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Many(Vec<String>),
        One(Option<String>),
    }

    let items = match Raw::deserialize(deserializer)? {
        Raw::Many(items) => items,
        Raw::One(Some(s)) => vec![s],
        Raw::One(None) => Vec::new(),
    };
    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

/// Release year: accepts an integer, a numeric string, "" or null.
/// Non-numeric strings are an error (the extraction fails safely).
fn de_release_year<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(i64),
        Text(Option<String>),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => i32::try_from(n)
            .map(Some)
            .map_err(|_| de::Error::custom(format!("release_year out of range: {n}"))),
        Raw::Text(None) => Ok(None),
        Raw::Text(Some(s)) => {
            let s = s.trim();
            if s.is_empty() {
                Ok(None)
            } else {
                s.parse::<i32>()
                    .map(Some)
                    .map_err(|_| de::Error::custom(format!("invalid release_year: {s:?}")))
            }
        }
    }
}
