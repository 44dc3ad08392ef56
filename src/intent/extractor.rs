//! Intent extraction via an external language-understanding service.
//!
//! The extractor owns a fixed prompt contract: the service is instructed to
//! answer with exactly the [`Intent`](super::Intent) JSON schema. All the
//! "infer implied categories" smarts live in the prompt; this component only
//! sends, parses, validates, and fails safely. Every failure maps to
//! [`IntentError`], which callers treat as the empty intent.

use std::time::Duration;

use serde_json::{Value, json};
use thiserror::Error;

use super::Intent;

/// Default chat model when `MISEARCH_OPENAI_MODEL` is unset.
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default API base when `MISEARCH_OPENAI_BASE` is unset.
const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Per-call timeout; the pipeline must never block indefinitely on intent.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Failures while talking to or interpreting the language-understanding
/// service. All of them are recoverable: the caller continues with the
/// empty intent.
#[derive(Debug, Error)]
pub enum IntentError {
    #[error("intent service request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("intent service returned status {status}: {body}")]
    Service { status: u16, body: String },
    #[error("intent service response carried no content")]
    EmptyResponse,
    #[error("intent payload did not match the schema: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Seam toward the language-understanding service.
pub trait IntentExtractor: Send + Sync {
    fn extract(&self, query: &str) -> Result<Intent, IntentError>;
}

/// Production extractor backed by the OpenAI chat-completions API.
pub struct OpenAiIntentExtractor {
    client: reqwest::blocking::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenAiIntentExtractor {
    pub fn new(api_key: impl Into<String>) -> Result<Self, IntentError> {
        let timeout = dotenvy::var("MISEARCH_INTENT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()?;
        Ok(Self {
            client,
            api_base: dotenvy::var("MISEARCH_OPENAI_BASE")
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            api_key: api_key.into(),
            model: dotenvy::var("MISEARCH_OPENAI_MODEL")
                .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
        })
    }

    /// Build an extractor from `OPENAI_API_KEY`, or `None` when unset.
    /// Without a key the pipeline runs permanently in degraded mode
    /// (no filters, fallback search only when re-ranking needs them).
    pub fn from_env() -> Option<Self> {
        let key = dotenvy::var("OPENAI_API_KEY").ok()?;
        if key.trim().is_empty() {
            return None;
        }
        match Self::new(key) {
            Ok(extractor) => Some(extractor),
            Err(err) => {
                tracing::warn!(error = %err, "intent extractor unavailable");
                None
            }
        }
    }
}

impl IntentExtractor for OpenAiIntentExtractor {
    fn extract(&self, query: &str) -> Result<Intent, IntentError> {
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": intent_prompt(query)}],
            "temperature": 0.2,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(IntentError::Service {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }

        let payload: Value = response.json()?;
        parse_chat_response(&payload)
    }
}

/// Pull the first choice's content out of a chat-completions response and
/// parse it as an intent, tolerating markdown code fences around the JSON.
pub(crate) fn parse_chat_response(payload: &Value) -> Result<Intent, IntentError> {
    let content = payload["choices"][0]["message"]["content"]
        .as_str()
        .ok_or(IntentError::EmptyResponse)?;
    Ok(Intent::from_json(strip_code_fences(content))?)
}

/// Models often wrap JSON answers in ``` fences despite instructions.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

fn intent_prompt(query: &str) -> String {
    format!(
        r#"You are a movie and TV show assistant.

A user describes what they want to watch in natural language. Extract their
intent into a JSON object with exactly these fields and no others:

- genre: list of strings (e.g. comedy, drama, horror, sci-fi, documentaries)
- mood: list of strings (e.g. lighthearted, dark, emotional, intense)
- setting: list of strings (e.g. high school, space, Seattle, hospital)
- duration: string for qualitative terms ("short", "long", "binge", ...)
- duration_minutes: string with a numeric condition ("< 60", "> 120",
  "between 60 and 90"), only when the user refers to numeric duration
- type: list, each element either "movie" or "tv show"
- actors: list of names, if mentioned
- theme: list of strings (e.g. family, rivalry, justice)
- director: string or ""
- title: string or ""
- cast: string or ""
- country: string or ""
- rating: string or "" (e.g. "PG-13", "NR")
- release_year: integer or ""

If something is implied, infer it: "feel-good" implies comedy, "dark"
implies thriller, "murder" implies crime. Mentions of psychology, true
events, real cases or motivations ("why people kill", "true crime",
"biopics") point to documentary, true crime, biography or drama with
themes like psychology or real story - not to fictional thrillers or
horror. If a field is not mentioned and not implied, leave it empty.

Example:

User: "I'm bored, do you have something funny and short?"
Output:
{{
  "genre": ["comedy"],
  "mood": ["lighthearted"],
  "setting": [],
  "duration": "short",
  "duration_minutes": "",
  "type": ["movie"],
  "actors": [],
  "theme": [],
  "director": "",
  "title": "",
  "cast": "",
  "country": "",
  "rating": "",
  "release_year": ""
}}

Now extract from this query: "{query}"
Return only the JSON object."#
    )
}
