//! Offline evaluation of the search pipeline against a fixture query set.
//!
//! Each fixture pairs a natural-language query with keywords the top
//! results should mention. Every query runs through the full pipeline;
//! a result counts as a hit when its catalog text shares at least one
//! token with the expected keywords. Tokens are lowercased alphanumeric
//! words, a deliberate approximation of lemma matching: it keeps the
//! metric dependency-free and stable across runs.

use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::catalog::ingest::duration_label;
use crate::model::TitleRecord;
use crate::search::service::SearchService;

/// One evaluation fixture: a query plus the keywords that make a result
/// count as relevant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalQuery {
    pub query: String,
    pub expected_keywords: Vec<String>,
}

/// Per-result judgement inside one query report.
#[derive(Debug, Clone, Serialize)]
pub struct JudgedResult {
    pub title: String,
    pub hit: bool,
}

/// Evaluation summary for one query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryReport {
    pub query: String,
    pub hit_count: usize,
    /// Hits over the requested `top_k`, so short result lists score low
    /// rather than being excused.
    pub hit_rate: f32,
    pub results: Vec<JudgedResult>,
}

/// Run every fixture through the pipeline and judge the top results.
pub fn evaluate(
    service: &SearchService,
    queries: &[EvalQuery],
    top_k: usize,
) -> Result<Vec<QueryReport>> {
    let mut reports = Vec::with_capacity(queries.len());
    for fixture in queries {
        let expected = tokenize(&fixture.expected_keywords.join(" "));
        let outcome = service
            .search(&fixture.query, top_k)
            .with_context(|| format!("evaluate query {:?}", fixture.query))?;

        let results: Vec<JudgedResult> = outcome
            .movies
            .iter()
            .map(|movie| {
                let record = service
                    .catalog()
                    .get(&movie.id)
                    .with_context(|| format!("evaluated id {:?} missing from catalog", movie.id))?;
                Ok(JudgedResult {
                    title: record.title.clone(),
                    hit: !expected.is_disjoint(&tokenize(&record_text(record))),
                })
            })
            .collect::<Result<_>>()?;

        let hit_count = results.iter().filter(|r| r.hit).count();
        let hit_rate = if top_k == 0 {
            0.0
        } else {
            hit_count as f32 / top_k as f32
        };
        tracing::debug!(query = %fixture.query, hit_count, hit_rate, "evaluated query");
        reports.push(QueryReport {
            query: fixture.query.clone(),
            hit_count,
            hit_rate,
            results,
        });
    }
    Ok(reports)
}

/// Mean hit rate across all reports.
pub fn mean_hit_rate(reports: &[QueryReport]) -> f32 {
    if reports.is_empty() {
        return 0.0;
    }
    reports.iter().map(|r| r.hit_rate).sum::<f32>() / reports.len() as f32
}

/// Load fixtures from a JSON file: an array of
/// `{"query": ..., "expected_keywords": [...]}` objects.
pub fn load_queries(path: &Path) -> Result<Vec<EvalQuery>> {
    let file = File::open(path).with_context(|| format!("open evaluation fixtures {path:?}"))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parse evaluation fixtures {path:?}"))
}

/// Lowercased alphanumeric word set.
fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// All catalog text a result can be judged on, mirroring the fields that
/// feed the embedding input.
fn record_text(record: &TitleRecord) -> String {
    let year = record
        .release_year
        .map(|y| y.to_string())
        .unwrap_or_default();
    [
        record.title.as_str(),
        record.description.as_str(),
        record.listed_in.as_str(),
        record.cast.as_str(),
        record.director.as_str(),
        record.country.as_str(),
        record.kind.label(),
        &year,
        record.rating.as_str(),
        duration_label(record.kind, record.duration_minutes),
    ]
    .join(". ")
}

/// The built-in fixture set used when no file is supplied.
pub fn default_queries() -> Vec<EvalQuery> {
    fn q(query: &str, expected: &[&str]) -> EvalQuery {
        EvalQuery {
            query: query.to_string(),
            expected_keywords: expected.iter().map(|k| k.to_string()).collect(),
        }
    }

    vec![
        q("I'm bored, do you have something funny and short?", &["comedy", "funny", "short"]),
        q("Any romantic movies from India I can watch tonight?", &["romantic", "India"]),
        q("Can you recommend a good one-season crime show?", &["crime", "one season"]),
        q("I'm in the mood for a feel-good movie under an hour.", &["feel-good", "short", "movie"]),
        q("Something scary and intense would be perfect right now.", &["horror", "thriller", "scary"]),
        q("Got any animated movies for kids?", &["animation", "kids", "children"]),
        q("I'm in for a mystery drama with some plot twists.", &["mystery", "drama", "twist"]),
        q("What about a nice romantic comedy?", &["romantic", "comedy", "romcom"]),
        q("I want to watch a sci-fi movie with space travel.", &["sci-fi", "space"]),
        q("I'm into historical war dramas lately. Got one?", &["historical", "war", "drama"]),
        q("Any good nature documentaries?", &["documentary", "nature", "wildlife"]),
        q("I just want something lighthearted to relax with.", &["lighthearted", "feel-good", "comedy"]),
        q("Can you suggest a sports-themed movie or show?", &["sports", "competition", "athlete"]),
        q("I feel like watching something set in prison.", &["prison", "inmate", "jail"]),
        q("Do you have any Shah Rukh Khan movies?", &["Shah Rukh Khan"]),
        q("Is there a short horror film I can watch?", &["short", "horror"]),
        q("I'm in the mood for something musical, film or show.", &["musical", "music", "singing"]),
        q("I love biopics or true stories. Anything like that?", &["biopic", "true story", "based on real"]),
        q("Can I get an action-packed thriller?", &["action", "thriller"]),
        q("I want something dark and psychological tonight.", &["dark", "psychological", "drama"]),
        q(
            "I want to watch something with doctors. It should be set in Seattle.",
            &["doctor", "Seattle", "hospital"],
        ),
        q(
            "I'm curious about the psychology behind murderers. Got anything like that?",
            &["psychology", "crime", "serial killer", "murder"],
        ),
        q(
            "Can you suggest a show about lawyers or courtroom drama?",
            &["lawyer", "court", "legal", "drama"],
        ),
        q(
            "Is there a documentary on cults or strange communities?",
            &["cult", "community", "documentary"],
        ),
        q(
            "I feel like watching something about space exploration.",
            &["space", "exploration", "astronaut", "sci-fi"],
        ),
        q(
            "Any lighthearted teen romance shows?",
            &["teen", "romantic", "high school", "lighthearted"],
        ),
        q(
            "Do you have something based on true crimes?",
            &["true crime", "murder", "investigation", "based on real"],
        ),
        q(
            "I'd love a political drama with some conspiracy involved.",
            &["political", "conspiracy", "government", "drama"],
        ),
        q(
            "Can I get a travel show about unique places in the world?",
            &["travel", "places", "locations", "culture", "documentary"],
        ),
        q(
            "I want something about sibling rivalry or complicated families.",
            &["family", "siblings", "rivalry", "drama"],
        ),
    ]
}
