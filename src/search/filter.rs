//! Intent-driven catalog filtering.
//!
//! One predicate per non-empty intent field, all AND-ed, all
//! case-insensitive, never reordering: the candidate set keeps the
//! catalog's original record order. Empty fields filter nothing.

use crate::catalog::CatalogStore;
use crate::intent::Intent;
use crate::model::TitleRecord;

/// Parsed form of the `duration_minutes` expression.
///
/// `<` and `>` are strict; `between` is inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DurationExpr {
    LessThan(f32),
    GreaterThan(f32),
    Between(f32, f32),
}

impl DurationExpr {
    /// Parse a comparison expression such as "< 60", "> 120" or
    /// "between 60 and 90". Returns `None` for anything unparseable -
    /// the caller skips the duration filter rather than failing the
    /// request. That skip is deliberate: a fuzzy phrase like "around 90"
    /// should degrade to no constraint, not to an error.
    pub fn parse(expr: &str) -> Option<Self> {
        let expr = expr.trim();
        if expr.is_empty() {
            return None;
        }

        if let Some(rest) = expr.split_once('<').map(|(_, rest)| rest) {
            return parse_threshold(rest).map(DurationExpr::LessThan);
        }
        if let Some(rest) = expr.split_once('>').map(|(_, rest)| rest) {
            return parse_threshold(rest).map(DurationExpr::GreaterThan);
        }
        if expr.to_ascii_lowercase().contains("between") {
            // Whole whitespace-separated tokens only, so a decimal bound
            // like "87.5" parses as one number instead of shattering into
            // two and silently misfiltering.
            let mut bounds = expr
                .split_whitespace()
                .filter_map(|token| token.parse::<f32>().ok());
            let lo = bounds.next()?;
            let hi = bounds.next()?;
            if lo <= hi {
                return Some(DurationExpr::Between(lo, hi));
            }
            return Some(DurationExpr::Between(hi, lo));
        }
        None
    }

    pub fn matches(self, minutes: f32) -> bool {
        match self {
            DurationExpr::LessThan(t) => minutes < t,
            DurationExpr::GreaterThan(t) => minutes > t,
            DurationExpr::Between(lo, hi) => minutes >= lo && minutes <= hi,
        }
    }
}

fn parse_threshold(rest: &str) -> Option<f32> {
    // Mirrors the lenient "take what follows the operator" reading; a
    // trailing "=" (from "<=") still refuses to parse and skips the filter.
    rest.trim().parse::<f32>().ok()
}

/// The catalog subset surviving one intent, as ordered positions into the
/// store. Positions (not copies) keep candidate embeddings borrowable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSet {
    positions: Vec<usize>,
}

impl CandidateSet {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    pub fn records<'a>(&'a self, store: &'a CatalogStore) -> impl Iterator<Item = &'a TitleRecord> {
        self.positions.iter().map(|pos| &store.records()[*pos])
    }
}

/// Apply every non-empty intent field as a conjunctive predicate.
pub fn filter_catalog(store: &CatalogStore, intent: &Intent) -> CandidateSet {
    let duration_expr = DurationExpr::parse(&intent.duration_minutes);
    let positions = store
        .records()
        .iter()
        .enumerate()
        .filter(|(_, record)| record_matches(record, intent, duration_expr))
        .map(|(pos, _)| pos)
        .collect();
    CandidateSet { positions }
}

fn record_matches(record: &TitleRecord, intent: &Intent, duration: Option<DurationExpr>) -> bool {
    // Every genre token must independently appear in the genre list.
    if !intent
        .genre
        .iter()
        .all(|g| contains_ci(&record.listed_in, g))
    {
        return false;
    }

    // Conjunctive like the other list filters. A record has exactly one
    // kind, so two distinct tokens here produce an empty result set by
    // construction; that asymmetry is intentional and covered by tests.
    if !intent.kind.iter().all(|t| record.kind.matches_token(t)) {
        return false;
    }

    if !intent.actors.iter().all(|a| contains_ci(&record.cast, a)) {
        return false;
    }

    if let Some(country) = &intent.country
        && !contains_ci(&record.country, country)
    {
        return false;
    }

    if let Some(director) = &intent.director
        && !contains_ci(&record.director, director)
    {
        return false;
    }

    if let Some(title) = &intent.title
        && !contains_ci(&record.title, title)
    {
        return false;
    }

    if let Some(cast) = &intent.cast
        && !contains_ci(&record.cast, cast)
    {
        return false;
    }

    if let Some(rating) = &intent.rating
        && !record.rating.trim().eq_ignore_ascii_case(rating.trim())
    {
        return false;
    }

    if let Some(year) = intent.release_year
        && record.release_year != Some(year)
    {
        return false;
    }

    if let Some(expr) = duration
        && !expr.matches(record.duration_minutes)
    {
        return false;
    }

    true
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack
        .to_lowercase()
        .contains(&needle.trim().to_lowercase())
}
