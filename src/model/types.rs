//! Catalog entity structs.

use serde::{Deserialize, Serialize};

/// The two kinds of title the catalog carries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TitleKind {
    Movie,
    TvShow,
}

impl TitleKind {
    /// Display label, matching the upstream catalog's `type` column.
    pub fn label(self) -> &'static str {
        match self {
            TitleKind::Movie => "Movie",
            TitleKind::TvShow => "TV Show",
        }
    }

    /// Case-insensitive match against a user-supplied type token
    /// ("movie", "TV Show", ...).
    pub fn matches_token(self, token: &str) -> bool {
        token.trim().eq_ignore_ascii_case(self.label())
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        if label.eq_ignore_ascii_case("movie") {
            Some(TitleKind::Movie)
        } else if label.eq_ignore_ascii_case("tv show") {
            Some(TitleKind::TvShow)
        } else {
            None
        }
    }
}

impl std::fmt::Display for TitleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One media title, immutable after the catalog build.
///
/// Text fields are never null: missing director/cast/country arrive as
/// "Unknown" from ingestion, everything else as the empty string.
/// `duration_minutes` holds cleaned minutes for movies and the season
/// count for TV shows. `embedding` is unit L2-normalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitleRecord {
    pub id: String,
    pub title: String,
    pub kind: TitleKind,
    pub director: String,
    pub cast: String,
    pub country: String,
    pub release_year: Option<i32>,
    pub rating: String,
    pub duration_minutes: f32,
    pub listed_in: String,
    pub description: String,
    pub embedding: Vec<f32>,
}

/// A ranked search hit before projection: record id plus similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedHit {
    pub id: String,
    pub score: f32,
}

/// External projection of a [`TitleRecord`] for API consumers.
///
/// Field names and shapes are part of the HTTP contract: `type` is the
/// kind label, `duration` is rendered as "<n> min", and a missing release
/// year serializes as JSON null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiMovie {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub director: String,
    pub cast: String,
    pub country: String,
    pub release_year: Option<i32>,
    pub rating: String,
    pub duration: String,
    pub listed_in: String,
    pub description: String,
}

impl ApiMovie {
    pub fn from_record(record: &TitleRecord) -> Self {
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
            kind: record.kind.label().to_string(),
            director: record.director.clone(),
            cast: record.cast.clone(),
            country: record.country.clone(),
            release_year: record.release_year,
            rating: record.rating.clone(),
            duration: format_duration(record.duration_minutes),
            listed_in: record.listed_in.clone(),
            description: record.description.clone(),
        }
    }
}

/// Render a cleaned duration as the "<n> min" contract string.
/// Whole values drop the fractional part; imputed means keep two decimals.
pub fn format_duration(minutes: f32) -> String {
    if minutes.fract() == 0.0 {
        format!("{} min", minutes as i64)
    } else {
        format!("{minutes:.2} min")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_tokens_case_insensitively() {
        assert!(TitleKind::Movie.matches_token("movie"));
        assert!(TitleKind::Movie.matches_token(" MOVIE "));
        assert!(TitleKind::TvShow.matches_token("tv show"));
        assert!(!TitleKind::TvShow.matches_token("movie"));
        assert!(!TitleKind::Movie.matches_token("tv show"));
    }

    #[test]
    fn kind_round_trips_through_label() {
        assert_eq!(TitleKind::from_label("Movie"), Some(TitleKind::Movie));
        assert_eq!(TitleKind::from_label("tv show"), Some(TitleKind::TvShow));
        assert_eq!(TitleKind::from_label("podcast"), None);
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(90.0), "90 min");
        assert_eq!(format_duration(99.58), "99.58 min");
    }

    #[test]
    fn api_movie_serializes_contract_fields() {
        let record = TitleRecord {
            id: "s1".into(),
            title: "Example".into(),
            kind: TitleKind::Movie,
            director: "Unknown".into(),
            cast: "A. Actor".into(),
            country: "France".into(),
            release_year: None,
            rating: "PG-13".into(),
            duration_minutes: 45.0,
            listed_in: "Documentaries".into(),
            description: "desc".into(),
            embedding: vec![1.0],
        };
        let json = serde_json::to_value(ApiMovie::from_record(&record)).unwrap();
        assert_eq!(json["type"], "Movie");
        assert_eq!(json["duration"], "45 min");
        assert!(json["release_year"].is_null());
    }
}
