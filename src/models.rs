//! Data models for collected news and run results.
//!
//! This module defines the records that flow through the pipeline:
//! - [`Candidate`]: validated feed metadata for one article
//! - [`EnrichedCandidate`]: a candidate plus the extracted body text
//! - [`CollectionResult`]: the summary record produced by a stage or run
//! - [`TimeWindow`]: the inclusive publication window a run collects from
//!
//! Serialized field names are camelCase to match the JSON consumed by the
//! script generation service downstream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Why a feed entry could not become a [`Candidate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidCandidate {
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("url {0:?} is not an absolute http(s) url")]
    Url(String),
}

/// Metadata for one article as reported by a feed.
///
/// Built only through [`Candidate::new`], which trims text fields and
/// rejects empty titles, summaries and source names as well as anything that
/// is not an absolute `http`/`https` URL. The URL is the identity of a
/// candidate within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub title: String,
    pub summary: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub source_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Candidate {
    /// Validate and build a candidate.
    ///
    /// # Errors
    ///
    /// [`InvalidCandidate::Empty`] for blank text fields and
    /// [`InvalidCandidate::Url`] for relative or non-web URLs.
    pub fn new(
        title: &str,
        summary: &str,
        url: &str,
        published_at: DateTime<Utc>,
        source_name: &str,
        category: Option<&str>,
    ) -> Result<Self, InvalidCandidate> {
        let title = non_empty("title", title)?;
        let summary = non_empty("summary", summary)?;
        let source_name = non_empty("source_name", source_name)?;

        let url = url.trim();
        match Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            _ => return Err(InvalidCandidate::Url(url.to_string())),
        }

        Ok(Self {
            title,
            summary,
            url: url.to_string(),
            published_at,
            source_name,
            category: category
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
        })
    }
}

fn non_empty(field: &'static str, value: &str) -> Result<String, InvalidCandidate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(InvalidCandidate::Empty(field))
    } else {
        Ok(trimmed.to_string())
    }
}

/// A candidate after the content extractor visited its page.
///
/// `body_text` is `None` when extraction failed; the candidate fields are
/// never altered by extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedCandidate {
    #[serde(flatten)]
    pub candidate: Candidate,
    pub body_text: Option<String>,
    /// Headline advertised by the page itself (og/twitter/`<title>`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_description: Option<String>,
}

impl EnrichedCandidate {
    /// Wrap a candidate that has no body yet.
    pub fn unenriched(candidate: Candidate) -> Self {
        Self {
            candidate,
            body_text: None,
            page_title: None,
            page_description: None,
        }
    }

    pub fn has_body(&self) -> bool {
        self.body_text.is_some()
    }
}

/// Which collector produced a [`CollectionResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceKind {
    GoogleNews,
    Rss,
    /// Results merged from several feed sources.
    Mixed,
}

/// Outcome of a collection stage or a whole run.
///
/// `total_collected` counts candidates gathered after URL deduplication,
/// `items` holds whatever the stage produced. A failed run is still a value:
/// `success` is `false`, `items` is empty, and `errors` says why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionResult<T> {
    pub success: bool,
    pub items: Vec<T>,
    pub total_collected: usize,
    pub duplicates_removed: usize,
    pub source: SourceKind,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl<T> CollectionResult<T> {
    /// Assemble a result; `success` is derived from `items` being non-empty
    /// and an empty error list is stored as `None`.
    pub fn new(
        items: Vec<T>,
        total_collected: usize,
        duplicates_removed: usize,
        source: SourceKind,
        errors: Vec<String>,
    ) -> Self {
        Self {
            success: !items.is_empty(),
            items,
            total_collected,
            duplicates_removed,
            source,
            timestamp: Utc::now(),
            errors: if errors.is_empty() { None } else { Some(errors) },
        }
    }
}

/// Inclusive `[start, end]` publication window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Whether `t` falls inside the window, both ends included.
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 2, 30, 0).unwrap()
    }

    #[test]
    fn candidate_trims_and_validates() {
        let c = Candidate::new(
            "  금리 동결  ",
            " 한국은행이 기준금리를 동결했다 ",
            "https://news.example.com/a/1",
            ts(),
            " 조선일보 ",
            Some(" 경제 "),
        )
        .unwrap();
        assert_eq!(c.title, "금리 동결");
        assert_eq!(c.source_name, "조선일보");
        assert_eq!(c.category.as_deref(), Some("경제"));
    }

    #[test]
    fn candidate_rejects_blank_fields() {
        let err = Candidate::new(" ", "s", "https://x.example", ts(), "src", None).unwrap_err();
        assert_eq!(err, InvalidCandidate::Empty("title"));
        let err = Candidate::new("t", "", "https://x.example", ts(), "src", None).unwrap_err();
        assert_eq!(err, InvalidCandidate::Empty("summary"));
        let err = Candidate::new("t", "s", "https://x.example", ts(), "\n", None).unwrap_err();
        assert_eq!(err, InvalidCandidate::Empty("source_name"));
    }

    #[test]
    fn candidate_rejects_non_web_urls() {
        for url in ["/relative/path", "ftp://files.example/a", "not a url", ""] {
            assert!(matches!(
                Candidate::new("t", "s", url, ts(), "src", None),
                Err(InvalidCandidate::Url(_))
            ));
        }
    }

    #[test]
    fn window_is_inclusive() {
        let w = TimeWindow::new(ts(), ts() + Duration::hours(1));
        assert!(w.contains(ts()));
        assert!(w.contains(ts() + Duration::hours(1)));
        assert!(!w.contains(ts() - Duration::seconds(1)));
        assert!(!w.contains(ts() + Duration::hours(1) + Duration::seconds(1)));
    }

    #[test]
    fn result_success_tracks_items() {
        let empty: CollectionResult<Candidate> =
            CollectionResult::new(vec![], 0, 0, SourceKind::GoogleNews, vec!["boom".into()]);
        assert!(!empty.success);
        assert_eq!(empty.errors, Some(vec!["boom".to_string()]));

        let full = CollectionResult::new(vec![1, 2], 2, 0, SourceKind::Rss, vec![]);
        assert!(full.success);
        assert!(full.errors.is_none());
    }

    #[test]
    fn enriched_candidate_serializes_flat_camel_case() {
        let c = Candidate::new("t", "s", "https://x.example/a", ts(), "src", None).unwrap();
        let mut e = EnrichedCandidate::unenriched(c);
        e.body_text = Some("body".into());
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["title"], "t");
        assert_eq!(json["sourceName"], "src");
        assert_eq!(json["bodyText"], "body");
        assert!(json.get("candidate").is_none());
        assert!(json.get("pageTitle").is_none());
    }

    #[test]
    fn source_kind_uses_screaming_case() {
        assert_eq!(
            serde_json::to_string(&SourceKind::GoogleNews).unwrap(),
            "\"GOOGLE_NEWS\""
        );
    }
}
