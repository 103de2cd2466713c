//! Metadata collection from news feeds.
//!
//! A [`MetadataCollector`] walks every configured [`FeedSource`] and every
//! query that source declares, strictly one request at a time with a fixed
//! pause in front of each. Entries are validated into [`Candidate`]s, kept
//! only when published inside the run's [`TimeWindow`], and deduplicated by
//! URL across all sources (first occurrence wins).
//!
//! A failing query never aborts collection: it is logged and recorded as a
//! message in the result's `errors`.

pub mod google_news;
pub mod rss;

use crate::error::CollectError;
use crate::models::{Candidate, CollectionResult, SourceKind, TimeWindow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// One request a feed source can serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedQuery {
    /// Search keyword, or the feed URL for fixed feeds.
    pub term: String,
    pub language: Option<String>,
    pub region: Option<String>,
}

impl FeedQuery {
    pub fn new(term: &str) -> Self {
        Self {
            term: term.to_string(),
            language: None,
            region: None,
        }
    }
}

/// A feed item as parsed, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFeedEntry {
    pub title: String,
    pub link: String,
    /// Publication date, or the update date when the feed gives only that.
    pub pub_date: Option<DateTime<Utc>>,
    /// Plain-text summary; markup already flattened.
    pub snippet: String,
    /// Publisher name, filled in by the feed source.
    pub source: Option<String>,
    pub category: Option<String>,
}

/// Something that turns a [`FeedQuery`] into raw feed entries.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Name used in logs and error messages.
    fn name(&self) -> &str;

    fn kind(&self) -> SourceKind;

    /// Queries to run for this source, in order.
    fn queries(&self) -> Vec<FeedQuery>;

    async fn fetch(&self, query: &FeedQuery) -> Result<Vec<RawFeedEntry>, CollectError>;
}

/// Validate a raw entry into a [`Candidate`].
///
/// A missing date means "now" (`fetched_at`). An empty snippet falls back to
/// the title so headline-only feeds still yield candidates. The source name falls back to
/// `default_source`.
///
/// # Returns
///
/// `None` when the entry cannot be a valid candidate.
pub fn entry_to_candidate(
    entry: &RawFeedEntry,
    default_source: &str,
    fetched_at: DateTime<Utc>,
) -> Option<Candidate> {
    let published_at = entry.pub_date.unwrap_or(fetched_at);
    let summary = if entry.snippet.trim().is_empty() {
        &entry.title
    } else {
        &entry.snippet
    };
    let source = entry
        .source
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_source);

    match Candidate::new(
        &entry.title,
        summary,
        &entry.link,
        published_at,
        source,
        entry.category.as_deref(),
    ) {
        Ok(candidate) => Some(candidate),
        Err(e) => {
            debug!(error = %e, link = %entry.link, "Skipping invalid entry");
            None
        }
    }
}

/// Collector pacing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorOptions {
    /// Pause before every feed request.
    pub query_delay: Duration,
}

impl Default for CollectorOptions {
    fn default() -> Self {
        Self {
            query_delay: Duration::from_secs(1),
        }
    }
}

pub struct MetadataCollector {
    sources: Vec<Arc<dyn FeedSource>>,
    options: CollectorOptions,
}

impl MetadataCollector {
    pub fn new(sources: Vec<Arc<dyn FeedSource>>, options: CollectorOptions) -> Self {
        Self { sources, options }
    }

    /// Kind reported for results: the shared kind of every source, or
    /// [`SourceKind::Mixed`].
    fn result_kind(&self) -> SourceKind {
        let mut kinds = self.sources.iter().map(|s| s.kind());
        match kinds.next() {
            Some(first) if kinds.all(|k| k == first) => first,
            _ => SourceKind::Mixed,
        }
    }

    /// Collect candidates published inside `window`.
    ///
    /// Queries run sequentially with `query_delay` before each one. Duplicate
    /// URLs are dropped and counted in `duplicates_removed`.
    ///
    /// # Returns
    ///
    /// A result whose `success` is `true` iff at least one candidate was kept.
    /// Per-query failures are listed in `errors` as
    /// `Failed to fetch <source> for query "<term>": <error>`.
    #[instrument(level = "info", skip_all, fields(sources = self.sources.len()))]
    pub async fn collect_metadata(&self, window: &TimeWindow) -> CollectionResult<Candidate> {
        let t0 = Instant::now();
        let mut seen: HashSet<String> = HashSet::new();
        let mut items = Vec::new();
        let mut duplicates = 0usize;
        let mut errors = Vec::new();

        for source in &self.sources {
            for query in source.queries() {
                sleep(self.options.query_delay).await;

                let entries = match source.fetch(&query).await {
                    Ok(entries) => entries,
                    Err(e) => {
                        let msg = format!(
                            "Failed to fetch {} for query \"{}\": {e}",
                            source.name(),
                            query.term
                        );
                        error!(source = source.name(), query = %query.term, error = %e, "Feed query failed");
                        errors.push(msg);
                        continue;
                    }
                };

                let fetched_at = Utc::now();
                let fetched = entries.len();
                let mut kept = 0usize;
                for candidate in entries
                    .iter()
                    .filter_map(|e| entry_to_candidate(e, source.name(), fetched_at))
                    .filter(|c| window.contains(c.published_at))
                {
                    if seen.insert(candidate.url.clone()) {
                        items.push(candidate);
                        kept += 1;
                    } else {
                        duplicates += 1;
                    }
                }
                debug!(
                    source = source.name(),
                    query = %query.term,
                    fetched,
                    kept,
                    "Feed query done"
                );
            }
        }

        if items.is_empty() {
            warn!(errors = errors.len(), "No candidates collected");
        }
        info!(
            total = items.len(),
            duplicates_removed = duplicates,
            errors = errors.len(),
            elapsed_ms = t0.elapsed().as_millis(),
            "Metadata collection finished"
        );

        let total = items.len();
        CollectionResult::new(items, total, duplicates, self.result_kind(), errors)
    }
}
