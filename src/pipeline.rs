//! The acquisition run: collect, dedup, filter titles, extract, filter bodies.
//!
//! Only a browser that cannot be started aborts a run. Feed failures end up
//! in the result's `errors`, extraction failures drop the affected article,
//! and classifier failures fall back to a prefix of the input.

use crate::browser::SessionManager;
use crate::collector::MetadataCollector;
use crate::dedup::{DEFAULT_THRESHOLD, suppress_near_duplicates};
use crate::error::PipelineError;
use crate::extractor::ContentExtractor;
use crate::filter::RelevanceFilter;
use crate::models::{CollectionResult, EnrichedCandidate, TimeWindow};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

pub struct AcquisitionPipeline {
    collector: MetadataCollector,
    filter: RelevanceFilter,
    extractor: ContentExtractor,
    session: Arc<SessionManager>,
    dedup_threshold: f64,
}

impl AcquisitionPipeline {
    /// `session` must be the session `extractor` was built with; the
    /// pipeline uses it only to report page usage.
    pub fn new(
        collector: MetadataCollector,
        filter: RelevanceFilter,
        extractor: ContentExtractor,
        session: Arc<SessionManager>,
    ) -> Self {
        Self {
            collector,
            filter,
            extractor,
            session,
            dedup_threshold: DEFAULT_THRESHOLD,
        }
    }

    /// Titles at least this similar are treated as the same story.
    pub fn with_dedup_threshold(mut self, threshold: f64) -> Self {
        self.dedup_threshold = threshold;
        self
    }

    /// Run one acquisition over `window`.
    ///
    /// `total_collected` is the number of candidates left after URL
    /// deduplication; `duplicates_removed` counts URL duplicates plus
    /// near-duplicate titles. The browser is never started when collection
    /// finds nothing.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Browser`] when the browser cannot be launched.
    #[instrument(level = "info", skip_all, fields(start = %window.start, end = %window.end))]
    pub async fn run(&self, window: &TimeWindow) -> Result<CollectionResult<EnrichedCandidate>, PipelineError> {
        let t0 = Instant::now();

        let collected = self.collector.collect_metadata(window).await;
        let source = collected.source;
        let total_collected = collected.total_collected;
        let mut duplicates = collected.duplicates_removed;
        let mut errors = collected.errors.unwrap_or_default();

        if collected.items.is_empty() {
            warn!("Nothing collected; skipping extraction");
            return Ok(CollectionResult::new(
                Vec::new(),
                total_collected,
                duplicates,
                source,
                errors,
            ));
        }

        let (distinct, near_duplicates) = suppress_near_duplicates(collected.items, self.dedup_threshold);
        duplicates += near_duplicates;

        let shortlisted = self.filter.filter_titles(distinct).await;
        info!(shortlisted = shortlisted.len(), "Title filter done");

        let enriched = self.extractor.extract_multiple(shortlisted).await?;
        if enriched.is_empty() {
            errors.push("No article body could be extracted from the shortlisted candidates".to_string());
        }

        let curated = self.filter.filter_contents(enriched).await;
        info!(
            total_collected,
            duplicates_removed = duplicates,
            curated = curated.len(),
            pages_in_use = self.session.active_pages(),
            elapsed_ms = t0.elapsed().as_millis(),
            "Acquisition run finished"
        );

        Ok(CollectionResult::new(curated, total_collected, duplicates, source, errors))
    }
}
