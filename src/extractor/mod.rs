//! Full-text extraction through the pooled browser.
//!
//! For each candidate the extractor opens a pooled page, navigates with a
//! timeout, lets client-side scripts settle, strips non-content elements
//! and tries the article selectors in priority order. Whatever happens, the
//! page is closed and its pool slot returned.
//!
//! # Failure model
//!
//! A page that cannot be loaded or has no recognizable article body leaves
//! the candidate unenriched (`body_text == None`). Only a failure to launch
//! the browser is returned as an error, because no later page can succeed
//! either.

pub mod html;
pub mod noise;

use crate::browser::{PooledPage, SessionManager};
use crate::error::{BrowserError, SelectorError};
use crate::models::{Candidate, EnrichedCandidate};
use html::{ArticleText, SelectorList, extract_article_text, extract_description, extract_title, strip_elements};
use scraper::Html;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Visit candidates one after another, or all at once bounded by the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    #[default]
    Sequential,
    Parallel,
}

/// Timing and acceptance knobs for [`ContentExtractor`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractorOptions {
    pub page_load_timeout: Duration,
    /// Wait after navigation for dynamic content.
    pub settle_delay: Duration,
    /// Pause between items in sequential mode.
    pub request_delay: Duration,
    /// Extracted text must be longer than this many characters.
    pub min_content_length: usize,
    pub mode: ExtractionMode,
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        Self {
            page_load_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_secs(2),
            request_delay: Duration::from_secs(1),
            min_content_length: 100,
            mode: ExtractionMode::Sequential,
        }
    }
}

/// Selectors tried before the generic list for one domain and its subdomains.
#[derive(Debug, Clone)]
pub struct SiteSelectors {
    pub domain: String,
    pub selectors: SelectorList,
}

impl SiteSelectors {
    fn matches(&self, host: &str) -> bool {
        host == self.domain || host.ends_with(&format!(".{}", self.domain))
    }
}

/// Everything learned from one loaded page.
struct PageArticle {
    article: ArticleText,
    title: Option<String>,
    description: Option<String>,
}

pub struct ContentExtractor {
    session: Arc<SessionManager>,
    options: ExtractorOptions,
    strip: SelectorList,
    selectors: SelectorList,
    site_selectors: Vec<SiteSelectors>,
}

impl ContentExtractor {
    /// Create an extractor using the built-in strip and article selectors.
    ///
    /// # Errors
    ///
    /// [`SelectorError`] if a built-in selector fails to compile.
    pub fn new(session: Arc<SessionManager>, options: ExtractorOptions) -> Result<Self, SelectorError> {
        Ok(Self::with_selectors(
            session,
            options,
            SelectorList::parse(&html::DEFAULT_STRIP_SELECTORS)?,
            SelectorList::parse(&html::DEFAULT_ARTICLE_SELECTORS)?,
            Vec::new(),
        ))
    }

    pub fn with_selectors(
        session: Arc<SessionManager>,
        options: ExtractorOptions,
        strip: SelectorList,
        selectors: SelectorList,
        site_selectors: Vec<SiteSelectors>,
    ) -> Self {
        Self {
            session,
            options,
            strip,
            selectors,
            site_selectors,
        }
    }

    pub fn options(&self) -> &ExtractorOptions {
        &self.options
    }

    fn selector_lists(&self, url: &str) -> Vec<&SelectorList> {
        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase));
        let mut lists: Vec<&SelectorList> = match host {
            Some(host) => self
                .site_selectors
                .iter()
                .filter(|site| site.matches(&host))
                .map(|site| &site.selectors)
                .collect(),
            None => Vec::new(),
        };
        lists.push(&self.selectors);
        lists
    }

    fn analyze(&self, url: &str, page_html: &str) -> Option<PageArticle> {
        let mut document = Html::parse_document(page_html);
        let title = extract_title(&document);
        let description = extract_description(&document);
        strip_elements(&mut document, &self.strip);
        let article = self
            .selector_lists(url)
            .into_iter()
            .find_map(|list| extract_article_text(&document, list, self.options.min_content_length))?;
        Some(PageArticle {
            article,
            title,
            description,
        })
    }

    async fn load(&self, page: &mut PooledPage, url: &str) -> Result<String, BrowserError> {
        page.goto(url, self.options.page_load_timeout).await?;
        page.wait_for_timeout(self.options.settle_delay).await?;
        page.content().await
    }

    /// Visit one candidate's page and attach its body text.
    ///
    /// # Errors
    ///
    /// Only fatal browser errors (launch failure). Everything else yields the
    /// candidate unchanged with `body_text == None`.
    #[instrument(level = "info", skip_all, fields(url = %candidate.url))]
    pub async fn extract_content(&self, candidate: Candidate) -> Result<EnrichedCandidate, BrowserError> {
        let t0 = Instant::now();
        let mut page = match self.session.new_page().await {
            Ok(page) => page,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(error = %e, "Could not open page; leaving candidate unenriched");
                return Ok(EnrichedCandidate::unenriched(candidate));
            }
        };

        let loaded = self.load(&mut page, &candidate.url).await;
        if let Err(e) = page.close().await {
            debug!(error = %e, "Page close failed");
        }

        let page_html = match loaded {
            Ok(page_html) => page_html,
            Err(e) => {
                warn!(error = %e, "Page load failed; leaving candidate unenriched");
                return Ok(EnrichedCandidate::unenriched(candidate));
            }
        };

        let Some(found) = self.analyze(&candidate.url, &page_html) else {
            info!(
                html_bytes = page_html.len(),
                "No selector produced enough text; leaving candidate unenriched"
            );
            return Ok(EnrichedCandidate::unenriched(candidate));
        };

        info!(
            selector = %found.article.selector,
            chars = found.article.text.chars().count(),
            elapsed_ms = t0.elapsed().as_millis(),
            "Extracted article body"
        );
        Ok(EnrichedCandidate {
            candidate,
            body_text: Some(found.article.text),
            page_title: found.title,
            page_description: found.description,
        })
    }

    /// Extract every candidate and keep only those that got a body, in input
    /// order.
    ///
    /// Sequential mode pauses `request_delay` between items. Parallel mode
    /// starts all extractions together and relies on the page pool for
    /// back-pressure.
    #[instrument(level = "info", skip_all, fields(count = candidates.len(), mode = ?self.options.mode))]
    pub async fn extract_multiple(&self, candidates: Vec<Candidate>) -> Result<Vec<EnrichedCandidate>, BrowserError> {
        let total = candidates.len();
        let enriched = match self.options.mode {
            ExtractionMode::Sequential => {
                let mut out = Vec::with_capacity(total);
                for (i, candidate) in candidates.into_iter().enumerate() {
                    if i > 0 {
                        sleep(self.options.request_delay).await;
                    }
                    out.push(self.extract_content(candidate).await?);
                }
                out
            }
            ExtractionMode::Parallel => {
                futures::future::join_all(candidates.into_iter().map(|c| self.extract_content(c)))
                    .await
                    .into_iter()
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        let kept: Vec<EnrichedCandidate> = enriched.into_iter().filter(EnrichedCandidate::has_body).collect();
        info!(total, extracted = kept.len(), "Content extraction finished");
        Ok(kept)
    }
}
