//! Google News keyword search over its RSS endpoint.
//!
//! Each configured keyword becomes one query against
//! `https://news.google.com/rss/search`. Google News titles carry the
//! publisher as a ` - Publisher` suffix, which becomes the source name.

use super::rss::{fetch_feed_xml, parse_feed};
use super::{FeedQuery, FeedSource, RawFeedEntry};
use crate::error::CollectError;
use crate::models::SourceKind;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

pub const GOOGLE_NEWS_SEARCH_URL: &str = "https://news.google.com/rss/search";

/// Used when the title does not name the publisher.
pub const FALLBACK_SOURCE_NAME: &str = "Google News";

static TITLE_SOURCE_SUFFIX: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r" - ([^-]+)$").ok());

/// Keyword search settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GoogleNewsConfig {
    pub keywords: Vec<String>,
    /// Interface language, the `hl` parameter.
    pub language: String,
    /// Country edition, the `gl` parameter.
    pub region: String,
    /// Category assigned to every result.
    pub category: String,
    pub base_url: String,
}

impl Default for GoogleNewsConfig {
    fn default() -> Self {
        Self {
            keywords: ["경제", "금리", "환율", "물가", "부동산", "주식시장"]
                .into_iter()
                .map(String::from)
                .collect(),
            language: "ko".into(),
            region: "KR".into(),
            category: "경제".into(),
            base_url: GOOGLE_NEWS_SEARCH_URL.into(),
        }
    }
}

/// Publisher named by a trailing ` - Publisher` in a Google News title.
pub fn source_from_title(title: &str) -> Option<String> {
    TITLE_SOURCE_SUFFIX
        .as_ref()?
        .captures(title.trim_end())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

#[derive(Debug, Clone)]
pub struct GoogleNewsSource {
    config: GoogleNewsConfig,
    client: Client,
}

impl GoogleNewsSource {
    pub fn new(config: GoogleNewsConfig, client: Client) -> Self {
        Self { config, client }
    }

    /// Search URL for `query`, e.g. `...?q=%EA%B8%88%EB%A6%AC&hl=ko&gl=KR&ceid=KR:ko`.
    pub fn search_url(&self, query: &FeedQuery) -> String {
        let language = query.language.as_deref().unwrap_or(&self.config.language);
        let region = query.region.as_deref().unwrap_or(&self.config.region);
        format!(
            "{}?q={}&hl={}&gl={}&ceid={}",
            self.config.base_url,
            urlencoding::encode(&query.term),
            urlencoding::encode(language),
            urlencoding::encode(region),
            urlencoding::encode(&format!("{region}:{language}")),
        )
    }
}

#[async_trait]
impl FeedSource for GoogleNewsSource {
    fn name(&self) -> &str {
        "Google News"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::GoogleNews
    }

    fn queries(&self) -> Vec<FeedQuery> {
        self.config
            .keywords
            .iter()
            .map(|k| FeedQuery {
                term: k.clone(),
                language: Some(self.config.language.clone()),
                region: Some(self.config.region.clone()),
            })
            .collect()
    }

    #[instrument(level = "info", skip_all, fields(keyword = %query.term))]
    async fn fetch(&self, query: &FeedQuery) -> Result<Vec<RawFeedEntry>, CollectError> {
        let url = self.search_url(query);
        debug!(%url, "Searching Google News");
        let xml = fetch_feed_xml(&self.client, &url).await?;
        let mut entries = parse_feed(&xml)?;
        for entry in &mut entries {
            entry.source = Some(source_from_title(&entry.title).unwrap_or_else(|| FALLBACK_SOURCE_NAME.to_string()));
            entry.category = Some(self.config.category.clone());
        }
        debug!(count = entries.len(), "Parsed Google News results");
        Ok(entries)
    }
}
