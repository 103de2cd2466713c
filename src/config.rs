//! YAML configuration.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) yields a working configuration. Durations are written as plain
//! integers with the unit in the key name (`query_delay_ms`,
//! `page_load_timeout_secs`).
//!
//! ```yaml
//! google_news:
//!   keywords: [금리, 환율]
//! feeds:
//!   - name: 조선일보
//!     url: https://www.chosun.com/arc/outboundfeeds/rss/category/economy/
//! browser:
//!   max_pages: 3
//! extractor:
//!   mode: parallel
//!   site_selectors:
//!     - domain: hankyung.com
//!       selectors: ["#articletxt"]
//! ```

use crate::browser::DEFAULT_USER_AGENT;
use crate::browser::chromium::ChromiumOptions;
use crate::collector::CollectorOptions;
use crate::collector::google_news::GoogleNewsConfig;
use crate::collector::rss::RssFeedConfig;
use crate::dedup::DEFAULT_THRESHOLD;
use crate::error::ConfigError;
use crate::extractor::html::{DEFAULT_ARTICLE_SELECTORS, DEFAULT_STRIP_SELECTORS, SelectorList};
use crate::extractor::noise::NormalizeOptions;
use crate::extractor::{ExtractionMode, ExtractorOptions, SiteSelectors};
use crate::filter::FilterOptions;
use crate::retry::RetryPolicy;
use crate::script::ScriptOptions;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub google_news: GoogleNewsConfig,
    pub feeds: Vec<RssFeedConfig>,
    pub collector: CollectorSection,
    pub browser: BrowserSection,
    pub extractor: ExtractorSection,
    pub filter: FilterSection,
    pub retry: RetrySection,
    pub dedup: DedupSection,
    pub llm: LlmSection,
    pub script: ScriptSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CollectorSection {
    pub query_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for CollectorSection {
    fn default() -> Self {
        Self {
            query_delay_ms: 1000,
            request_timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BrowserSection {
    /// Pages open at the same time.
    pub max_pages: usize,
    pub user_agent: String,
    pub chromium: ChromiumOptions,
}

impl Default for BrowserSection {
    fn default() -> Self {
        Self {
            max_pages: crate::browser::DEFAULT_MAX_PAGES,
            user_agent: DEFAULT_USER_AGENT.into(),
            chromium: ChromiumOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SiteSelectorConfig {
    pub domain: String,
    pub selectors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExtractorSection {
    pub page_load_timeout_secs: u64,
    pub settle_delay_ms: u64,
    pub request_delay_ms: u64,
    pub min_content_length: usize,
    pub mode: ExtractionMode,
    pub strip_selectors: Vec<String>,
    pub article_selectors: Vec<String>,
    pub site_selectors: Vec<SiteSelectorConfig>,
}

impl Default for ExtractorSection {
    fn default() -> Self {
        Self {
            page_load_timeout_secs: 30,
            settle_delay_ms: 2000,
            request_delay_ms: 1000,
            min_content_length: 100,
            mode: ExtractionMode::Sequential,
            strip_selectors: DEFAULT_STRIP_SELECTORS.iter().map(|s| s.to_string()).collect(),
            article_selectors: DEFAULT_ARTICLE_SELECTORS.iter().map(|s| s.to_string()).collect(),
            site_selectors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FilterSection {
    pub title_keep: usize,
    pub content_keep: usize,
    pub call_timeout_secs: u64,
    pub excerpt: NormalizeOptions,
}

impl Default for FilterSection {
    fn default() -> Self {
        Self {
            title_keep: 15,
            content_keep: 5,
            call_timeout_secs: 60,
            excerpt: NormalizeOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    /// `null` disables the cap.
    pub max_delay_ms: Option<u64>,
    pub jitter_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 1000,
            multiplier: 2.0,
            max_delay_ms: Some(30_000),
            jitter_ms: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DedupSection {
    pub threshold: f64,
}

impl Default for DedupSection {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// `awful_aj` config file (endpoint, key, model). Defaults to
    /// `config.yaml` in the `awful_aj` config directory.
    pub aj_config: Option<String>,
    /// `awful_aj` template names. Each template carries its system prompt.
    pub title_template: String,
    pub content_template: String,
    pub script_template: String,
    /// Retries for failed LLM requests, below the whole-call retry policy.
    pub transport_retries: u32,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            aj_config: None,
            title_template: "headline_title_filter".into(),
            content_template: "headline_content_filter".into(),
            script_template: "headline_script".into(),
            transport_retries: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ScriptSection {
    /// Draft a script from the curated items after each run.
    pub enabled: bool,
    pub call_timeout_secs: u64,
    pub instructions: String,
}

impl Default for ScriptSection {
    fn default() -> Self {
        let defaults = ScriptOptions::default();
        Self {
            enabled: false,
            call_timeout_secs: defaults.call_timeout.as_secs(),
            instructions: defaults.instructions,
        }
    }
}

impl HarvestConfig {
    /// Read and validate a YAML config file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] when the file cannot be read, [`ConfigError::Yaml`]
    /// when it does not parse, [`ConfigError::Invalid`] when validation fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_yaml(&raw)?;
        info!(path = %path.display(), feeds = config.feeds.len(), "Loaded configuration");
        Ok(config)
    }

    /// Parse and validate YAML text. An empty document is the default config.
    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = if raw.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(raw)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no run could work with.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        if self.browser.max_pages == 0 {
            return invalid("browser.max_pages must be at least 1".into());
        }
        if self.extractor.article_selectors.is_empty() {
            return invalid("extractor.article_selectors must not be empty".into());
        }
        if self.google_news.keywords.is_empty() && self.feeds.is_empty() {
            return invalid("configure google_news.keywords or at least one feed".into());
        }
        if !(0.0..=1.0).contains(&self.dedup.threshold) {
            return invalid(format!("dedup.threshold {} is outside [0, 1]", self.dedup.threshold));
        }
        if self.retry.multiplier < 1.0 {
            return invalid(format!("retry.multiplier {} must be at least 1", self.retry.multiplier));
        }
        if let Some(site) = self.extractor.site_selectors.iter().find(|s| s.domain.trim().is_empty()) {
            return invalid(format!("site selectors {:?} have no domain", site.selectors));
        }
        Ok(())
    }

    pub fn collector_options(&self) -> CollectorOptions {
        CollectorOptions {
            query_delay: Duration::from_millis(self.collector.query_delay_ms),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry.max_retries,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            multiplier: self.retry.multiplier,
            max_delay: self.retry.max_delay_ms.map(Duration::from_millis),
            jitter: Duration::from_millis(self.retry.jitter_ms),
        }
    }

    /// Policy for transport-level retries: the whole-call schedule with
    /// its own retry count.
    pub fn transport_retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.llm.transport_retries,
            ..self.retry_policy()
        }
    }

    pub fn extractor_options(&self) -> ExtractorOptions {
        let e = &self.extractor;
        ExtractorOptions {
            page_load_timeout: Duration::from_secs(e.page_load_timeout_secs),
            settle_delay: Duration::from_millis(e.settle_delay_ms),
            request_delay: Duration::from_millis(e.request_delay_ms),
            min_content_length: e.min_content_length,
            mode: e.mode,
        }
    }

    /// Compiled strip list, generic article selectors and per-site selectors.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Selector`] naming a selector that does not parse.
    pub fn selector_lists(&self) -> Result<(SelectorList, SelectorList, Vec<SiteSelectors>), ConfigError> {
        let e = &self.extractor;
        let strip = SelectorList::parse(&e.strip_selectors)?;
        let article = SelectorList::parse(&e.article_selectors)?;
        let sites = e
            .site_selectors
            .iter()
            .map(|site| {
                Ok(SiteSelectors {
                    domain: site.domain.trim().to_ascii_lowercase(),
                    selectors: SelectorList::parse(&site.selectors)?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok((strip, article, sites))
    }

    pub fn filter_options(&self) -> FilterOptions {
        FilterOptions {
            title_keep: self.filter.title_keep,
            content_keep: self.filter.content_keep,
            call_timeout: Duration::from_secs(self.filter.call_timeout_secs),
            retry: self.retry_policy(),
            excerpt: self.filter.excerpt.clone(),
        }
    }

    pub fn script_options(&self) -> ScriptOptions {
        ScriptOptions {
            instructions: self.script.instructions.clone(),
            call_timeout: Duration::from_secs(self.script.call_timeout_secs),
            retry: self.retry_policy(),
        }
    }

    /// Path of the `awful_aj` config file: the CLI/env value wins over the
    /// file setting. `None` means the `awful_aj` default location.
    pub fn llm_config_path(&self, cli: Option<&str>) -> Option<String> {
        cli.map(str::to_string).or_else(|| self.llm.aj_config.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_the_default() {
        let config = HarvestConfig::from_yaml("").unwrap();
        assert_eq!(config.browser.max_pages, 5);
        assert_eq!(config.filter.title_keep, 15);
        assert_eq!(config.filter.content_keep, 5);
        assert_eq!(config.extractor.article_selectors.len(), 12);
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.extractor_options(), ExtractorOptions::default());
        assert_eq!(config.collector_options(), CollectorOptions::default());
        assert_eq!(config.google_news.language, "ko");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let yaml = r##"
google_news:
  keywords: [금리]
feeds:
  - name: 조선일보
    url: https://www.chosun.com/rss/economy
    category: 경제
browser:
  max_pages: 2
extractor:
  mode: parallel
  settle_delay_ms: 500
  site_selectors:
    - domain: Hankyung.com
      selectors: ["#articletxt", ".article-body"]
retry:
  max_delay_ms: null
  jitter_ms: 250
"##;
        let config = HarvestConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.google_news.keywords, ["금리"]);
        assert_eq!(config.google_news.region, "KR");
        assert_eq!(config.feeds[0].category.as_deref(), Some("경제"));
        assert_eq!(config.browser.max_pages, 2);

        let opts = config.extractor_options();
        assert_eq!(opts.mode, ExtractionMode::Parallel);
        assert_eq!(opts.settle_delay, Duration::from_millis(500));
        assert_eq!(opts.page_load_timeout, Duration::from_secs(30));

        let policy = config.retry_policy();
        assert_eq!(policy.max_delay, None);
        assert_eq!(policy.jitter, Duration::from_millis(250));

        let (strip, article, sites) = config.selector_lists().unwrap();
        assert_eq!(strip.len(), 10);
        assert_eq!(article.len(), 12);
        assert_eq!(sites[0].domain, "hankyung.com");
        assert_eq!(sites[0].selectors.len(), 2);
    }

    #[test]
    fn zero_pages_is_rejected() {
        let err = HarvestConfig::from_yaml("browser:\n  max_pages: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("max_pages")));
    }

    #[test]
    fn empty_selector_list_is_rejected() {
        let err = HarvestConfig::from_yaml("extractor:\n  article_selectors: []\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn bad_selector_is_reported_when_compiling() {
        let config = HarvestConfig::from_yaml("extractor:\n  article_selectors: ['div[[']\n").unwrap();
        match config.selector_lists() {
            Err(ConfigError::Selector(e)) => assert_eq!(e.selector, "div[["),
            other => panic!("expected a selector error, got {other:?}"),
        }
    }

    #[test]
    fn cli_overrides_llm_config_path() {
        let config = HarvestConfig::from_yaml("llm:\n  aj_config: /etc/aj/config.yaml\n  title_template: titles\n").unwrap();
        assert_eq!(config.llm.title_template, "titles");
        assert_eq!(config.llm.content_template, "headline_content_filter");
        assert_eq!(config.llm_config_path(None).as_deref(), Some("/etc/aj/config.yaml"));
        assert_eq!(config.llm_config_path(Some("local.yaml")).as_deref(), Some("local.yaml"));
        assert_eq!(HarvestConfig::default().llm_config_path(None), None);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = HarvestConfig::load("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn malformed_yaml_is_a_yaml_error() {
        assert!(matches!(
            HarvestConfig::from_yaml("browser: [unclosed"),
            Err(ConfigError::Yaml(_))
        ));
    }
}
