//! # Headline Harvester
//!
//! Collects the day's economic news, filters it for relevance with an LLM,
//! extracts full article text through a pooled headless Chromium, and writes
//! the curated set as JSON.
//!
//! ## Usage
//!
//! ```sh
//! headline_harvester -o ./runs -c harvest.yaml --llm-config ~/.config/aj/config.yaml
//! ```

use chrono::Duration;
use clap::Parser;
use awful_aj::{config as aj_config, config_dir, template};
use headline_harvester::api::{RetryAsk, TemplateAsk};
use headline_harvester::browser::SessionManager;
use headline_harvester::browser::chromium::ChromiumLauncher;
use headline_harvester::classifier::{LlmRelevanceClassifier, LlmStructuredGenerator};
use headline_harvester::cli::Cli;
use headline_harvester::collector::google_news::GoogleNewsSource;
use headline_harvester::collector::rss::{RssFeedSource, feed_client};
use headline_harvester::collector::{FeedSource, MetadataCollector};
use headline_harvester::config::HarvestConfig;
use headline_harvester::extractor::noise::NoiseStripper;
use headline_harvester::extractor::{ContentExtractor, ExtractionMode};
use headline_harvester::filter::RelevanceFilter;
use headline_harvester::models::{CollectionResult, EnrichedCandidate, TimeWindow};
use headline_harvester::outputs::json::{write_collection, write_script};
use headline_harvester::pipeline::AcquisitionPipeline;
use headline_harvester::pool::SlotPool;
use headline_harvester::script::{SCRIPT_ITEM_RANGE, ScriptDrafter};
use headline_harvester::utils::{KST_OFFSET_HOURS, ensure_writable_dir, time_of_day, today_news_window};
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = Instant::now();
    info!("headline_harvester starting up");

    let args = Cli::parse();
    debug!(?args.output_dir, ?args.config, parallel = args.parallel, "Parsed CLI arguments");

    // Early check: ensure output dir is writable
    if let Err(e) = ensure_writable_dir(&args.output_dir).await {
        error!(
            path = %args.output_dir,
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    // ---- Load config ----
    let mut config = match &args.config {
        Some(path) => HarvestConfig::load(path)?,
        None => {
            info!("No config file given; using defaults");
            HarvestConfig::from_yaml("")?
        }
    };
    if args.parallel {
        config.extractor.mode = ExtractionMode::Parallel;
    }

    let window = match (args.start, args.end) {
        (Some(start), Some(end)) => TimeWindow::new(start, end),
        _ => today_news_window(),
    };
    if window.start > window.end {
        error!(start = %window.start, end = %window.end, "Window start is after its end");
        return Err("--start must not be after --end".into());
    }
    info!(start = %window.start, end = %window.end, "Collection window");

    // ---- Wire components ----
    let feeds_http = feed_client(
        &config.collector.user_agent,
        std::time::Duration::from_secs(config.collector.request_timeout_secs),
    )?;
    let mut sources: Vec<Arc<dyn FeedSource>> = Vec::new();
    if !config.google_news.keywords.is_empty() {
        sources.push(Arc::new(GoogleNewsSource::new(config.google_news.clone(), feeds_http.clone())));
    }
    for feed in &config.feeds {
        sources.push(Arc::new(RssFeedSource::new(feed.clone(), feeds_http.clone())));
    }
    let collector = MetadataCollector::new(sources, config.collector_options());

    // ---- Load LLM config & templates ----
    let aj_config_path = match config.llm_config_path(args.llm_config.as_deref()) {
        Some(path) => path,
        None => config_dir()?
            .join("config.yaml")
            .to_str()
            .ok_or("awful_aj config path is not valid UTF-8")?
            .to_string(),
    };
    let llm_config = Arc::new(aj_config::load_config(&aj_config_path)?);
    info!(config_path = %aj_config_path, "Loaded LLM configuration");
    let title_template = template::load_template(&config.llm.title_template).await?;
    let content_template = template::load_template(&config.llm.content_template).await?;
    info!(
        title = %config.llm.title_template,
        content = %config.llm.content_template,
        "Loaded filter templates"
    );

    let transport_retry = config.transport_retry_policy();
    let classifier = LlmRelevanceClassifier::new(
        RetryAsk::new(
            TemplateAsk::new(Arc::clone(&llm_config), title_template),
            transport_retry.clone(),
        ),
        RetryAsk::new(
            TemplateAsk::new(Arc::clone(&llm_config), content_template),
            transport_retry.clone(),
        ),
    );
    let relevance = RelevanceFilter::new(Arc::new(classifier), config.filter_options());

    let pool = SlotPool::new(config.browser.max_pages)?;
    let launcher = Arc::new(ChromiumLauncher::new(config.browser.chromium.clone()));
    let session = Arc::new(SessionManager::new(launcher, pool, config.browser.user_agent.clone()));
    let (strip, article_selectors, site_selectors) = config.selector_lists()?;
    let extractor = ContentExtractor::with_selectors(
        Arc::clone(&session),
        config.extractor_options(),
        strip,
        article_selectors,
        site_selectors,
    );

    let pipeline = AcquisitionPipeline::new(collector, relevance, extractor, Arc::clone(&session))
        .with_dedup_threshold(config.dedup.threshold);

    // ---- Run ----
    let outcome = pipeline.run(&window).await;
    if let Err(e) = session.close().await {
        warn!(error = %e, "Browser shutdown failed");
    }
    let result = match outcome {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "Acquisition run failed");
            return Err(e.into());
        }
    };
    info!(
        success = result.success,
        items = result.items.len(),
        total_collected = result.total_collected,
        duplicates_removed = result.duplicates_removed,
        errors = result.errors.as_ref().map_or(0, Vec::len),
        "Acquisition run complete"
    );

    // ---- Write output ----
    let output_dir = Path::new(&args.output_dir);
    let date = (window.start + Duration::hours(KST_OFFSET_HOURS)).date_naive();
    let edition = time_of_day();
    write_collection(&result, output_dir, date, &edition).await?;

    if args.script || config.script.enabled {
        let script_template = template::load_template(&config.llm.script_template).await?;
        let generator = LlmStructuredGenerator::new(RetryAsk::new(
            TemplateAsk::new(Arc::clone(&llm_config), script_template),
            transport_retry,
        ));
        let drafter = ScriptDrafter::new(
            Arc::new(generator),
            config.script_options(),
            NoiseStripper::new(config.filter.excerpt.clone()),
        );
        draft_script(&drafter, &result, output_dir, date, &edition).await;
    }

    info!(elapsed_ms = start_time.elapsed().as_millis(), "headline_harvester finished");
    Ok(())
}

/// Draft and write a script when the run produced a usable number of items.
/// Failures are logged; the run result is already on disk.
async fn draft_script(
    drafter: &ScriptDrafter,
    result: &CollectionResult<EnrichedCandidate>,
    output_dir: &Path,
    date: chrono::NaiveDate,
    edition: &str,
) {
    let items: Vec<EnrichedCandidate> = result
        .items
        .iter()
        .take(*SCRIPT_ITEM_RANGE.end())
        .cloned()
        .collect();
    if items.len() < *SCRIPT_ITEM_RANGE.start() {
        warn!(items = items.len(), "Too few curated items for a script; skipping");
        return;
    }
    match drafter.draft(&items).await {
        Ok(draft) => {
            if let Err(e) = write_script(&draft, output_dir, date, edition).await {
                error!(error = %e, "Failed to write script");
            }
        }
        Err(e) => error!(error = %e, "Script drafting failed"),
    }
}
