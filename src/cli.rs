//! Command-line interface definitions for Headline Harvester.
//!
//! All arguments can be provided via command-line flags; the `awful_aj`
//! config path can also come from the environment.

use chrono::{DateTime, Utc};
use clap::Parser;

/// Command-line arguments for the Headline Harvester application.
///
/// # Examples
///
/// ```sh
/// # Today's window (00:00-22:00 KST) with defaults
/// headline_harvester -o ./runs
///
/// # Explicit window, config file, parallel extraction
/// headline_harvester -o ./runs -c harvest.yaml --parallel \
///     --start 2025-03-14T00:00:00+09:00 --end 2025-03-14T12:00:00+09:00
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Output directory for run results
    #[arg(short, long)]
    pub output_dir: String,

    /// Optional path to a YAML config file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Start of the publication window (RFC 3339)
    #[arg(long, requires = "end")]
    pub start: Option<DateTime<Utc>>,

    /// End of the publication window (RFC 3339)
    #[arg(long, requires = "start")]
    pub end: Option<DateTime<Utc>>,

    /// Extract all shortlisted pages at once, bounded by the page pool
    #[arg(long)]
    pub parallel: bool,

    /// Draft a script from the curated articles after the run
    #[arg(long)]
    pub script: bool,

    /// Path to the `awful_aj` config file (LLM endpoint, key and model)
    #[arg(long, env = "HARVEST_LLM_CONFIG")]
    pub llm_config: Option<String>,
}
