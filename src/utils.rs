//! Utility functions for time windows, log-friendly strings, and output checks.
//!
//! This module provides helper functions used throughout the application:
//! - Edition naming and the default daily collection window
//! - Char-safe string truncation for logging
//! - JSON error detection for handling truncated LLM responses
//! - File system validation for output directories

use crate::models::TimeWindow;
use chrono::{Duration, Local, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

/// Offset of Korea Standard Time from UTC, in hours.
pub const KST_OFFSET_HOURS: i64 = 9;

/// Hour (KST) at which the daily news window closes.
pub const NEWS_WINDOW_END_HOUR: i64 = 22;

/// Classify a wall-clock time into morning, afternoon, or evening.
///
/// - **Morning**: 00:00 - 08:00
/// - **Afternoon**: 08:00 - 16:00
/// - **Evening**: 16:00 - 24:00
pub fn classify_time_of_day(tod: NaiveTime) -> &'static str {
    match tod.hour() {
        0..8 => "morning",
        8..16 => "afternoon",
        _ => "evening",
    }
}

/// Classify the current local time into morning, afternoon, or evening.
///
/// Used to name the JSON file a run writes.
#[instrument]
pub fn time_of_day() -> String {
    let tod = Local::now().time();
    let which = classify_time_of_day(tod);
    tracing::debug!(%tod, %which, "Computed time_of_day");
    which.to_string()
}

/// The daily news window for `date` in KST: 00:00 up to 22:00, as UTC.
pub fn news_window_for(date: NaiveDate) -> TimeWindow {
    let local_midnight = date.and_time(NaiveTime::default());
    let start = Utc.from_utc_datetime(&(local_midnight - Duration::hours(KST_OFFSET_HOURS)));
    TimeWindow::new(start, start + Duration::hours(NEWS_WINDOW_END_HOUR))
}

/// Today's news window, where "today" is the current date in KST.
pub fn today_news_window() -> TimeWindow {
    let today_kst = (Utc::now() + Duration::hours(KST_OFFSET_HOURS)).date_naive();
    news_window_for(today_kst)
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut after `max` characters with an ellipsis and a count
/// of the dropped bytes appended. Cuts always land on a char boundary, so
/// Korean text is safe to pass.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Detect if a serde_json error indicates truncated/incomplete JSON.
///
/// When the LLM response is cut off by its token limit, parsing fails with
/// an EOF error. Callers use this to tell truncation apart from a response
/// that is simply shaped wrong.
pub fn looks_truncated(e: &serde_json::Error) -> bool {
    use serde_json::error::Category;
    matches!(e.classify(), Category::Eof)
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then performs a write test by
/// creating and immediately deleting a scratch file.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let scratch_path = format!("{}/..__write_check__", path.trim_end_matches('/'));
    stdfs::File::create(&scratch_path)?;
    let _ = stdfs::remove_file(&scratch_path);
    info!("Output directory is writable");
    Ok(())
}
