//! JSON output of run results.
//!
//! Files are organized by date, one per time-of-day edition:
//! `{output_dir}/{YYYY-MM-DD}/{time_of_day}.json`.

use crate::models::{CollectionResult, EnrichedCandidate};
use crate::script::ScriptDraft;
use chrono::NaiveDate;
use serde::Serialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// Serialize `value` to `{output_dir}/{date}/{file_stem}.json`, creating the
/// date directory when needed.
///
/// # Returns
///
/// The path written.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.display(), file_stem))]
pub async fn write_json<T: Serialize>(
    value: &T,
    output_dir: &Path,
    date: NaiveDate,
    file_stem: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(value)?;

    let full_dir = output_dir.join(date.format("%Y-%m-%d").to_string());
    if let Err(e) = fs::create_dir_all(&full_dir).await {
        error!(dir = %full_dir.display(), error = %e, "Failed to create output dir");
        return Err(e.into());
    }

    let path = full_dir.join(format!("{file_stem}.json"));
    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote JSON file");
    Ok(path)
}

/// Write a run result as `{date}/{time_of_day}.json`.
pub async fn write_collection(
    result: &CollectionResult<EnrichedCandidate>,
    output_dir: &Path,
    date: NaiveDate,
    time_of_day: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    write_json(result, output_dir, date, time_of_day).await
}

/// Write a drafted script next to its run result as `{time_of_day}_script.json`.
pub async fn write_script(
    draft: &ScriptDraft,
    output_dir: &Path,
    date: NaiveDate,
    time_of_day: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    write_json(draft, output_dir, date, &format!("{time_of_day}_script")).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candidate, SourceKind};
    use chrono::Utc;

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("headline_harvester_{name}_{}", std::process::id()))
    }

    #[tokio::test]
    async fn collection_lands_under_date_and_edition() {
        let dir = scratch_dir("collection");
        let candidate = Candidate::new(
            "기준금리 동결",
            "요약",
            "https://news.example/1",
            Utc::now(),
            "연합뉴스",
            None,
        )
        .unwrap();
        let result = CollectionResult::new(
            vec![EnrichedCandidate {
                body_text: Some("본문".into()),
                ..EnrichedCandidate::unenriched(candidate)
            }],
            3,
            1,
            SourceKind::GoogleNews,
            Vec::new(),
        );
        let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();

        let path = write_collection(&result, &dir, date, "morning").await.unwrap();
        assert_eq!(path, dir.join("2025-03-14").join("morning.json"));

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["success"], true);
        assert_eq!(written["totalCollected"], 3);
        assert_eq!(written["duplicatesRemoved"], 1);
        assert_eq!(written["source"], "GOOGLE_NEWS");
        assert_eq!(written["items"][0]["sourceName"], "연합뉴스");
        assert_eq!(written["items"][0]["bodyText"], "본문");
        assert!(written.get("errors").is_none());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
