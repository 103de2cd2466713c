//! Drafting a short spoken script from the curated articles.
//!
//! The drafter turns 3 to 5 enriched articles into a context block, asks a
//! [`StructuredGenerator`] for a four-part script, and checks the answer
//! before combining it. Scoring the result is left to whoever consumes it.

use crate::error::GeneratorError;
use crate::extractor::noise::NoiseStripper;
use crate::models::EnrichedCandidate;
use crate::retry::{RetryPolicy, with_retry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{info, instrument};

/// Items a script may be built from.
pub const SCRIPT_ITEM_RANGE: RangeInclusive<usize> = 3..=5;

/// Korean narration pace used for duration estimates.
pub const CHARS_PER_SECOND: f64 = 4.5;

/// Produces one JSON object from free-form context.
#[async_trait]
pub trait StructuredGenerator: Send + Sync {
    async fn generate(&self, input: &str) -> Result<serde_json::Value, GeneratorError>;
}

/// The four parts of a script, in reading order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSections {
    pub hook: String,
    pub problem: String,
    pub impact: String,
    pub conclusion: String,
}

impl ScriptSections {
    fn parts(&self) -> [(&'static str, &str); 4] {
        [
            ("hook", self.hook.as_str()),
            ("problem", self.problem.as_str()),
            ("impact", self.impact.as_str()),
            ("conclusion", self.conclusion.as_str()),
        ]
    }

    /// # Errors
    ///
    /// [`GeneratorError::Schema`] naming the first blank section.
    pub fn validate(&self) -> Result<(), GeneratorError> {
        match self.parts().iter().find(|(_, text)| text.trim().is_empty()) {
            Some((name, _)) => Err(GeneratorError::Schema(format!("section {name} is empty"))),
            None => Ok(()),
        }
    }

    /// Sections joined with single spaces.
    pub fn combined(&self) -> String {
        self.parts().iter().map(|(_, text)| text.trim()).join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptMetadata {
    /// Seconds, rounded.
    pub estimated_duration: u64,
    pub character_count: usize,
    pub news_count: usize,
    pub generated_at: DateTime<Utc>,
    pub processing_time_ms: u128,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptDraft {
    pub script: String,
    pub sections: ScriptSections,
    pub metadata: ScriptMetadata,
}

/// Estimated narration time for `characters` characters.
pub fn estimate_duration_secs(characters: usize) -> u64 {
    (characters as f64 / CHARS_PER_SECOND).round() as u64
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptOptions {
    /// Text placed before the news context.
    pub instructions: String,
    pub call_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        Self {
            instructions: "Write a 45 second news short from the articles below. Answer only with a JSON object \
                           with the string fields hook, problem, impact and conclusion."
                .into(),
            call_timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }
}

pub struct ScriptDrafter {
    generator: Arc<dyn StructuredGenerator>,
    options: ScriptOptions,
    stripper: NoiseStripper,
}

impl ScriptDrafter {
    pub fn new(generator: Arc<dyn StructuredGenerator>, options: ScriptOptions, stripper: NoiseStripper) -> Self {
        Self {
            generator,
            options,
            stripper,
        }
    }

    /// One `[뉴스 n]` block per article: title, summary, cleaned body when
    /// present, source and publication date.
    pub fn build_context(&self, items: &[EnrichedCandidate]) -> String {
        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let c = &item.candidate;
                let mut block = format!("[뉴스 {}] {}\n- 요약: {}", i + 1, c.title, c.summary);
                if let Some(body) = item.body_text.as_deref() {
                    let cleaned = self.stripper.clean(body);
                    if !cleaned.is_empty() {
                        block.push_str(&format!("\n- 본문: {cleaned}"));
                    }
                }
                block.push_str(&format!(
                    "\n- 출처: {}\n- 발행: {}",
                    c.source_name,
                    c.published_at.format("%Y-%m-%d")
                ));
                block
            })
            .join("\n\n")
    }

    /// Draft a script from `items`.
    ///
    /// # Errors
    ///
    /// [`GeneratorError::InvalidInput`] unless there are 3 to 5 items, and
    /// the last generator error once retries are exhausted. A reply without
    /// the four non-empty sections counts as a failed attempt.
    #[instrument(level = "info", skip_all, fields(items = items.len()))]
    pub async fn draft(&self, items: &[EnrichedCandidate]) -> Result<ScriptDraft, GeneratorError> {
        if !SCRIPT_ITEM_RANGE.contains(&items.len()) {
            return Err(GeneratorError::InvalidInput(format!(
                "expected {} to {} news items, got {}",
                SCRIPT_ITEM_RANGE.start(),
                SCRIPT_ITEM_RANGE.end(),
                items.len()
            )));
        }

        let t0 = Instant::now();
        let prompt = format!("{}\n\n{}", self.options.instructions, self.build_context(items));
        let prompt = prompt.as_str();
        let generator = &self.generator;
        let call_timeout = self.options.call_timeout;

        let sections = with_retry(&self.options.retry, "draft script", || async move {
            let value = match timeout(call_timeout, generator.generate(prompt)).await {
                Ok(res) => res?,
                Err(_) => return Err(GeneratorError::Timeout(call_timeout)),
            };
            let sections: ScriptSections =
                serde_json::from_value(value).map_err(|e| GeneratorError::Schema(e.to_string()))?;
            sections.validate()?;
            Ok::<_, GeneratorError>(sections)
        })
        .await?;

        let script = sections.combined();
        let character_count = script.chars().count();
        let metadata = ScriptMetadata {
            estimated_duration: estimate_duration_secs(character_count),
            character_count,
            news_count: items.len(),
            generated_at: Utc::now(),
            processing_time_ms: t0.elapsed().as_millis(),
        };
        info!(
            characters = metadata.character_count,
            estimated_secs = metadata.estimated_duration,
            elapsed_ms = metadata.processing_time_ms,
            "Script drafted"
        );

        Ok(ScriptDraft {
            script,
            sections,
            metadata,
        })
    }
}
