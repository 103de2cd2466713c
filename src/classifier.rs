//! LLM-backed implementations of the relevance classifier and structured
//! generator seams.
//!
//! Both expect the model to answer with bare JSON. Markdown code fences
//! around the JSON are tolerated; anything else is a schema error, and a
//! reply that stops mid-document is reported as truncated so the caller's
//! retry can ask again.

use crate::api::AskAsync;
use crate::error::{ClassifierError, GeneratorError};
use crate::filter::{FilterRequest, FilterResponse, FilterStage, RelevanceClassifier};
use crate::script::StructuredGenerator;
use crate::utils::{looks_truncated, truncate_for_log};
use async_trait::async_trait;
use tracing::{debug, instrument, warn};

/// Remove a surrounding ```` ``` ```` / ```` ```json ```` fence, if any.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(nl) => &rest[nl + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Decode a classifier reply into selected items.
///
/// # Errors
///
/// [`ClassifierError::Truncated`] for a reply cut off mid-JSON and
/// [`ClassifierError::Schema`] for anything that is not an array of
/// `{id, title}` objects.
pub fn parse_selection(raw: &str) -> Result<FilterResponse, ClassifierError> {
    let json = strip_code_fences(raw);
    serde_json::from_str::<FilterResponse>(json).map_err(|e| {
        if looks_truncated(&e) {
            ClassifierError::Truncated
        } else {
            ClassifierError::Schema(e.to_string())
        }
    })
}

/// User message for a filter request: the instruction line followed by the
/// request as JSON.
pub fn render_request(request: &FilterRequest) -> Result<String, ClassifierError> {
    let payload = serde_json::to_string(request).map_err(|e| ClassifierError::Schema(e.to_string()))?;
    Ok(format!(
        "Select at most {} items. Answer only with a JSON array of {{\"id\": number, \"title\": string}}.\n{payload}",
        request.keep
    ))
}

/// Relevance classifier that asks an LLM, with one asker (and therefore one
/// system prompt) per filter stage.
pub struct LlmRelevanceClassifier<A> {
    titles: A,
    contents: A,
}

impl<A> LlmRelevanceClassifier<A>
where
    A: AskAsync<Response = String>,
{
    pub fn new(titles: A, contents: A) -> Self {
        Self { titles, contents }
    }
}

#[async_trait]
impl<A> RelevanceClassifier for LlmRelevanceClassifier<A>
where
    A: AskAsync<Response = String>,
{
    #[instrument(level = "info", skip_all, fields(stage = ?request.stage, items = request.items.len()))]
    async fn classify(&self, request: &FilterRequest) -> Result<FilterResponse, ClassifierError> {
        let asker = match request.stage {
            FilterStage::Title => &self.titles,
            FilterStage::Content => &self.contents,
        };
        let message = render_request(request)?;
        let reply = asker.ask(&message).await?;
        let selection = parse_selection(&reply);
        if let Err(e) = &selection {
            warn!(error = %e, reply = %truncate_for_log(&reply, 300), "Classifier reply rejected");
        }
        selection
    }
}

/// Structured generator that asks an LLM for a single JSON object.
pub struct LlmStructuredGenerator<A> {
    asker: A,
}

impl<A> LlmStructuredGenerator<A>
where
    A: AskAsync<Response = String>,
{
    pub fn new(asker: A) -> Self {
        Self { asker }
    }
}

#[async_trait]
impl<A> StructuredGenerator for LlmStructuredGenerator<A>
where
    A: AskAsync<Response = String>,
{
    #[instrument(level = "info", skip_all, fields(input_chars = input.chars().count()))]
    async fn generate(&self, input: &str) -> Result<serde_json::Value, GeneratorError> {
        let reply = self.asker.ask(input).await?;
        let json = strip_code_fences(&reply);
        let value: serde_json::Value = serde_json::from_str(json).map_err(|e| {
            let kind = if looks_truncated(&e) { "truncated" } else { "malformed" };
            GeneratorError::Schema(format!("{kind} json: {e}"))
        })?;
        if !value.is_object() {
            return Err(GeneratorError::Schema("expected a json object".into()));
        }
        debug!("Structured generation succeeded");
        Ok(value)
    }
}
