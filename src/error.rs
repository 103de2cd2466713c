//! Error types for every stage of the acquisition pipeline.
//!
//! Each component owns a small `thiserror` enum. Most of them never escape
//! their stage: feed failures become strings in the run result, extraction
//! failures leave a candidate unenriched, classifier failures trigger the
//! prefix fallback. Only [`PipelineError`] reaches the caller of a run.

use std::time::Duration;
use thiserror::Error;

/// Misuse of the slot pool.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("pool capacity must be at least 1")]
    ZeroCapacity,
    #[error("pool is closed")]
    Closed,
}

/// Failures raised by the headless browser layer.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// The browser process could not be started. Fatal for the run.
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("failed to create browsing context: {0}")]
    Context(String),
    #[error("failed to open page: {0}")]
    Page(String),
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("{what} timed out after {after:?}")]
    Timeout { what: String, after: Duration },
    #[error("failed to read page content: {0}")]
    Content(String),
    #[error(transparent)]
    Pool(#[from] PoolError),
}

impl BrowserError {
    /// Whether this error should abort the whole run rather than one page.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BrowserError::Launch(_))
    }
}

/// Failures fetching or parsing a feed.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("feed responded with status {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed feed: {0}")]
    Parse(String),
    #[error("invalid feed url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Failures asking the LLM.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The chat call itself failed (connection, rate limit, server error).
    #[error("llm request failed: {0}")]
    Backend(String),
    /// The call went through but the model said nothing.
    #[error("llm response contained no message content")]
    EmptyResponse,
}

impl LlmError {
    /// Worth asking again at the transport level.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Backend(_) => true,
            LlmError::EmptyResponse => false,
        }
    }
}

/// Failures of a relevance classification call.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("classifier call timed out after {0:?}")]
    Timeout(Duration),
    #[error("classifier response does not match the expected schema: {0}")]
    Schema(String),
    #[error("classifier response was truncated")]
    Truncated,
}

/// Failures of a structured generation call.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("generator call timed out after {0:?}")]
    Timeout(Duration),
    #[error("generator response does not match the expected schema: {0}")]
    Schema(String),
    #[error("invalid generator input: {0}")]
    InvalidInput(String),
}

/// A CSS selector that does not compile.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid selector {selector:?}: {reason}")]
pub struct SelectorError {
    pub selector: String,
    pub reason: String,
}

/// Failures loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error(transparent)]
    Selector(#[from] SelectorError),
}

/// The only failure a pipeline run returns instead of reporting in its result.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Browser(#[from] BrowserError),
}
