//! LLM interaction through `awful_aj`.
//!
//! # Architecture
//!
//! - [`AskAsync`]: core trait, send one user message and get the reply text
//! - [`TemplateAsk`]: wraps `awful_aj::api::ask` with a config and one chat
//!   template (the template carries the system prompt)
//! - [`RetryAsk`]: decorator that retries transient failures of any
//!   [`AskAsync`] implementation
//!
//! Transport retries live here; whole-call retries that also cover malformed
//! answers are applied by the callers through [`crate::retry::with_retry`].

use crate::error::LlmError;
use crate::retry::{RetryPolicy, with_retry_when};
use crate::utils::truncate_for_log;
use awful_aj::api::ask;
use awful_aj::{config::AwfulJadeConfig, template::ChatTemplate};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::task::spawn_blocking;
use tracing::{debug, info, instrument, warn};

/// Trait for async LLM interaction.
///
/// Implementors send text to an LLM and return its reply. The returned
/// future is `Send` so implementors can be used behind `async-trait` seams.
pub trait AskAsync: Send + Sync {
    /// The type of response returned by the LLM.
    type Response;

    /// Send text to the LLM and receive a response.
    ///
    /// # Arguments
    ///
    /// * `text` - The user message
    ///
    /// # Returns
    ///
    /// The LLM's response, or an error if the request failed.
    fn ask(&self, text: &str) -> impl Future<Output = Result<Self::Response, LlmError>> + Send;
}

/// `awful_aj::api::ask` bound to a configuration and one chat template.
///
/// Cloning is cheap; the config and template are shared.
#[derive(Debug, Clone)]
pub struct TemplateAsk {
    /// Endpoint, model and sampling settings.
    pub config: Arc<AwfulJadeConfig>,
    /// System prompt and framing for this kind of request.
    pub template: Arc<ChatTemplate>,
}

impl TemplateAsk {
    pub fn new(config: Arc<AwfulJadeConfig>, template: ChatTemplate) -> Self {
        Self {
            config,
            template: Arc::new(template),
        }
    }
}

impl AskAsync for TemplateAsk {
    type Response = String;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<String, LlmError> {
        let t0 = Instant::now();
        let config = Arc::clone(&self.config);
        let template = Arc::clone(&self.template);
        let text = text.to_string();
        // `awful_aj::api::ask` makes no `Send` promise for its future, so it
        // runs to completion on a blocking thread.
        let handle = Handle::current();
        let reply = spawn_blocking(move || {
            handle.block_on(async move {
                ask(&config, text, &template, None, None)
                    .await
                    .map_err(|e| e.to_string())
            })
        })
        .await
        .map_err(|e| LlmError::Backend(format!("request task failed: {e}")))
        .and_then(|r| r.map_err(LlmError::Backend));
        let dt = t0.elapsed();

        match reply {
            Ok(content) => {
                let content = content.trim().to_string();
                if content.is_empty() {
                    warn!(elapsed_ms = dt.as_millis(), "API call returned no content");
                    return Err(LlmError::EmptyResponse);
                }
                info!(
                    elapsed_ms = dt.as_millis(),
                    reply_chars = content.chars().count(),
                    "API call succeeded"
                );
                debug!(reply = %truncate_for_log(&content, 500), "API reply");
                Ok(content)
            }
            Err(e) => {
                warn!(elapsed_ms = dt.as_millis(), error = %e, "API call failed");
                Err(e)
            }
        }
    }
}

/// Wrapper that retries an [`AskAsync`] on transient failures
/// ([`LlmError::is_transient`]) following a [`RetryPolicy`].
pub struct RetryAsk<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: AskAsync> RetryAsk<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk").field("policy", &self.policy).finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync,
    T::Response: Send,
{
    type Response = T::Response;

    async fn ask(&self, text: &str) -> Result<Self::Response, LlmError> {
        let inner = &self.inner;
        with_retry_when(&self.policy, "ask", move || inner.ask(text), LlmError::is_transient).await
    }
}
