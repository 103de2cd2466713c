//! Chromium driver built on chromiumoxide.

use super::{BrowserHandle, BrowserLauncher, BrowsingContext, PageDriver};
use crate::error::BrowserError;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// How to start Chromium.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChromiumOptions {
    /// Explicit browser binary; chromiumoxide searches the usual places
    /// when unset.
    pub executable: Option<PathBuf>,
    pub headless: bool,
    /// Extra command-line switches appended after the defaults.
    pub extra_args: Vec<String>,
}

impl Default for ChromiumOptions {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            extra_args: Vec::new(),
        }
    }
}

/// Launches headless Chromium processes.
#[derive(Debug, Clone, Default)]
pub struct ChromiumLauncher {
    options: ChromiumOptions,
}

impl ChromiumLauncher {
    pub fn new(options: ChromiumOptions) -> Self {
        Self { options }
    }

    fn config(&self) -> Result<BrowserConfig, BrowserError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu");
        if !self.options.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.options.executable {
            builder = builder.chrome_executable(path);
        }
        for arg in &self.options.extra_args {
            builder = builder.arg(arg.as_str());
        }
        builder.build().map_err(BrowserError::Launch)
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    #[instrument(level = "info", skip_all)]
    async fn launch(&self) -> Result<Box<dyn BrowserHandle>, BrowserError> {
        let config = self.config()?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "CDP handler event error");
                }
            }
        });
        info!(headless = self.options.headless, "Chromium launched");

        Ok(Box::new(ChromiumBrowser {
            browser: Arc::new(Mutex::new(browser)),
            handler_task,
        }))
    }
}

struct ChromiumBrowser {
    browser: Arc<Mutex<Browser>>,
    handler_task: JoinHandle<()>,
}

#[async_trait]
impl BrowserHandle for ChromiumBrowser {
    async fn new_context(&self, user_agent: &str) -> Result<Arc<dyn BrowsingContext>, BrowserError> {
        Ok(Arc::new(ChromiumContext {
            browser: Arc::clone(&self.browser),
            user_agent: user_agent.to_string(),
        }))
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        let result = {
            let mut browser = self.browser.lock().await;
            let closed = browser.close().await.map(|_| ());
            if let Err(e) = browser.wait().await {
                warn!(error = %e, "Waiting for Chromium to exit failed");
            }
            closed
        };
        self.handler_task.abort();
        result.map_err(|e| BrowserError::Context(format!("browser close failed: {e}")))
    }
}

/// Pages of the default browser context, all sharing one user agent.
struct ChromiumContext {
    browser: Arc<Mutex<Browser>>,
    user_agent: String,
}

#[async_trait]
impl BrowsingContext for ChromiumContext {
    async fn new_page(&self) -> Result<Box<dyn PageDriver>, BrowserError> {
        let page = {
            let browser = self.browser.lock().await;
            browser
                .new_page("about:blank")
                .await
                .map_err(|e| BrowserError::Page(e.to_string()))?
        };
        page.set_user_agent(self.user_agent.clone())
            .await
            .map_err(|e| BrowserError::Page(format!("failed to set user agent: {e}")))?;
        Ok(Box::new(ChromiumPage { page }))
    }

    /// Nothing to release: pages own their tabs and the default context
    /// lives as long as the browser process.
    async fn close(&self) -> Result<(), BrowserError> {
        Ok(())
    }
}

struct ChromiumPage {
    page: Page,
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(BrowserError::Timeout {
                what: format!("navigation to {url}"),
                after: timeout,
            }),
        }
    }

    async fn content(&self) -> Result<String, BrowserError> {
        self.page
            .content()
            .await
            .map_err(|e| BrowserError::Content(e.to_string()))
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        self.page
            .close()
            .await
            .map_err(|e| BrowserError::Page(format!("failed to close page: {e}")))
    }
}
