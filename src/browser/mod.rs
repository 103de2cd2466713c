//! Headless browser abstraction and the pooled session manager.
//!
//! The traits here describe the minimum the extractor needs from a browser
//! engine: launch a process, open one shared browsing context, and drive
//! individual pages. [`chromium`] implements them on top of chromiumoxide;
//! tests use an in-memory double.
//!
//! [`SessionManager`] owns the single browser + context for a run and hands
//! out [`PooledPage`]s. Every page holds a [`Lease`] from the [`SlotPool`],
//! so no more than `capacity` tabs are ever open at once.

pub mod chromium;
#[cfg(test)]
pub(crate) mod mock;

use crate::error::BrowserError;
use crate::pool::{Lease, SlotPool};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Identifies the crawler to the sites it visits.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; HeadlineHarvester/1.0)";

/// Maximum number of pages open at once.
pub const DEFAULT_MAX_PAGES: usize = 5;

/// Starts a browser process.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserHandle>, BrowserError>;
}

/// A running browser process.
#[async_trait]
pub trait BrowserHandle: Send + Sync {
    /// Open a browsing context whose pages identify as `user_agent`.
    async fn new_context(&self, user_agent: &str) -> Result<Arc<dyn BrowsingContext>, BrowserError>;
    /// Terminate the process.
    async fn close(self: Box<Self>) -> Result<(), BrowserError>;
}

/// A set of pages sharing cookies and settings.
#[async_trait]
pub trait BrowsingContext: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn PageDriver>, BrowserError>;
    /// Release context-level state. Tabs are owned by their [`PageDriver`]s
    /// and closed through them.
    async fn close(&self) -> Result<(), BrowserError>;
}

/// One browser tab.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate and wait for the DOM to be ready, failing after `timeout`.
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Give client-side scripts time to render.
    async fn wait_for_timeout(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    /// Serialized DOM of the current document.
    async fn content(&self) -> Result<String, BrowserError>;

    async fn close(self: Box<Self>) -> Result<(), BrowserError>;
}

struct Session {
    browser: Box<dyn BrowserHandle>,
    context: Arc<dyn BrowsingContext>,
}

/// Lazily launched browser session with a bounded number of open pages.
///
/// Construct one per run and share it behind an `Arc`.
pub struct SessionManager {
    launcher: Arc<dyn BrowserLauncher>,
    pool: SlotPool,
    user_agent: String,
    session: Mutex<Option<Session>>,
}

impl SessionManager {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, pool: SlotPool, user_agent: impl Into<String>) -> Self {
        Self {
            launcher,
            pool,
            user_agent: user_agent.into(),
            session: Mutex::new(None),
        }
    }

    /// Launch the browser and open the shared context if not done yet.
    ///
    /// # Errors
    ///
    /// [`BrowserError::Launch`] when the process cannot start, or
    /// [`BrowserError::Context`] when the context cannot be created.
    pub async fn initialize(&self) -> Result<(), BrowserError> {
        self.context().await.map(|_| ())
    }

    #[instrument(level = "info", skip_all)]
    async fn context(&self) -> Result<Arc<dyn BrowsingContext>, BrowserError> {
        let mut slot = self.session.lock().await;
        if let Some(session) = slot.as_ref() {
            return Ok(Arc::clone(&session.context));
        }

        info!("Launching browser");
        let browser = self.launcher.launch().await?;
        let context = match browser.new_context(&self.user_agent).await {
            Ok(context) => context,
            Err(e) => {
                warn!(error = %e, "Context creation failed; shutting browser down");
                if let Err(close_err) = browser.close().await {
                    warn!(error = %close_err, "Browser close failed");
                }
                return Err(e);
            }
        };
        info!(user_agent = %self.user_agent, capacity = self.pool.capacity(), "Browser session ready");
        *slot = Some(Session {
            browser,
            context: Arc::clone(&context),
        });
        Ok(context)
    }

    /// Open a page, waiting for a free pool slot first.
    ///
    /// The session is initialized on first use. The returned page holds its
    /// slot until it is closed or dropped.
    pub async fn new_page(&self) -> Result<PooledPage, BrowserError> {
        let context = self.context().await?;
        let lease = self.pool.acquire().await?;
        let page = context.new_page().await?;
        debug!(active = self.pool.active(), "Page opened");
        Ok(PooledPage {
            page: Some(page),
            lease: Some(lease),
        })
    }

    /// Close the context and the browser. Safe to call repeatedly; the next
    /// `new_page` launches a fresh browser.
    #[instrument(level = "info", skip_all)]
    pub async fn close(&self) -> Result<(), BrowserError> {
        let Some(session) = self.session.lock().await.take() else {
            debug!("Browser session already closed");
            return Ok(());
        };

        let context_result = session.context.close().await;
        if let Err(e) = &context_result {
            warn!(error = %e, "Context close failed");
        }
        let browser_result = session.browser.close().await;
        if let Err(e) = &browser_result {
            warn!(error = %e, "Browser close failed");
        }
        info!("Browser session closed");
        context_result.and(browser_result)
    }

    pub async fn is_initialized(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Pages currently holding a pool slot.
    pub fn active_pages(&self) -> usize {
        self.pool.active()
    }

    pub fn pool(&self) -> &SlotPool {
        &self.pool
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("user_agent", &self.user_agent)
            .field("pool", &self.pool)
            .finish()
    }
}

/// A page bound to a pool slot.
///
/// [`PooledPage::close`] closes the tab and then frees the slot. Dropping the
/// page without closing it closes the tab in the background and frees the
/// slot once the tab is gone.
pub struct PooledPage {
    page: Option<Box<dyn PageDriver>>,
    lease: Option<Lease>,
}

impl PooledPage {
    fn driver(&mut self) -> Result<&mut Box<dyn PageDriver>, BrowserError> {
        self.page
            .as_mut()
            .ok_or_else(|| BrowserError::Page("page already closed".into()))
    }

    pub async fn goto(&mut self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        self.driver()?.goto(url, timeout).await
    }

    pub async fn wait_for_timeout(&mut self, duration: Duration) -> Result<(), BrowserError> {
        self.driver()?.wait_for_timeout(duration).await;
        Ok(())
    }

    pub async fn content(&mut self) -> Result<String, BrowserError> {
        self.driver()?.content().await
    }

    /// Close the tab and release the slot, in that order.
    pub async fn close(mut self) -> Result<(), BrowserError> {
        let result = match self.page.take() {
            Some(page) => page.close().await,
            None => Ok(()),
        };
        if let Some(lease) = self.lease.take() {
            lease.release();
        }
        result
    }
}

impl Drop for PooledPage {
    fn drop(&mut self) {
        let Some(page) = self.page.take() else {
            return;
        };
        let lease = self.lease.take();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = page.close().await {
                        debug!(error = %e, "Background page close failed");
                    }
                    drop(lease);
                });
            }
            // Without a runtime the tab cannot be closed; it dies with the browser.
            Err(_) => debug!("No runtime to close dropped page"),
        }
    }
}

impl fmt::Debug for PooledPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledPage")
            .field("open", &self.page.is_some())
            .field("lease", &self.lease)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockLauncher;
    use super::*;
    use futures::poll;

    fn manager(launcher: Arc<MockLauncher>, capacity: usize) -> SessionManager {
        SessionManager::new(launcher, SlotPool::new(capacity).unwrap(), DEFAULT_USER_AGENT)
    }

    #[tokio::test]
    async fn first_page_launches_browser_once() {
        let launcher = Arc::new(MockLauncher::default());
        let session = manager(Arc::clone(&launcher), 5);
        assert!(!session.is_initialized().await);

        let a = session.new_page().await.unwrap();
        let b = session.new_page().await.unwrap();
        assert!(session.is_initialized().await);
        assert_eq!(launcher.launches(), 1);
        assert_eq!(session.active_pages(), 2);
        assert_eq!(launcher.last_user_agent().as_deref(), Some(DEFAULT_USER_AGENT));

        a.close().await.unwrap();
        b.close().await.unwrap();
        assert_eq!(session.active_pages(), 0);
        assert_eq!(launcher.open_pages(), 0);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_allows_relaunch() {
        let launcher = Arc::new(MockLauncher::default());
        let session = manager(Arc::clone(&launcher), 2);

        session.initialize().await.unwrap();
        session.close().await.unwrap();
        session.close().await.unwrap();
        assert!(!session.is_initialized().await);
        assert_eq!(launcher.browsers_closed(), 1);

        let page = session.new_page().await.unwrap();
        assert_eq!(launcher.launches(), 2);
        page.close().await.unwrap();
    }

    #[tokio::test]
    async fn launch_failure_propagates_and_is_fatal() {
        let launcher = Arc::new(MockLauncher::failing_launch());
        let session = manager(launcher, 2);

        let err = session.new_page().await.unwrap_err();
        assert!(err.is_fatal());
        assert!(!session.is_initialized().await);
        assert_eq!(session.active_pages(), 0);
    }

    #[tokio::test]
    async fn sixth_page_waits_for_a_close() {
        let launcher = Arc::new(MockLauncher::default());
        let session = manager(Arc::clone(&launcher), 5);

        let mut pages = Vec::new();
        for _ in 0..5 {
            pages.push(session.new_page().await.unwrap());
        }
        let mut sixth = Box::pin(session.new_page());
        assert!(poll!(sixth.as_mut()).is_pending());
        assert_eq!(launcher.open_pages(), 5);

        pages.pop().unwrap().close().await.unwrap();
        let page = sixth.await.unwrap();
        assert_eq!(session.active_pages(), 5);
        assert!(launcher.max_open_pages() <= 5);

        page.close().await.unwrap();
        for p in pages {
            p.close().await.unwrap();
        }
        assert_eq!(session.active_pages(), 0);
    }

    #[tokio::test]
    async fn dropped_page_keeps_its_slot_until_the_tab_is_closed() {
        let launcher = Arc::new(MockLauncher::default());
        let session = manager(Arc::clone(&launcher), 1);

        let page = session.new_page().await.unwrap();
        drop(page);
        assert_eq!(session.active_pages(), 1);

        let again = session.new_page().await.unwrap();
        assert_eq!(launcher.pages_closed(), 1);
        assert!(launcher.max_open_pages() <= 1);
        again.close().await.unwrap();
        assert_eq!(session.active_pages(), 0);
    }

    #[tokio::test]
    async fn session_close_closes_context_then_browser() {
        let launcher = Arc::new(MockLauncher::default());
        let session = manager(Arc::clone(&launcher), 1);

        session.new_page().await.unwrap().close().await.unwrap();
        session.close().await.unwrap();
        assert_eq!(launcher.contexts_closed(), 1);
        assert_eq!(launcher.browsers_closed(), 1);
    }

    #[tokio::test]
    async fn page_open_failure_returns_the_slot() {
        let launcher = Arc::new(MockLauncher::default());
        launcher.fail_next_page();
        let session = manager(Arc::clone(&launcher), 1);

        assert!(session.new_page().await.is_err());
        assert_eq!(session.active_pages(), 0);
    }
}
