//! In-memory browser double for tests.

use super::{BrowserHandle, BrowserLauncher, BrowsingContext, PageDriver};
use crate::error::BrowserError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a mocked URL does when visited.
#[derive(Debug, Clone)]
pub enum MockPage {
    Html(String),
    NavigationError,
    /// Takes this long to load.
    Slow(Duration, String),
}

#[derive(Default)]
struct State {
    launches: AtomicUsize,
    browsers_closed: AtomicUsize,
    contexts_closed: AtomicUsize,
    open_pages: AtomicUsize,
    max_open_pages: AtomicUsize,
    pages_closed: AtomicUsize,
    fail_launch: bool,
    fail_next_page: AtomicBool,
    last_user_agent: Mutex<Option<String>>,
    visited: Mutex<Vec<String>>,
    routes: Mutex<HashMap<String, MockPage>>,
}

#[derive(Default)]
pub struct MockLauncher {
    state: Arc<State>,
}

impl MockLauncher {
    pub fn failing_launch() -> Self {
        Self {
            state: Arc::new(State {
                fail_launch: true,
                ..State::default()
            }),
        }
    }

    pub fn route(&self, url: &str, page: MockPage) {
        self.state.routes.lock().unwrap().insert(url.to_string(), page);
    }

    pub fn fail_next_page(&self) {
        self.state.fail_next_page.store(true, Ordering::SeqCst);
    }

    pub fn launches(&self) -> usize {
        self.state.launches.load(Ordering::SeqCst)
    }

    pub fn browsers_closed(&self) -> usize {
        self.state.browsers_closed.load(Ordering::SeqCst)
    }

    pub fn contexts_closed(&self) -> usize {
        self.state.contexts_closed.load(Ordering::SeqCst)
    }

    pub fn open_pages(&self) -> usize {
        self.state.open_pages.load(Ordering::SeqCst)
    }

    pub fn max_open_pages(&self) -> usize {
        self.state.max_open_pages.load(Ordering::SeqCst)
    }

    pub fn pages_closed(&self) -> usize {
        self.state.pages_closed.load(Ordering::SeqCst)
    }

    pub fn last_user_agent(&self) -> Option<String> {
        self.state.last_user_agent.lock().unwrap().clone()
    }

    pub fn visited(&self) -> Vec<String> {
        self.state.visited.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserLauncher for MockLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserHandle>, BrowserError> {
        if self.state.fail_launch {
            return Err(BrowserError::Launch("chrome binary not found".into()));
        }
        self.state.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockBrowser {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockBrowser {
    state: Arc<State>,
}

#[async_trait]
impl BrowserHandle for MockBrowser {
    async fn new_context(&self, user_agent: &str) -> Result<Arc<dyn BrowsingContext>, BrowserError> {
        *self.state.last_user_agent.lock().unwrap() = Some(user_agent.to_string());
        Ok(Arc::new(MockContext {
            state: Arc::clone(&self.state),
        }))
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        self.state.browsers_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct MockContext {
    state: Arc<State>,
}

#[async_trait]
impl BrowsingContext for MockContext {
    async fn new_page(&self) -> Result<Box<dyn PageDriver>, BrowserError> {
        if self.state.fail_next_page.swap(false, Ordering::SeqCst) {
            return Err(BrowserError::Page("target crashed".into()));
        }
        let open = self.state.open_pages.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_open_pages.fetch_max(open, Ordering::SeqCst);
        Ok(Box::new(MockPageDriver {
            state: Arc::clone(&self.state),
            html: None,
        }))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.state.contexts_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct MockPageDriver {
    state: Arc<State>,
    html: Option<String>,
}

#[async_trait]
impl PageDriver for MockPageDriver {
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        self.state.visited.lock().unwrap().push(url.to_string());
        let route = self.state.routes.lock().unwrap().get(url).cloned();
        match route {
            Some(MockPage::Html(html)) => {
                self.html = Some(html);
                Ok(())
            }
            Some(MockPage::Slow(delay, html)) => {
                if delay > timeout {
                    tokio::time::sleep(timeout).await;
                    return Err(BrowserError::Timeout {
                        what: format!("navigation to {url}"),
                        after: timeout,
                    });
                }
                tokio::time::sleep(delay).await;
                self.html = Some(html);
                Ok(())
            }
            Some(MockPage::NavigationError) | None => Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_NAME_NOT_RESOLVED".into(),
            }),
        }
    }

    async fn wait_for_timeout(&self, _duration: Duration) {}

    async fn content(&self) -> Result<String, BrowserError> {
        self.html
            .clone()
            .ok_or_else(|| BrowserError::Content("no document loaded".into()))
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        self.state.open_pages.fetch_sub(1, Ordering::SeqCst);
        self.state.pages_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
