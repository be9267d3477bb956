//! Browser automation seam
//!
//! The pipeline only talks to [`BrowserEngine`] and [`BrowsingContext`];
//! [`chromium::ChromiumEngine`] is the production implementation driving a
//! headless Chromium over the DevTools protocol.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use crate::errors::{BrowserError, BrowserResult};

pub mod blocker;
pub mod chromium;

pub use blocker::BlockPolicy;
pub use chromium::ChromiumEngine;

/// Long-lived browser handle able to hand out isolated contexts
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Create a fresh browsing context that shares no cookies or cache with
    /// any other context, with the resource blocker already installed.
    async fn open_context(&self) -> BrowserResult<Box<dyn BrowsingContext>>;
}

/// One isolated browsing context holding a single page
#[async_trait]
pub trait BrowsingContext: Send {
    /// Navigate to `url`, wait for DOMContentLoaded plus `settle`, and return
    /// the absolute `href` of every anchor element.
    async fn collect_anchor_hrefs(
        &mut self,
        url: &str,
        nav_timeout: Duration,
        settle: Duration,
    ) -> BrowserResult<Vec<String>>;

    /// Navigate to `url` while watching outgoing requests; returns the URL of
    /// the first request containing `marker`, or `None` if none was seen
    /// within `timeout`.
    async fn capture_request(
        &mut self,
        url: &str,
        marker: &str,
        timeout: Duration,
    ) -> BrowserResult<Option<String>>;

    /// Release the context and everything it owns
    async fn close(self: Box<Self>) -> BrowserResult<()>;
}

/// Scoped ownership of a browsing context.
///
/// Call [`ContextGuard::release`] on the normal path. If the guard is dropped
/// while still holding a context (early return, cancelled future, panic) the
/// close is spawned onto the current runtime instead.
pub struct ContextGuard {
    inner: Option<Box<dyn BrowsingContext>>,
    label: String,
}

impl ContextGuard {
    pub fn new<S: Into<String>>(context: Box<dyn BrowsingContext>, label: S) -> Self {
        Self {
            inner: Some(context),
            label: label.into(),
        }
    }

    /// Open a context on `engine` and wrap it
    pub async fn open<S: Into<String>>(engine: &dyn BrowserEngine, label: S) -> BrowserResult<Self> {
        let context = engine.open_context().await?;
        Ok(Self::new(context, label))
    }

    pub fn context(&mut self) -> BrowserResult<&mut (dyn BrowsingContext + 'static)> {
        match self.inner.as_mut() {
            Some(context) => Ok(context.as_mut()),
            None => Err(BrowserError::context(format!("context '{}' already released", self.label))),
        }
    }

    /// Close the context; failures are logged and swallowed
    pub async fn release(mut self) {
        if let Some(context) = self.inner.take() {
            match context.close().await {
                Ok(()) => debug!("Closed browsing context '{}'", self.label),
                Err(e) => warn!("Failed to close browsing context '{}': {}", self.label, e),
            }
        }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if let Some(context) = self.inner.take() {
            let label = std::mem::take(&mut self.label);
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    debug!("Browsing context '{}' dropped without release, closing in background", label);
                    handle.spawn(async move {
                        if let Err(e) = context.close().await {
                            warn!("Background close of browsing context '{}' failed: {}", label, e);
                        }
                    });
                }
                Err(_) => warn!("Browsing context '{}' dropped outside a runtime and could not be closed", label),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingContext {
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BrowsingContext for CountingContext {
        async fn collect_anchor_hrefs(
            &mut self,
            _url: &str,
            _nav_timeout: Duration,
            _settle: Duration,
        ) -> BrowserResult<Vec<String>> {
            Ok(Vec::new())
        }

        async fn capture_request(
            &mut self,
            _url: &str,
            _marker: &str,
            _timeout: Duration,
        ) -> BrowserResult<Option<String>> {
            Ok(None)
        }

        async fn close(self: Box<Self>) -> BrowserResult<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_release_closes_once() {
        let closed = Arc::new(AtomicUsize::new(0));
        let guard = ContextGuard::new(Box::new(CountingContext { closed: closed.clone() }), "test");

        guard.release().await;
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drop_without_release_still_closes() {
        let closed = Arc::new(AtomicUsize::new(0));
        {
            let mut guard = ContextGuard::new(Box::new(CountingContext { closed: closed.clone() }), "dropped");
            assert!(guard.context().is_ok());
        }

        for _ in 0..10 {
            if closed.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }
}
