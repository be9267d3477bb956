//! Headless Chromium implementation of the browser seam

use async_trait::async_trait;
use chromiumoxide::browser::BrowserConfig as CdpBrowserConfig;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::emulation::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::EventRequestWillBeSent;
use chromiumoxide::cdp::browser_protocol::page::{EventDomContentEventFired, NavigateParams};
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::blocker::{self, BlockPolicy};
use super::{BrowserEngine, BrowsingContext};
use crate::config::{BrowserConfig, HttpIdentityConfig};
use crate::errors::{BrowserError, BrowserResult};

const ANCHOR_HREFS_JS: &str = "Array.from(document.querySelectorAll('a')).map(e => e.href)";

/// Command line for the browser process.
///
/// Site isolation is switched off so cross-site player iframes render in the
/// page's own process. Their requests then show up on the page session,
/// where both the request watch and the resource blocker are attached.
fn launch_args(config: &BrowserConfig, identity: &HttpIdentityConfig) -> Vec<String> {
    let mut args: Vec<String> = [
        "--disable-gpu",
        "--disable-dev-shm-usage",
        "--mute-audio",
        "--no-first-run",
        "--disable-site-isolation-trials",
        "--disable-features=IsolateOrigins,site-per-process",
    ]
    .iter()
    .map(|arg| arg.to_string())
    .collect();
    args.push(format!("--user-agent={}", identity.user_agent));
    args.extend(config.extra_args.iter().cloned());
    args
}

/// Wait for the first manifest request seen by `watch` while `navigation`
/// loads the page. Each side is bounded by `timeout` on its own.
///
/// - a request seen first wins and the navigation is dropped
/// - a navigation that completes first leaves the watch running until its
///   own deadline
/// - a navigation that fails or times out first yields an error
async fn race_capture<W, N>(watch: W, navigation: N, timeout: Duration, url: &str) -> BrowserResult<Option<String>>
where
    W: Future<Output = Option<String>>,
    N: Future<Output = BrowserResult<()>>,
{
    let watch = tokio::time::timeout(timeout, watch);
    let navigation = tokio::time::timeout(timeout, navigation);
    tokio::pin!(watch);
    tokio::pin!(navigation);

    tokio::select! {
        found = &mut watch => Ok(found.ok().flatten()),
        navigated = &mut navigation => match navigated {
            Ok(Ok(())) => {
                debug!("Page {} loaded before a manifest request, still watching", url);
                Ok(watch.await.ok().flatten())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(BrowserError::timeout(format!("navigating to {url}"), timeout.as_secs())),
        },
    }
}

/// Owns the Chromium process and the task pumping its DevTools connection
pub struct ChromiumEngine {
    browser: Arc<Browser>,
    handler_task: JoinHandle<()>,
    user_agent: String,
    policy: Arc<BlockPolicy>,
}

impl ChromiumEngine {
    /// Launch the browser. Failure here is the one fatal startup condition.
    pub async fn launch(config: &BrowserConfig, identity: &HttpIdentityConfig) -> BrowserResult<Self> {
        let mut builder = CdpBrowserConfig::builder();
        if !config.headless {
            builder = builder.with_head();
        }
        if !config.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(executable) = &config.executable {
            builder = builder.chrome_executable(executable);
        }
        builder = builder.args(launch_args(config, identity));

        let cdp_config = builder
            .build()
            .map_err(|message| BrowserError::Launch { message })?;

        let (browser, mut handler) = Browser::launch(cdp_config)
            .await
            .map_err(|e| BrowserError::Launch { message: e.to_string() })?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler event error: {}", e);
                }
            }
        });

        info!(
            "Chromium launched (headless={}, sandbox={})",
            config.headless, config.sandbox
        );

        Ok(Self {
            browser: Arc::new(browser),
            handler_task,
            user_agent: identity.user_agent.clone(),
            policy: Arc::new(BlockPolicy::from_names(&config.blocked_resource_types)),
        })
    }

    /// Close the browser and stop the handler task.
    ///
    /// All contexts must have been released before calling this.
    pub async fn shutdown(self) {
        match Arc::try_unwrap(self.browser) {
            Ok(mut browser) => {
                if let Err(e) = browser.close().await {
                    warn!("Failed to close browser cleanly: {}", e);
                }
                if let Err(e) = browser.wait().await {
                    debug!("Browser process wait failed: {}", e);
                }
            }
            Err(_) => warn!("Browser still referenced by open contexts, dropping it"),
        }

        self.handler_task.abort();
        info!("Chromium shut down");
    }

    async fn prepare_page(&self, context_id: &BrowserContextId) -> BrowserResult<(Page, JoinHandle<()>)> {
        let mut target = CreateTargetParams::new("about:blank");
        target.browser_context_id = Some(context_id.clone());

        let page = self.browser.new_page(target).await?;
        page.execute(SetUserAgentOverrideParams::new(self.user_agent.clone()))
            .await?;
        let blocker_task = blocker::install(&page, self.policy.clone()).await?;
        Ok((page, blocker_task))
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn open_context(&self) -> BrowserResult<Box<dyn BrowsingContext>> {
        let created = self
            .browser
            .execute(CreateBrowserContextParams::default())
            .await?;
        let context_id = created.result.browser_context_id.clone();

        match self.prepare_page(&context_id).await {
            Ok((page, blocker_task)) => Ok(Box::new(ChromiumContext {
                browser: self.browser.clone(),
                context_id,
                page,
                blocker_task,
            })),
            Err(e) => {
                if let Err(dispose_err) = self
                    .browser
                    .execute(DisposeBrowserContextParams::new(context_id))
                    .await
                {
                    debug!("Disposing half-built context failed: {}", dispose_err);
                }
                Err(BrowserError::context(e.to_string()))
            }
        }
    }
}

/// Incognito-style browser context with a single page
pub struct ChromiumContext {
    browser: Arc<Browser>,
    context_id: BrowserContextId,
    page: Page,
    blocker_task: JoinHandle<()>,
}

/// Navigate and wait until the DOM is parsed
async fn navigate(page: &Page, url: &str) -> BrowserResult<()> {
    let mut dom_ready = page.event_listener::<EventDomContentEventFired>().await?;

    let response = page.execute(NavigateParams::new(url)).await?;
    if let Some(error_text) = &response.result.error_text {
        return Err(BrowserError::navigation(url, error_text.clone()));
    }

    dom_ready.next().await;
    Ok(())
}

#[async_trait]
impl BrowsingContext for ChromiumContext {
    async fn collect_anchor_hrefs(
        &mut self,
        url: &str,
        nav_timeout: Duration,
        settle: Duration,
    ) -> BrowserResult<Vec<String>> {
        tokio::time::timeout(nav_timeout, navigate(&self.page, url))
            .await
            .map_err(|_| BrowserError::timeout(format!("loading {url}"), nav_timeout.as_secs()))??;

        tokio::time::sleep(settle).await;

        let hrefs: Vec<String> = self
            .page
            .evaluate(ANCHOR_HREFS_JS)
            .await?
            .into_value()
            .map_err(|e| BrowserError::Cdp(format!("unexpected anchor list: {e}")))?;

        debug!("Collected {} anchors from {}", hrefs.len(), url);
        Ok(hrefs)
    }

    async fn capture_request(
        &mut self,
        url: &str,
        marker: &str,
        timeout: Duration,
    ) -> BrowserResult<Option<String>> {
        let mut requests = self.page.event_listener::<EventRequestWillBeSent>().await?;
        let marker = marker.to_string();

        let watch = async move {
            while let Some(event) = requests.next().await {
                if event.request.url.contains(&marker) {
                    return Some(event.request.url.clone());
                }
            }
            None
        };

        race_capture(watch, navigate(&self.page, url), timeout, url).await
    }

    async fn close(self: Box<Self>) -> BrowserResult<()> {
        let ChromiumContext {
            browser,
            context_id,
            page,
            blocker_task,
        } = *self;

        blocker_task.abort();
        let page_result = page.close().await;
        let dispose_result = browser
            .execute(DisposeBrowserContextParams::new(context_id))
            .await;

        page_result?;
        dispose_result?;
        Ok(())
    }
}
