//! Headless Chromium page loader.
//!
//! The browser is launched lazily on first use and relaunched after a failure to
//! open a tab, so a crashed browser only costs the cycle it crashed in.

use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chromiumoxide::{
    browser::{Browser, BrowserConfig},
    Page,
};
use futures::{future::BoxFuture, FutureExt, StreamExt};
use tokio::{
    runtime::Handle,
    sync::Mutex,
    task::JoinHandle,
    time::{sleep, timeout},
};

use crate::config::FetchConfig;

use super::{LoadedPage, PageLoader, USER_AGENT};

const TIMELINE_SELECTOR: &str = ".timeline";
const SELECTOR_POLL: Duration = Duration::from_millis(500);

struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

pub struct BrowserLoader {
    session: Mutex<Option<BrowserSession>>,
    config: FetchConfig,
}

impl BrowserLoader {
    pub fn new(config: FetchConfig) -> Self {
        Self {
            session: Mutex::new(None),
            config,
        }
    }

    async fn launch() -> Result<BrowserSession> {
        let browser_config = BrowserConfig::builder()
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled")
            .window_size(1920, 1080)
            .build()
            .map_err(|e| anyhow!("failed to build browser config: {e}"))?;
        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .context("failed to launch headless chromium")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        tracing::info!(target: "fetch", "headless browser launched");
        Ok(BrowserSession { browser, handler })
    }

    async fn new_tab(&self) -> Result<Page> {
        let mut session = self.session.lock().await;
        if session.is_none() {
            *session = Some(Self::launch().await?);
        }
        let Some(active) = session.as_ref() else {
            return Err(anyhow!("browser session unavailable"));
        };

        let opened = active.browser.new_page("about:blank").await;
        match opened {
            Ok(page) => Ok(page),
            Err(err) => {
                if let Some(broken) = session.take() {
                    shutdown_session(broken).await;
                }
                Err(err).context("failed to open browser tab")
            }
        }
    }

    async fn navigate(&self, page: &Page, url: &str) -> Result<()> {
        page.set_user_agent(USER_AGENT)
            .await
            .context("failed to set user agent")?;
        page.goto(url)
            .await
            .with_context(|| format!("failed to navigate to {url}"))?;

        if wait_for_selector(page, TIMELINE_SELECTOR, self.config.selector_timeout).await {
            tracing::debug!(target: "fetch", url, "timeline rendered");
        } else {
            tracing::warn!(target: "fetch", url, "timed out waiting for timeline; reading page as is");
        }
        sleep(self.config.settle_delay).await;
        Ok(())
    }
}

#[async_trait]
impl PageLoader for BrowserLoader {
    async fn open(&self, url: &str) -> Result<Box<dyn LoadedPage>> {
        // Guarded from here on: a cancelled open still closes the tab.
        let mut tab = BrowserPage::new(self.new_tab().await?);
        let page = tab.tab()?;
        let navigated = timeout(self.config.page_timeout, self.navigate(page, url)).await;
        match navigated {
            Ok(Ok(())) => Ok(Box::new(tab)),
            Ok(Err(err)) => {
                tab.close_now().await;
                Err(err)
            }
            Err(_) => {
                tab.close_now().await;
                Err(anyhow!("timed out loading {url}"))
            }
        }
    }

    async fn release(&self) {
        if let Some(session) = self.session.lock().await.take() {
            shutdown_session(session).await;
        }
        tracing::info!(target: "lifecycle", "browser resources released");
    }
}

/// A browser tab that can be closed after its owner is gone.
trait Tab: Send + Sync + 'static {
    fn discard(self) -> BoxFuture<'static, ()>;
}

impl Tab for Page {
    fn discard(self) -> BoxFuture<'static, ()> {
        close_page(self).boxed()
    }
}

/// Owns an open tab. Dropping it while the tab is still open closes the tab on a
/// spawned task, so timeouts around `open` or `html` never leak targets.
struct BrowserPage<T: Tab = Page> {
    tab: Option<T>,
}

impl<T: Tab> BrowserPage<T> {
    fn new(tab: T) -> Self {
        Self { tab: Some(tab) }
    }

    fn tab(&self) -> Result<&T> {
        self.tab.as_ref().context("page already closed")
    }

    async fn close_now(&mut self) {
        if let Some(tab) = self.tab.take() {
            tab.discard().await;
        }
    }
}

impl<T: Tab> Drop for BrowserPage<T> {
    fn drop(&mut self) {
        let Some(tab) = self.tab.take() else {
            return;
        };
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(tab.discard());
            }
            Err(_) => {
                tracing::warn!(target: "fetch", "browser tab dropped outside the runtime; left open");
            }
        }
    }
}

#[async_trait]
impl LoadedPage for BrowserPage<Page> {
    async fn html(&mut self) -> Result<String> {
        self.tab()?
            .content()
            .await
            .context("failed to read page content")
    }

    async fn close(&mut self) {
        self.close_now().await;
    }
}

async fn wait_for_selector(page: &Page, selector: &str, limit: Duration) -> bool {
    let started = Instant::now();
    loop {
        if page.find_element(selector).await.is_ok() {
            return true;
        }
        if started.elapsed() >= limit {
            return false;
        }
        sleep(SELECTOR_POLL).await;
    }
}

async fn close_page(page: Page) {
    if let Err(err) = page.close().await {
        tracing::debug!(target: "fetch", error = %err, "failed to close browser tab");
    }
}

/// Each step runs even when the previous one failed.
async fn shutdown_session(session: BrowserSession) {
    let BrowserSession {
        mut browser,
        handler,
    } = session;

    if let Err(err) = browser.close().await {
        tracing::warn!(target: "lifecycle", error = %err, "failed to close browser gracefully");
        if let Some(Err(err)) = browser.kill().await {
            tracing::warn!(target: "lifecycle", error = %err, "failed to kill browser process");
        }
    }
    if let Err(err) = browser.wait().await {
        tracing::warn!(target: "lifecycle", error = %err, "failed to reap browser process");
    }
    handler.abort();
}
