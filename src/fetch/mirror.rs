use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::time::{sleep, timeout};

use crate::{config::FetchConfig, timeline::PostExtractor};

use super::{LoadedPage, PageLoader, TimelineFetcher};

const CHALLENGE_MARKERS: [&str; 2] = ["Making sure you", "Anubis"];

/// Tries each mirror instance in order and returns the first page with posts.
pub struct MirrorFetcher<L> {
    loader: L,
    instances: Vec<String>,
    extractor: PostExtractor,
    page_timeout: Duration,
    challenge_wait: Duration,
}

impl<L: PageLoader> MirrorFetcher<L> {
    pub fn new(
        loader: L,
        instances: Vec<String>,
        extractor: PostExtractor,
        config: &FetchConfig,
    ) -> Self {
        Self {
            loader,
            instances,
            extractor,
            page_timeout: config.page_timeout,
            challenge_wait: config.challenge_wait,
        }
    }

    async fn try_instance(&self, url: &str, account: &str) -> Result<Option<String>> {
        let mut page = timeout(self.page_timeout, self.loader.open(url))
            .await
            .with_context(|| format!("timed out opening {url}"))??;
        // Bounds the challenge wait and re-read as well.
        let limit = self.page_timeout + self.challenge_wait;
        let result = timeout(limit, self.read_page(page.as_mut(), url, account))
            .await
            .with_context(|| format!("timed out reading {url}"));
        page.close().await;
        result?
    }

    async fn read_page(
        &self,
        page: &mut dyn LoadedPage,
        url: &str,
        account: &str,
    ) -> Result<Option<String>> {
        let mut html = page.html().await?;
        if is_challenge(&html) {
            tracing::warn!(
                target: "fetch",
                url,
                wait = ?self.challenge_wait,
                "bot challenge page returned; waiting before re-reading"
            );
            sleep(self.challenge_wait).await;
            html = page.html().await?;
        }

        let count = self.extractor.extract(&html, account).len();
        if count == 0 {
            return Ok(None);
        }
        tracing::info!(target: "fetch", url, count, "fetched timeline");
        Ok(Some(html))
    }
}

#[async_trait]
impl<L: PageLoader> TimelineFetcher for MirrorFetcher<L> {
    async fn fetch(&self, account: &str) -> Option<String> {
        for instance in &self.instances {
            let url = profile_url(instance, account);
            tracing::info!(target: "fetch", url = %url, "requesting timeline");

            match self.try_instance(&url, account).await {
                Ok(Some(markup)) => return Some(markup),
                Ok(None) => {
                    tracing::warn!(target: "fetch", instance = %instance, account, "no posts found on mirror");
                }
                Err(err) => {
                    tracing::error!(target: "fetch", instance = %instance, account, error = %err, "mirror request failed");
                }
            }
        }
        tracing::error!(target: "fetch", account, "all mirror instances failed");
        None
    }

    async fn release(&self) {
        self.loader.release().await;
    }
}

fn profile_url(instance: &str, account: &str) -> String {
    let base = instance.trim().trim_end_matches('/');
    let account = account.trim_start_matches('@');
    if base.starts_with("http://") || base.starts_with("https://") {
        format!("{base}/{account}")
    } else {
        format!("https://{base}/{account}")
    }
}

fn is_challenge(html: &str) -> bool {
    CHALLENGE_MARKERS.iter().any(|marker| html.contains(marker))
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Arc};

    use anyhow::anyhow;
    use parking_lot::Mutex;

    use super::*;
    use crate::{
        config::FetchMode,
        timeline::extractor::tests::{item_html, page_html},
    };

    const CHALLENGE: &str = "<html><body>Making sure you're not a bot! (Anubis)</body></html>";

    /// Serves queued bodies per url; each `html()` call pops the next one.
    #[derive(Default, Clone)]
    struct ScriptedLoader {
        pages: Arc<Mutex<HashMap<String, Vec<String>>>>,
        opened: Arc<Mutex<Vec<String>>>,
        closed: Arc<Mutex<usize>>,
    }

    impl ScriptedLoader {
        fn serve(&self, url: &str, bodies: &[&str]) {
            self.pages.lock().insert(
                url.to_string(),
                bodies.iter().map(|b| b.to_string()).collect(),
            );
        }
    }

    struct ScriptedPage {
        bodies: Vec<String>,
        closed: Arc<Mutex<usize>>,
    }

    #[async_trait]
    impl LoadedPage for ScriptedPage {
        async fn html(&mut self) -> Result<String> {
            if self.bodies.is_empty() {
                return Err(anyhow!("no more bodies"));
            }
            Ok(self.bodies.remove(0))
        }

        async fn close(&mut self) {
            *self.closed.lock() += 1;
        }
    }

    #[async_trait]
    impl PageLoader for ScriptedLoader {
        async fn open(&self, url: &str) -> Result<Box<dyn LoadedPage>> {
            self.opened.lock().push(url.to_string());
            let bodies = self
                .pages
                .lock()
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow!("connection refused"))?;
            Ok(Box::new(ScriptedPage {
                bodies,
                closed: self.closed.clone(),
            }))
        }
    }

    fn fetcher(loader: ScriptedLoader, instances: &[&str]) -> MirrorFetcher<ScriptedLoader> {
        let config = FetchConfig {
            mode: FetchMode::Http,
            page_timeout: Duration::from_secs(5),
            selector_timeout: Duration::ZERO,
            settle_delay: Duration::ZERO,
            challenge_wait: Duration::ZERO,
        };
        MirrorFetcher::new(
            loader,
            instances.iter().map(|s| s.to_string()).collect(),
            PostExtractor::new("https://twitter.com").unwrap(),
            &config,
        )
    }

    fn timeline() -> String {
        page_html(&[item_html("/user/status/1#m", "Hello", "5m", "")])
    }

    #[tokio::test]
    async fn falls_through_failing_and_empty_mirrors() {
        let loader = ScriptedLoader::default();
        let good = timeline();
        loader.serve("https://empty.example/user", &["<html><div class=\"timeline\"></div></html>"]);
        loader.serve("https://good.example/user", &[good.as_str()]);

        let fetcher = fetcher(
            loader.clone(),
            &["https://down.example/", "empty.example", "https://good.example"],
        );

        assert_eq!(fetcher.fetch("user").await, Some(good));
        assert_eq!(
            *loader.opened.lock(),
            vec![
                "https://down.example/user".to_string(),
                "https://empty.example/user".to_string(),
                "https://good.example/user".to_string(),
            ]
        );
        assert_eq!(*loader.closed.lock(), 2);
    }

    #[tokio::test]
    async fn rereads_once_after_bot_challenge() {
        let loader = ScriptedLoader::default();
        let good = timeline();
        loader.serve("https://m.example/user", &[CHALLENGE, good.as_str()]);

        let fetcher = fetcher(loader, &["https://m.example"]);
        assert_eq!(fetcher.fetch("@user").await, Some(good));
    }

    #[tokio::test]
    async fn persistent_challenge_yields_none() {
        let loader = ScriptedLoader::default();
        loader.serve("https://m.example/user", &[CHALLENGE, CHALLENGE]);

        let fetcher = fetcher(loader, &["https://m.example"]);
        assert_eq!(fetcher.fetch("user").await, None);
    }

    /// Serves a challenge page, then never answers the re-read.
    #[derive(Default, Clone)]
    struct StallingLoader {
        opened: Arc<Mutex<Vec<String>>>,
        closed: Arc<Mutex<usize>>,
    }

    struct StallingPage {
        reads: usize,
        closed: Arc<Mutex<usize>>,
    }

    #[async_trait]
    impl LoadedPage for StallingPage {
        async fn html(&mut self) -> Result<String> {
            self.reads += 1;
            if self.reads == 1 {
                return Ok(CHALLENGE.to_string());
            }
            futures::future::pending().await
        }

        async fn close(&mut self) {
            *self.closed.lock() += 1;
        }
    }

    #[async_trait]
    impl PageLoader for StallingLoader {
        async fn open(&self, url: &str) -> Result<Box<dyn LoadedPage>> {
            self.opened.lock().push(url.to_string());
            Ok(Box::new(StallingPage {
                reads: 0,
                closed: self.closed.clone(),
            }))
        }
    }

    #[tokio::test]
    async fn stalled_reread_times_out_and_moves_to_next_mirror() {
        let loader = StallingLoader::default();
        let config = FetchConfig {
            mode: FetchMode::Http,
            page_timeout: Duration::from_millis(100),
            selector_timeout: Duration::ZERO,
            settle_delay: Duration::ZERO,
            challenge_wait: Duration::ZERO,
        };
        let fetcher = MirrorFetcher::new(
            loader.clone(),
            vec!["https://a.example".to_string(), "https://b.example".to_string()],
            PostExtractor::new("https://twitter.com").unwrap(),
            &config,
        );

        let fetched = timeout(Duration::from_secs(3), fetcher.fetch("user"))
            .await
            .expect("fetch should be bounded by the page timeout");
        assert_eq!(fetched, None);
        assert_eq!(
            *loader.opened.lock(),
            vec![
                "https://a.example/user".to_string(),
                "https://b.example/user".to_string(),
            ]
        );
        assert_eq!(*loader.closed.lock(), 2);
    }

    #[test]
    fn builds_profile_urls() {
        assert_eq!(profile_url("nitter.net", "a"), "https://nitter.net/a");
        assert_eq!(profile_url("http://x.local/", "@a"), "http://x.local/a");
    }
}
