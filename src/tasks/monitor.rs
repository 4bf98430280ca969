use std::{panic::AssertUnwindSafe, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use futures::FutureExt;
use tokio::time::sleep;

use crate::{
    alert::{format_alert, AlertSink, SinkError},
    config::AppConfig,
    domain::{MonitorState, Post},
    fetch::TimelineFetcher,
    infrastructure::shutdown::ShutdownListener,
    tasks::novelty::{self, Verdict},
    timeline::PostExtractor,
};

const BASELINE_PREVIEW: usize = 5;

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub accounts: Vec<String>,
    pub interval: Duration,
    pub title: Option<String>,
    pub dispatch_delay: Duration,
    pub timezone: Tz,
}

impl MonitorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            accounts: config.accounts.clone(),
            interval: config.check_interval,
            title: config.alert.title.clone(),
            dispatch_delay: config.alert.dispatch_delay,
            timezone: config.tz(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountReport {
    pub fetched: usize,
    pub baseline: bool,
    pub new_posts: usize,
    pub dispatched: usize,
}

/// Polls every tracked account once per interval and alerts on posts published
/// after `start_time` that were not alerted before.
pub struct Monitor {
    fetcher: Arc<dyn TimelineFetcher>,
    sink: Arc<dyn AlertSink>,
    extractor: PostExtractor,
    state: MonitorState,
    settings: MonitorSettings,
}

impl Monitor {
    pub fn new(
        fetcher: Arc<dyn TimelineFetcher>,
        sink: Arc<dyn AlertSink>,
        extractor: PostExtractor,
        state: MonitorState,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            fetcher,
            sink,
            extractor,
            state,
            settings,
        }
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    /// Runs cycles until shutdown. Shutdown is observed between cycles only, so an
    /// in-flight fetch is allowed to finish or time out.
    pub async fn run(mut self, mut shutdown: ShutdownListener) {
        loop {
            if shutdown.is_triggered() {
                break;
            }

            let cycle = AssertUnwindSafe(self.run_cycle()).catch_unwind().await;
            if cycle.is_err() {
                tracing::error!(target: "monitor", "poll cycle panicked; retrying after interval");
            }

            tokio::select! {
                _ = sleep(self.settings.interval) => {}
                _ = shutdown.notified() => break,
            }
        }
        tracing::info!(target: "monitor", seen = self.state.seen_count(), "monitor stopped");
    }

    pub async fn run_cycle(&mut self) -> Vec<AccountReport> {
        let accounts = self.settings.accounts.clone();
        let mut reports = Vec::with_capacity(accounts.len());
        for account in &accounts {
            tracing::info!(target: "monitor", account = %account, "checking account");
            let report = self.check_account_at(account, Utc::now()).await;
            reports.push(report);
        }
        reports
    }

    pub async fn check_account_at(&mut self, account: &str, now: DateTime<Utc>) -> AccountReport {
        let mut report = AccountReport::default();

        let Some(markup) = self.fetcher.fetch(account).await else {
            tracing::warn!(target: "monitor", account, "could not fetch timeline; skipping");
            return report;
        };
        let posts = self.extractor.extract(&markup, account);
        report.fetched = posts.len();
        if posts.is_empty() {
            tracing::warn!(target: "monitor", account, "timeline contained no posts; skipping");
            return report;
        }

        if self.state.is_first_run(account) {
            self.log_baseline(account, &posts);
            self.state.complete_first_run(account);
            report.baseline = true;
            return report;
        }

        let fresh = self.collect_new(account, posts, now);
        report.new_posts = fresh.len();
        if fresh.is_empty() {
            tracing::info!(target: "monitor", account, "no posts published since start");
            return report;
        }

        tracing::info!(target: "monitor", account, count = fresh.len(), "new posts found");
        // Timelines are newest first; alert in publication order.
        for post in fresh.into_iter().rev() {
            if !novelty::is_new(&post, &self.state, now) {
                continue;
            }
            novelty::mark_seen(&post, &mut self.state);
            if self.dispatch(&post).await {
                report.dispatched += 1;
            }
            sleep(self.settings.dispatch_delay).await;
        }
        report
    }

    fn collect_new(&self, account: &str, posts: Vec<Post>, now: DateTime<Utc>) -> Vec<Post> {
        let start = self.state.start_time();
        let mut fresh = Vec::new();
        for post in posts {
            match novelty::classify(&post, &self.state, now) {
                Verdict::New(published) => {
                    tracing::info!(
                        target: "monitor",
                        account,
                        token = %post.time_token,
                        age_secs = (now - published).num_seconds(),
                        since_start_secs = (published - start).num_seconds(),
                        "post published after start"
                    );
                    fresh.push(post);
                }
                Verdict::BeforeStart(published) => {
                    tracing::debug!(
                        target: "monitor",
                        account,
                        token = %post.time_token,
                        since_start_secs = (published - start).num_seconds(),
                        "post predates start"
                    );
                }
                Verdict::AlreadySeen => {}
                Verdict::Unparsable => {
                    tracing::warn!(
                        target: "monitor",
                        account,
                        token = %post.time_token,
                        preview = %preview(&post.content, 30),
                        "could not parse post time"
                    );
                }
            }
        }
        fresh
    }

    async fn dispatch(&self, post: &Post) -> bool {
        let message = format_alert(post, self.settings.title.as_deref());
        tracing::info!(
            target: "alert",
            account = %post.username,
            url = %post.url,
            content = %post.content,
            "dispatching alert"
        );

        match self.sink.send(&message.brief, &message.details).await {
            Ok(()) => true,
            Err(SinkError::Disabled) => false,
            Err(err) => {
                tracing::error!(target: "alert", url = %post.url, error = %err, "alert dispatch failed");
                false
            }
        }
    }

    fn log_baseline(&self, account: &str, posts: &[Post]) {
        let started = self
            .state
            .start_time()
            .with_timezone(&self.settings.timezone)
            .format("%Y-%m-%d %H:%M:%S %Z");
        tracing::info!(
            target: "monitor",
            account,
            scanned = posts.len(),
            started = %started,
            "baseline snapshot taken; only posts published after start will alert"
        );
        for (index, post) in posts.iter().take(BASELINE_PREVIEW).enumerate() {
            tracing::info!(
                target: "monitor",
                account,
                index = index + 1,
                time = %post.time_token,
                preview = %preview(&post.content, 80),
                "baseline post"
            );
        }
        if posts.len() > BASELINE_PREVIEW {
            tracing::info!(
                target: "monitor",
                account,
                remaining = posts.len() - BASELINE_PREVIEW,
                "more baseline posts not shown"
            );
        }
    }
}

fn preview(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use chrono::TimeDelta;
    use parking_lot::Mutex;
    use reqwest::StatusCode;

    use super::*;
    use crate::{
        domain::fingerprint,
        infrastructure::shutdown::Shutdown,
        timeline::extractor::tests::{item_html, page_html},
    };

    #[derive(Default)]
    struct FakeFetcher {
        pages: Mutex<HashMap<String, String>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        fn with(pages: &[(&str, String)]) -> Arc<Self> {
            let fetcher = Self::default();
            for (account, markup) in pages {
                fetcher
                    .pages
                    .lock()
                    .insert(account.to_string(), markup.clone());
            }
            Arc::new(fetcher)
        }
    }

    #[async_trait]
    impl TimelineFetcher for FakeFetcher {
        async fn fetch(&self, account: &str) -> Option<String> {
            self.calls.lock().push(account.to_string());
            self.pages.lock().get(account).cloned()
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        async fn send(&self, brief: &str, details: &str) -> Result<(), SinkError> {
            self.sent.lock().push((brief.to_string(), details.to_string()));
            if self.fail {
                return Err(SinkError::Status(StatusCode::BAD_GATEWAY));
            }
            Ok(())
        }
    }

    fn monitor(
        fetcher: Arc<FakeFetcher>,
        sink: Arc<RecordingSink>,
        accounts: &[&str],
        start: DateTime<Utc>,
    ) -> Monitor {
        Monitor::new(
            fetcher,
            sink,
            PostExtractor::new("https://twitter.com").unwrap(),
            MonitorState::new(start),
            MonitorSettings {
                accounts: accounts.iter().map(|a| a.to_string()).collect(),
                interval: Duration::from_millis(10),
                title: None,
                dispatch_delay: Duration::ZERO,
                timezone: chrono_tz::UTC,
            },
        )
    }

    fn single_post_page() -> String {
        page_html(&[item_html("/user/status/123", "Hello", "5m", "")])
    }

    #[tokio::test]
    async fn first_cycle_is_baseline_then_new_post_alerts_once() {
        let start = Utc::now();
        let now = start + TimeDelta::minutes(10);
        let fetcher = FakeFetcher::with(&[("user", single_post_page())]);
        let sink = Arc::new(RecordingSink::default());
        let mut monitor = monitor(fetcher, sink.clone(), &["user"], start);

        let first = monitor.check_account_at("user", now).await;
        assert!(first.baseline);
        assert_eq!(first.dispatched, 0);
        assert!(sink.sent.lock().is_empty());

        let second = monitor.check_account_at("user", now).await;
        assert_eq!(second.new_posts, 1);
        assert_eq!(second.dispatched, 1);
        {
            let sent = sink.sent.lock();
            assert_eq!(sent.len(), 1);
            let (brief, details) = &sent[0];
            assert_eq!(brief, "@user posted a new tweet");
            assert!(details.contains("Hello"));
            assert!(details.contains("https://twitter.com/user/status/123"));
        }
        assert!(monitor
            .state()
            .has_seen(&fingerprint("https://twitter.com/user/status/123")));

        let third = monitor.check_account_at("user", now).await;
        assert_eq!(third.new_posts, 0);
        assert_eq!(sink.sent.lock().len(), 1);
    }

    #[tokio::test]
    async fn historical_and_unparsable_posts_never_alert() {
        let start = Utc::now();
        let now = start + TimeDelta::minutes(10);
        let page = page_html(&[
            item_html("/user/status/1", "old", "3h", ""),
            item_html("/user/status/2", "edge", "10m", ""),
            item_html("/user/status/3", "broken", "", ""),
        ]);
        let fetcher = FakeFetcher::with(&[("user", page)]);
        let sink = Arc::new(RecordingSink::default());
        let mut monitor = monitor(fetcher, sink.clone(), &["user"], start);

        monitor.check_account_at("user", now).await;
        let report = monitor.check_account_at("user", now).await;

        assert_eq!(report.fetched, 3);
        assert_eq!(report.new_posts, 0);
        assert!(sink.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn new_posts_dispatch_oldest_first_and_survive_sink_failures() {
        let start = Utc::now() - TimeDelta::hours(1);
        let page = page_html(&[
            item_html("/user/status/2", "newer", "1m", ""),
            item_html("/user/status/1", "older", "20m", ""),
        ]);
        let fetcher = FakeFetcher::with(&[("user", page)]);
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..Default::default()
        });
        let mut monitor = monitor(fetcher, sink.clone(), &["user"], start);

        monitor.run_cycle().await;
        let reports = monitor.run_cycle().await;

        assert_eq!(reports[0].new_posts, 2);
        assert_eq!(reports[0].dispatched, 0);
        let sent = sink.sent.lock();
        assert!(sent[0].1.contains("older"));
        assert!(sent[1].1.contains("newer"));
        assert_eq!(monitor.state().seen_count(), 2);
    }

    #[tokio::test]
    async fn failed_account_does_not_abort_cycle() {
        let start = Utc::now() - TimeDelta::hours(1);
        let fetcher = FakeFetcher::with(&[("user", single_post_page())]);
        let sink = Arc::new(RecordingSink::default());
        let mut monitor = monitor(fetcher.clone(), sink.clone(), &["down", "user"], start);

        let baseline = monitor.run_cycle().await;
        assert_eq!(baseline[0], AccountReport::default());
        assert!(baseline[1].baseline);
        assert!(monitor.state().is_first_run("down"));

        let reports = monitor.run_cycle().await;
        assert_eq!(reports[1].dispatched, 1);
        assert_eq!(fetcher.calls.lock().len(), 4);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let fetcher = FakeFetcher::with(&[]);
        let sink = Arc::new(RecordingSink::default());
        let monitor = monitor(fetcher.clone(), sink, &["user"], Utc::now());
        let (shutdown, listener) = Shutdown::new();

        let handle = tokio::spawn(monitor.run(listener));
        sleep(Duration::from_millis(50)).await;
        shutdown.trigger();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("monitor stops promptly")
            .expect("monitor task completes");
        assert!(!fetcher.calls.lock().is_empty());
    }
}
