use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use reqwest::Client;

use crate::{
    alert::{AlertSink, FwalertSink},
    config::{AppConfig, FetchMode},
    domain::MonitorState,
    fetch::{BrowserLoader, HttpLoader, MirrorFetcher, TimelineFetcher, USER_AGENT},
    infrastructure::shutdown::Shutdown,
    tasks::{Monitor, MonitorSettings},
    timeline::PostExtractor,
};

pub struct MonitorApp {
    config: Arc<AppConfig>,
    monitor: Monitor,
    fetcher: Arc<dyn TimelineFetcher>,
    sink_enabled: bool,
    shutdown: Shutdown,
}

impl MonitorApp {
    pub async fn initialize(config: AppConfig, shutdown: Shutdown) -> Result<Self> {
        let config = Arc::new(config);
        let start_time = Utc::now();

        let extractor = PostExtractor::new(&config.link_base)?;

        let fetcher: Arc<dyn TimelineFetcher> = match config.fetch.mode {
            FetchMode::Browser => Arc::new(MirrorFetcher::new(
                BrowserLoader::new(config.fetch.clone()),
                config.instances.clone(),
                extractor.clone(),
                &config.fetch,
            )),
            FetchMode::Http => {
                let page_client = Client::builder()
                    .user_agent(USER_AGENT)
                    .timeout(config.fetch.page_timeout)
                    .build()?;
                Arc::new(MirrorFetcher::new(
                    HttpLoader::new(page_client),
                    config.instances.clone(),
                    extractor.clone(),
                    &config.fetch,
                ))
            }
        };

        let webhook_client = Client::builder()
            .user_agent(format!("twitter-monitor-rust/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        let fwalert = FwalertSink::new(webhook_client, config.alert.clone());
        let sink_enabled = fwalert.is_enabled();
        let sink: Arc<dyn AlertSink> = Arc::new(fwalert);

        let monitor = Monitor::new(
            fetcher.clone(),
            sink,
            extractor,
            MonitorState::new(start_time),
            MonitorSettings::from_config(&config),
        );

        Ok(Self {
            config,
            monitor,
            fetcher,
            sink_enabled,
            shutdown,
        })
    }

    pub async fn run(self) -> Result<()> {
        let MonitorApp {
            config,
            monitor,
            fetcher,
            sink_enabled,
            shutdown,
        } = self;

        let started = monitor
            .state()
            .start_time()
            .with_timezone(&config.tz())
            .format("%Y-%m-%d %H:%M:%S %Z");
        let accounts = config
            .accounts
            .iter()
            .map(|a| format!("@{a}"))
            .collect::<Vec<_>>()
            .join(", ");
        tracing::info!(
            target: "lifecycle",
            accounts = %accounts,
            interval = ?config.check_interval,
            mirrors = config.instances.len(),
            mode = ?config.fetch.mode,
            started = %started,
            "twitter monitor started; alerting only on posts published after start"
        );
        if !sink_enabled {
            tracing::warn!(
                target: "lifecycle",
                "fwalert_webhook_url is not set; new posts will be logged but not dispatched"
            );
        }

        let handle = tokio::spawn(monitor.run(shutdown.subscribe()));
        if let Err(err) = handle.await {
            if err.is_panic() {
                tracing::error!(target: "lifecycle", "monitor task panicked");
            } else {
                tracing::error!(target: "lifecycle", error = %err, "monitor task aborted");
            }
        }

        shutdown.trigger();
        fetcher.release().await;
        tracing::info!(target: "lifecycle", "twitter monitor stopped");
        Ok(())
    }
}
