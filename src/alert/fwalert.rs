use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;

use crate::config::AlertConfig;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("no webhook url configured")]
    Disabled,
    #[error("webhook responded with HTTP {0}")]
    Status(StatusCode),
    #[error("webhook request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, brief: &str, details: &str) -> Result<(), SinkError>;
}

/// Webhook sink for fwalert: `brief` and `details` travel as query parameters.
pub struct FwalertSink {
    client: Client,
    config: AlertConfig,
}

impl FwalertSink {
    pub fn new(client: Client, config: AlertConfig) -> Self {
        Self { client, config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.webhook_url.is_some()
    }
}

#[async_trait]
impl AlertSink for FwalertSink {
    async fn send(&self, brief: &str, details: &str) -> Result<(), SinkError> {
        let Some(url) = self.config.webhook_url.as_deref() else {
            tracing::warn!(target: "alert", "fwalert webhook url is not configured; alert dropped");
            return Err(SinkError::Disabled);
        };

        let response = self
            .client
            .get(url)
            .query(&[("brief", brief), ("details", details)])
            .timeout(self.config.webhook_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Status(status));
        }
        tracing::info!(target: "alert", %status, "fwalert notification delivered");
        Ok(())
    }
}
