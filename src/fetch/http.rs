use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

use super::{LoadedPage, PageLoader};

/// Plain HTTP loader for mirrors that serve rendered markup without a JS challenge.
pub struct HttpLoader {
    client: Client,
}

impl HttpLoader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageLoader for HttpLoader {
    async fn open(&self, url: &str) -> Result<Box<dyn LoadedPage>> {
        let body = get_text(&self.client, url).await?;
        Ok(Box::new(HttpPage {
            client: self.client.clone(),
            url: url.to_string(),
            pending: Some(body),
        }))
    }
}

struct HttpPage {
    client: Client,
    url: String,
    pending: Option<String>,
}

#[async_trait]
impl LoadedPage for HttpPage {
    async fn html(&mut self) -> Result<String> {
        match self.pending.take() {
            Some(body) => Ok(body),
            None => get_text(&self.client, &self.url).await,
        }
    }
}

async fn get_text(client: &Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("failed to fetch {url}"))?
        .error_for_status()?;
    Ok(response.text().await?)
}
