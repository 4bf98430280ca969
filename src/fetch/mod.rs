use anyhow::Result;
use async_trait::async_trait;

pub mod browser;
pub mod http;
pub mod mirror;

pub use browser::BrowserLoader;
pub use http::HttpLoader;
pub use mirror::MirrorFetcher;

/// Desktop browser identity presented to mirrors.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Source of timeline markup for an account.
#[async_trait]
pub trait TimelineFetcher: Send + Sync {
    /// Markup holding at least one post, or `None` when every source failed.
    async fn fetch(&self, account: &str) -> Option<String>;

    /// Releases held external resources. Safe to call more than once.
    async fn release(&self) {}
}

/// Opens pages by url.
#[async_trait]
pub trait PageLoader: Send + Sync {
    async fn open(&self, url: &str) -> Result<Box<dyn LoadedPage>>;

    async fn release(&self) {}
}

#[async_trait]
pub trait LoadedPage: Send {
    /// Current markup of the page. Calling again re-reads it.
    async fn html(&mut self) -> Result<String>;

    async fn close(&mut self) {}
}
