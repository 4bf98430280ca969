use std::{path::PathBuf, time::Duration};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub accounts: Vec<String>,
    pub instances: Vec<String>,
    pub check_interval: Duration,
    pub fetch: FetchConfig,
    pub alert: AlertConfig,
    pub directories: DirectoryConfig,
    pub logging: LoggingConfig,
    pub timezone: String,
    pub link_base: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    Browser,
    Http,
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub mode: FetchMode,
    pub page_timeout: Duration,
    pub selector_timeout: Duration,
    pub settle_delay: Duration,
    pub challenge_wait: Duration,
}

#[derive(Debug, Clone)]
pub struct AlertConfig {
    pub webhook_url: Option<String>,
    pub title: Option<String>,
    pub dispatch_delay: Duration,
    pub webhook_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub logs_dir: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

/// Raw shape of `config.json`. Durations are whole seconds.
#[derive(Debug, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub twitter_accounts: Vec<String>,
    #[serde(default)]
    pub nitter_instances: Vec<String>,
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,
    #[serde(default)]
    pub fwalert_webhook_url: Option<String>,
    #[serde(default)]
    pub notification_title: Option<String>,
    #[serde(default = "default_fetch_mode")]
    pub fetch_mode: FetchMode,
    #[serde(default = "default_page_timeout")]
    pub page_timeout: u64,
    #[serde(default = "default_selector_timeout")]
    pub selector_timeout: u64,
    #[serde(default = "default_settle_delay")]
    pub settle_delay: u64,
    #[serde(default = "default_challenge_wait")]
    pub challenge_wait: u64,
    #[serde(default = "default_dispatch_delay")]
    pub dispatch_delay: u64,
    #[serde(default = "default_webhook_timeout")]
    pub webhook_timeout: u64,
    #[serde(default = "default_link_base")]
    pub link_base: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_check_interval() -> u64 {
    300
}

fn default_fetch_mode() -> FetchMode {
    FetchMode::Browser
}

fn default_page_timeout() -> u64 {
    60
}

fn default_selector_timeout() -> u64 {
    30
}

fn default_settle_delay() -> u64 {
    3
}

fn default_challenge_wait() -> u64 {
    10
}

fn default_dispatch_delay() -> u64 {
    3
}

fn default_webhook_timeout() -> u64 {
    30
}

fn default_link_base() -> String {
    "https://twitter.com".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
