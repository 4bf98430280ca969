use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use chrono_tz::Tz;

use super::env::{
    AlertConfig, AppConfig, ConfigError, DirectoryConfig, FetchConfig, FileConfig, LoggingConfig,
};

const DEFAULT_CONFIG_PATH: &str = "config.json";

pub fn load_config() -> Result<AppConfig, ConfigError> {
    let path = env::var("MONITOR_CONFIG")
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    AppConfig::from_file(&path)
}

impl AppConfig {
    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: FileConfig = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let directories = DirectoryConfig {
            logs_dir: env::var("LOGS_DIR").unwrap_or_else(|_| "logs".to_string()),
        };
        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        };

        Self::from_parts(file, directories, logging)
    }

    pub(crate) fn from_parts(
        file: FileConfig,
        directories: DirectoryConfig,
        logging: LoggingConfig,
    ) -> Result<Self, ConfigError> {
        let accounts = clean_list(file.twitter_accounts, |handle| {
            handle.trim_start_matches('@').to_string()
        });
        if accounts.is_empty() {
            return Err(ConfigError::Invalid(
                "twitter_accounts must list at least one handle".into(),
            ));
        }

        let instances = clean_list(file.nitter_instances, |base| {
            base.trim_end_matches('/').to_string()
        });
        if instances.is_empty() {
            return Err(ConfigError::Invalid(
                "nitter_instances must list at least one mirror".into(),
            ));
        }

        if file.check_interval == 0 {
            return Err(ConfigError::Invalid(
                "check_interval must be greater than zero".into(),
            ));
        }

        if file.timezone.parse::<Tz>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "unknown timezone {}",
                file.timezone
            )));
        }

        let fetch = FetchConfig {
            mode: file.fetch_mode,
            page_timeout: Duration::from_secs(file.page_timeout),
            selector_timeout: Duration::from_secs(file.selector_timeout),
            settle_delay: Duration::from_secs(file.settle_delay),
            challenge_wait: Duration::from_secs(file.challenge_wait),
        };

        let alert = AlertConfig {
            webhook_url: file
                .fwalert_webhook_url
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            title: file.notification_title.filter(|v| !v.trim().is_empty()),
            dispatch_delay: Duration::from_secs(file.dispatch_delay),
            webhook_timeout: Duration::from_secs(file.webhook_timeout),
        };

        Ok(Self {
            accounts,
            instances,
            check_interval: Duration::from_secs(file.check_interval),
            fetch,
            alert,
            directories,
            logging,
            timezone: file.timezone,
            link_base: file.link_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn tz(&self) -> Tz {
        self.timezone.parse().unwrap_or(chrono_tz::UTC)
    }
}

fn clean_list(values: Vec<String>, normalize: impl Fn(&str) -> String) -> Vec<String> {
    values
        .iter()
        .map(|value| normalize(value.trim()))
        .filter(|value| !value.is_empty())
        .collect()
}
