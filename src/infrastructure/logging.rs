use std::io;

use anyhow::Result;
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::{
    config::{AppConfig, FetchMode},
    infrastructure::directories::ResolvedPaths,
};

const LOG_FILE_PREFIX: &str = "monitor.log";

/// chromiumoxide reports every CDP message it cannot decode at error level; that
/// is noise for a scraper, not a failure.
const BROWSER_DIRECTIVES: [&str; 2] = ["chromiumoxide::conn=off", "chromiumoxide::handler=warn"];

static INIT: OnceCell<()> = OnceCell::new();
static GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

/// Console plus daily-rolling file output. Logs are the monitor's only durable record.
pub fn init_tracing(config: &AppConfig, paths: &ResolvedPaths) -> Result<()> {
    INIT.get_or_try_init::<_, anyhow::Error>(|| {
        let env_filter = build_filter(&config.logging.level, config.fetch.mode);

        let file_appender = tracing_appender::rolling::daily(&paths.logs_dir, LOG_FILE_PREFIX);
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
        let _ = GUARD.set(guard);

        let console_layer = fmt::layer()
            .with_writer(io::stdout)
            .with_target(true)
            .with_ansi(true);

        let file_layer = fmt::layer()
            .with_writer(file_writer)
            .with_target(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .try_init()?;

        tracing::info!(
            target: "lifecycle",
            logs = %paths.logs_dir.display(),
            level = %config.logging.level,
            "tracing initialized"
        );
        Ok(())
    })?;
    Ok(())
}

/// `RUST_LOG` wins outright; otherwise the configured level, with browser
/// protocol chatter muted when pages are rendered through chromium.
fn build_filter(level: &str, mode: FetchMode) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let mut filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    if mode == FetchMode::Browser {
        for directive in BROWSER_DIRECTIVES {
            if let Ok(directive) = directive.parse() {
                filter = filter.add_directive(directive);
            }
        }
    }
    filter
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_mode_mutes_protocol_noise() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let browser = build_filter("debug", FetchMode::Browser).to_string();
        assert!(browser.contains("chromiumoxide::conn=off"));
        assert!(browser.contains("debug"));

        let http = build_filter("debug", FetchMode::Http).to_string();
        assert!(!http.contains("chromiumoxide"));
    }
}
