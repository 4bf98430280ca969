mod alert;
mod app;
mod config;
mod domain;
mod fetch;
mod infrastructure;
mod tasks;
mod timeline;

use anyhow::Result;
use infrastructure::{directories, logging, shutdown};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = config::load_config()?;
    let paths = directories::ensure_directories(&config.directories)?;
    logging::init_tracing(&config, &paths)?;

    let (shutdown, _) = shutdown::Shutdown::new();
    shutdown::install_signal_handlers(shutdown.clone());

    let app = app::MonitorApp::initialize(config, shutdown).await?;
    app.run().await
}
