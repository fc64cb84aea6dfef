mod ai;
mod app;
mod config;
mod domain;
mod infrastructure;
mod presenter;
mod store;
mod subscriptions;
mod tasks;
mod telegram;
mod validation;

use anyhow::Result;
use infrastructure::{directories, logging, shutdown};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = config::load_config()?;
    let paths = directories::ensure_directories(&config.directories, &config.storage)?;
    logging::init_tracing(&config, &paths)?;

    let shutdown = shutdown::Shutdown::new();
    shutdown::install_signal_handlers(shutdown.clone());

    let app = app::DigestApp::initialize(config, paths, shutdown.clone()).await?;
    app.run().await
}
