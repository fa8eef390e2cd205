//! tasks-server: serves the tasks API
//!
//! Usage: `tasks-server [config-path]` (default `config.toml`)

use anyhow::Context;
use lattice_tasks::{TasksConfig, application};
use std::net::SocketAddr;
use tracing::info;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config = TasksConfig::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path))?;

    // Flushes buffered log lines on exit
    let _guard = config.logging.to_log_config().init()?;

    let addr: SocketAddr = config
        .address()
        .parse()
        .with_context(|| format!("invalid listen address {}", config.address()))?;

    info!(
        config = %config_path,
        address = %addr,
        database = %config.database.name,
        "Starting tasks-server"
    );

    let app = application(&config)?;
    app.listen(addr).await?;

    info!("tasks-server stopped");
    Ok(())
}
