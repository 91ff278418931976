use std::sync::Arc;

use engine::{telemetry, Config, ExternalToolchain, TriggerLoop};
use tokio::signal::ctrl_c;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    telemetry::init("watcher", config.loki_url.as_deref())?;

    let toolchain = Arc::new(ExternalToolchain::from_config(&config));
    let watcher = TriggerLoop::new(&config.watch.path, config.watch.interval, toolchain).spawn();

    ctrl_c().await?;

    watcher.abort();
    info!("Stopped watching {}", config.watch.path.display());

    Ok(())
}
