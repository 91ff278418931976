use std::sync::Arc;

use dotenvy::dotenv;
use engine::{
    prerequisites, telemetry, Config, ExternalToolchain, Orchestrator, StatusRecord, Toolchain,
    TriggerLoop,
};
use tokio::{net::TcpListener, signal::ctrl_c};
use tracing::{error, info};

use crate::app_state::{AppState, Shutdown};

mod app_state;
mod routes;
mod utils;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Arc::new(Config::from_env()?);
    telemetry::init("api", config.loki_url.as_deref())?;

    if !prerequisites::log_report(&prerequisites::check(&config)) {
        info!("Serving anyway; runs will fail until the missing pieces are in place");
    }

    let toolchain: Arc<dyn Toolchain> = Arc::new(ExternalToolchain::from_config(&config));
    let orchestrator = Orchestrator::new(Arc::new(StatusRecord::new()), toolchain.clone());

    let watcher = config.watch.enabled.then(|| {
        TriggerLoop::new(&config.watch.path, config.watch.interval, toolchain.clone()).spawn()
    });

    let shutdown = Shutdown::new();
    let app = routes::router(AppState::new(orchestrator, config.clone(), shutdown.clone()));
    let listener = TcpListener::bind(config.bind_addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    tokio::spawn({
        let shutdown = shutdown.clone();

        async move {
            if let Err(error) = ctrl_c().await {
                error!("Failed to listen for shutdown signal: {error:?}");
                return;
            }

            info!("Shutting down");
            shutdown.trigger();
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.wait())
        .await?;

    if let Some(watcher) = watcher {
        watcher.abort();
    }

    info!("Shut down");

    Ok(())
}
