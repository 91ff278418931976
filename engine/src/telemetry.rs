use std::process;

use thiserror::Error;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid Loki URL: {0}")]
    Url(#[from] tracing_loki::url::ParseError),
    #[error("failed to build Loki layer: {0}")]
    Loki(#[from] tracing_loki::Error),
    #[error("tracing subscriber already installed: {0}")]
    Install(#[from] tracing_subscriber::util::TryInitError),
}

/// Installs the fmt subscriber, plus a Loki layer when `loki_url` is set.
///
/// Must be called from within a tokio runtime when Loki is enabled.
pub fn init(service: &str, loki_url: Option<&str>) -> Result<(), TelemetryError> {
    let filter_layer = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer().with_target(false).with_line_number(true);

    let loki_layer = match loki_url {
        Some(url) => {
            let (layer, task) = tracing_loki::builder()
                .label("service", service)?
                .extra_field("pid", format!("{}", process::id()))?
                .build_url(url.parse()?)?;

            tokio::spawn(task);
            Some(layer)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .with(loki_layer)
        .try_init()?;

    Ok(())
}
