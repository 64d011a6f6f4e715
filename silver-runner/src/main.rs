//! Runner binary of the silver pipeline.
//!
//! Loads the configuration, initializes telemetry and drives the pipeline until its sources end
//! or a shutdown signal is received.

use anyhow::Context;
use silver_telemetry::metrics::init_metrics;
use silver_telemetry::tracing::init_tracing_with_top_level_fields;
use tracing::{error, info};

use crate::config::load_runner_config;
use crate::core::start_runner_with_config;

mod config;
mod core;

fn main() -> anyhow::Result<()> {
    let runner_config = load_runner_config()?;

    let _log_flusher = init_tracing_with_top_level_fields(
        env!("CARGO_BIN_NAME"),
        Some(&runner_config.pipeline.id),
    )
    .context("failed to initialize tracing")?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build the tokio runtime")?
        .block_on(async_main(runner_config))
}

async fn async_main(runner_config: silver_config::shared::RunnerConfig) -> anyhow::Result<()> {
    if let Some(metrics) = &runner_config.metrics {
        init_metrics(metrics.port, Some(&runner_config.pipeline.id))
            .context("failed to initialize metrics")?;
        info!(port = metrics.port, "serving metrics");
    }

    if let Err(err) = start_runner_with_config(runner_config).await {
        error!("{err:#}");
        return Err(err);
    }

    Ok(())
}
