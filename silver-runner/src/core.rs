use std::sync::Arc;
use std::time::Duration;

use silver::pipeline::{Pipeline, PipelineGraph};
use silver::source::Source;
use silver::source::jsonl::JsonLinesSource;
use silver::store::StateStore;
use silver::store::file::FileStateStore;
use silver::store::memory::MemoryStateStore;
use silver::table::OutputTable;
use silver::view::BusinessView;
use silver_config::shared::{RunnerConfig, StateStoreConfig};
use tokio::signal::unix::{SignalKind, signal};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Builds the pipeline described by `config` and runs it to completion.
pub async fn start_runner_with_config(config: RunnerConfig) -> anyhow::Result<()> {
    let graph = PipelineGraph::from_config(&config.pipeline, |entity| {
        let source = JsonLinesSource::from_config(entity.name.clone(), &entity.source);
        info!(
            entity = %entity.name,
            path = %source.path().display(),
            "reading entity from json lines file"
        );

        let source: Arc<dyn Source> = Arc::new(source);
        Ok(source)
    })?;

    let report_interval = Duration::from_millis(config.report_interval_ms);

    match &config.state_store {
        StateStoreConfig::Memory => {
            warn!("using the memory state store, progress is lost on restart");
            let pipeline = Pipeline::new(graph, MemoryStateStore::new());
            start_pipeline(pipeline, report_interval).await
        }
        StateStoreConfig::File { path } => {
            info!(path = %path, "using the file state store");
            let pipeline = Pipeline::new(graph, FileStateStore::new(path));
            start_pipeline(pipeline, report_interval).await
        }
    }
}

/// Starts a pipeline and shuts it down on SIGTERM or SIGINT.
///
/// Workers finish and commit the batch they are processing before stopping.
#[tracing::instrument(skip_all, fields(pipeline_id = %pipeline.id()))]
async fn start_pipeline<S>(mut pipeline: Pipeline<S>, report_interval: Duration) -> anyhow::Result<()>
where
    S: StateStore + Clone + Send + Sync + 'static,
{
    pipeline.start().await?;

    let shutdown_tx = pipeline.shutdown_tx();
    let shutdown_handle = tokio::spawn(async move {
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(err) => {
                error!(error = %err, "failed to register sigterm handler");
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("sigint (ctrl+c) received, shutting down pipeline");
            }
            _ = sigterm.recv() => {
                info!("sigterm received, shutting down pipeline");
            }
        }

        if let Err(err) = shutdown_tx.shutdown() {
            warn!(error = ?err, "failed to send shutdown signal");
        }
    });

    let tables = pipeline.graph().tables().cloned().collect::<Vec<_>>();
    let views = pipeline.graph().views().cloned().collect::<Vec<_>>();
    let report_handle = tokio::spawn(report_sizes(tables, views, report_interval));

    let result = pipeline.wait().await;

    // Both tasks may still be running when the sources ended on their own.
    shutdown_handle.abort();
    let _ = shutdown_handle.await;
    report_handle.abort();
    let _ = report_handle.await;

    result?;

    info!("pipeline finished");

    Ok(())
}

/// Periodically logs the number of rows of every table and view.
async fn report_sizes(tables: Vec<OutputTable>, views: Vec<BusinessView>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // The first tick completes immediately.
    interval.tick().await;

    loop {
        interval.tick().await;

        for table in &tables {
            info!(table = %table.name(), rows = table.len(), "table size");
        }

        for view in &views {
            info!(view = %view.name(), rows = view.len(), "view size");
        }
    }
}
