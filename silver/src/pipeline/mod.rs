//! Running pipelines.

mod graph;

use tracing::{error, info};

pub use graph::{
    PipelineBuilder, PipelineGraph, SourcePort, StreamPort, TableNode, TablePort, ViewPort,
};

use crate::concurrency::shutdown::{ShutdownTx, create_shutdown_channel};
use crate::error::SilverResult;
use crate::metrics::register_metrics;
use crate::store::StateStore;
use crate::table::OutputTable;
use crate::view::BusinessView;
use crate::workers::pool::WorkerPool;
use crate::workers::table::TableWorker;

#[derive(Debug)]
enum PipelineState {
    NotStarted,
    Started { pool: WorkerPool },
}

/// Drives a [`PipelineGraph`], one worker per table.
#[derive(Debug)]
pub struct Pipeline<S> {
    graph: PipelineGraph,
    state_store: S,
    state: PipelineState,
    shutdown_tx: ShutdownTx,
}

impl<S> Pipeline<S>
where
    S: StateStore + Clone + Send + Sync + 'static,
{
    pub fn new(graph: PipelineGraph, state_store: S) -> Self {
        // Receivers are obtained from the sender through `subscribe`.
        let (shutdown_tx, _) = create_shutdown_channel();

        Self {
            graph,
            state_store,
            state: PipelineState::NotStarted,
            shutdown_tx,
        }
    }

    pub fn id(&self) -> &str {
        self.graph.id()
    }

    pub fn shutdown_tx(&self) -> ShutdownTx {
        self.shutdown_tx.clone()
    }

    pub fn graph(&self) -> &PipelineGraph {
        &self.graph
    }

    /// Returns a handle to the output table `name`.
    pub fn table(&self, name: &str) -> Option<OutputTable> {
        self.graph.table(name).cloned()
    }

    pub fn view(&self, name: &str) -> Option<&BusinessView> {
        self.graph.view(name)
    }

    /// Spawns a worker for every table.
    ///
    /// Starting an already started pipeline does nothing.
    pub async fn start(&mut self) -> SilverResult<()> {
        if let PipelineState::Started { .. } = self.state {
            info!(pipeline_id = %self.id(), "pipeline already started");
            return Ok(());
        }

        info!(
            pipeline_id = %self.id(),
            tables = self.graph.nodes().len(),
            "starting pipeline"
        );

        register_metrics();

        let mut pool = WorkerPool::new(self.shutdown_tx.clone());
        for node in self.graph.nodes() {
            let worker = TableWorker::new(
                node.source.clone(),
                node.operator.clone(),
                self.state_store.clone(),
                self.graph.batch().clone(),
                self.shutdown_tx.subscribe(),
            );

            pool.spawn(node.operator.table().name(), worker.run());
        }

        self.state = PipelineState::Started { pool };

        Ok(())
    }

    /// Waits for every worker to finish and returns their aggregated errors.
    pub async fn wait(self) -> SilverResult<()> {
        let PipelineState::Started { mut pool } = self.state else {
            info!("pipeline was not started, nothing to wait for");
            return Ok(());
        };

        info!(pipeline_id = %self.graph.id(), "waiting for table workers to complete");

        let result = pool.wait_all().await;
        if let Err(err) = &result {
            // We naively use the `kinds` as number of errors.
            error!(
                pipeline_id = %self.graph.id(),
                failed_workers = err.kinds().len(),
                "pipeline completed with errors"
            );
        } else {
            info!(pipeline_id = %self.graph.id(), "pipeline completed");
        }

        result
    }

    pub fn shutdown(&self) {
        info!("trying to shut down the pipeline");

        if let Err(err) = self.shutdown_tx.shutdown() {
            error!("failed to send shutdown signal to the pipeline: {}", err);
            return;
        }

        info!("shut down signal successfully sent to all workers");
    }

    pub async fn shutdown_and_wait(self) -> SilverResult<()> {
        self.shutdown();
        self.wait().await
    }
}
