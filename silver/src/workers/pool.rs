use std::future::Future;

use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info_span};

use crate::concurrency::shutdown::ShutdownTx;
use crate::error::{ErrorKind, SilverResult};
use crate::silver_error;

/// Owns the tasks of every table worker of a pipeline.
///
/// A worker failing sends the shutdown signal, so the remaining workers commit their current
/// batch and stop instead of running on without it.
#[derive(Debug)]
pub struct WorkerPool {
    join_set: JoinSet<(String, SilverResult<()>)>,
    shutdown_tx: ShutdownTx,
}

impl WorkerPool {
    pub fn new(shutdown_tx: ShutdownTx) -> Self {
        Self {
            join_set: JoinSet::new(),
            shutdown_tx,
        }
    }

    /// Spawns the worker of `table` into the pool.
    pub fn spawn<F>(&mut self, table: impl Into<String>, future: F)
    where
        F: Future<Output = SilverResult<()>> + Send + 'static,
    {
        let table = table.into();
        let shutdown_tx = self.shutdown_tx.clone();
        let span = info_span!("table_worker", table = %table);

        debug!(%table, "spawning worker in pool");

        self.join_set.spawn(
            async move {
                let result = future.await;
                if let Err(err) = &result {
                    error!(%table, error = %err, "table worker failed, shutting down the pipeline");

                    // Fails only when every other worker is already gone.
                    let _ = shutdown_tx.shutdown();
                }

                (table, result)
            }
            .instrument(span),
        );
    }

    pub fn len(&self) -> usize {
        self.join_set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.join_set.is_empty()
    }

    /// Waits for every worker to complete, collecting their errors.
    pub async fn wait_all(&mut self) -> SilverResult<()> {
        let mut errors = Vec::new();

        while let Some(result) = self.join_set.join_next().await {
            match result {
                Ok((table, Ok(()))) => {
                    debug!(%table, "worker completed");
                }
                Ok((_, Err(err))) => {
                    errors.push(err);
                }
                Err(join_err) => {
                    if join_err.is_cancelled() {
                        debug!("worker task was cancelled");
                    } else {
                        let _ = self.shutdown_tx.shutdown();
                        errors.push(silver_error!(
                            ErrorKind::TableWorkerPanic,
                            "Table worker panicked",
                            join_err
                        ));
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.into())
        }
    }
}
