use std::pin::pin;
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use metrics::{counter, histogram};
use silver_config::shared::BatchConfig;
use tracing::{debug, error, info};

use crate::concurrency::shutdown::{ShutdownResult, ShutdownRx};
use crate::concurrency::stream::BatchStream;
use crate::error::SilverResult;
use crate::metrics::{SILVER_BATCH_DURATION_SECONDS, SILVER_RECORDS_PROCESSED_TOTAL, TABLE_LABEL};
use crate::operator::TableOperator;
use crate::source::{Source, SourceRecord};
use crate::store::{StateStore, TableCheckpoint};
use crate::table::OutputTable;

/// Worker feeding one output table from its source.
///
/// On start the worker restores the table from its last checkpoint and reads the source from the
/// checkpointed offset. Each batch is processed and then committed as a single checkpoint holding
/// the table rows and the next offset, so redelivered records after a crash are either already
/// reflected in the restored rows or not at all. Append tables commit only the rows their batch
/// added.
#[derive(Debug)]
pub struct TableWorker<S> {
    source: Arc<dyn Source>,
    operator: TableOperator,
    store: S,
    batch_config: BatchConfig,
    shutdown_rx: ShutdownRx,
}

impl<S> TableWorker<S>
where
    S: StateStore + Clone + Send + Sync + 'static,
{
    pub fn new(
        source: Arc<dyn Source>,
        operator: TableOperator,
        store: S,
        batch_config: BatchConfig,
        shutdown_rx: ShutdownRx,
    ) -> Self {
        Self {
            source,
            operator,
            store,
            batch_config,
            shutdown_rx,
        }
    }

    /// Runs until the source ends, the shutdown signal is received or an error occurs.
    pub async fn run(self) -> SilverResult<()> {
        let table = self.operator.table();

        info!(
            table = %table.name(),
            source = %self.source.name(),
            "starting table worker"
        );

        let mut checkpoint = self.restore(&table).await?;

        // The record stream ends on shutdown, which also wakes a worker waiting on an idle source.
        let mut shutdown_rx = self.shutdown_rx.clone();
        let records = self
            .source
            .read_stream(checkpoint.next_offset)
            .take_until(async move {
                let _ = shutdown_rx.changed().await;
            });
        let mut batches = pin!(BatchStream::wrap(
            records,
            self.batch_config.clone(),
            self.shutdown_rx.clone()
        ));

        while let Some(batch) = batches.next().await {
            let (items, shutting_down) = match batch {
                ShutdownResult::Ok(items) => (items, false),
                ShutdownResult::Shutdown(items) => (items, true),
            };

            self.process_batch(&table, &mut checkpoint, items).await?;

            if shutting_down {
                info!(table = %table.name(), "shutting down table worker");
                break;
            }
        }

        table.close();

        info!(
            table = %table.name(),
            next_offset = checkpoint.next_offset,
            "table worker completed"
        );

        Ok(())
    }

    async fn restore(&self, table: &OutputTable) -> SilverResult<TableCheckpoint> {
        let Some(mut checkpoint) = self.store.load_checkpoint(table.name()).await? else {
            debug!(table = %table.name(), "no checkpoint found, starting from the beginning");
            return Ok(TableCheckpoint::new(table.name()));
        };

        let rows = table.restore(std::mem::take(&mut checkpoint.rows));
        if let OutputTable::Append(append) = table {
            checkpoint.row_count = append.len() as u64;
        }

        info!(
            table = %table.name(),
            rows,
            next_offset = checkpoint.next_offset,
            "restored table from checkpoint"
        );

        Ok(checkpoint)
    }

    /// Processes the records of a batch and commits the result.
    ///
    /// Records up to the first source error are processed and committed before the error is
    /// returned.
    async fn process_batch(
        &self,
        table: &OutputTable,
        checkpoint: &mut TableCheckpoint,
        items: Vec<SilverResult<SourceRecord>>,
    ) -> SilverResult<()> {
        let started = Instant::now();

        let mut records = Vec::with_capacity(items.len());
        let mut next_offset = checkpoint.next_offset;
        let mut source_error = None;
        for item in items {
            match item {
                Ok(source_record) => {
                    next_offset = source_record.offset + 1;
                    records.push(source_record.record);
                }
                Err(err) => {
                    source_error = Some(err);
                    break;
                }
            }
        }

        if !records.is_empty() {
            let batch_size = records.len();
            let summary = self.operator.process(records).await?;

            match table {
                OutputTable::Append(rows) => {
                    let appended = rows.rows_from(checkpoint.row_count);
                    checkpoint.update_appended(next_offset, appended, batch_size as u64);
                }
                OutputTable::CurrentState(rows) => {
                    checkpoint.update(next_offset, rows.snapshot(), batch_size as u64);
                }
            }
            self.store.store_checkpoint(checkpoint.clone()).await?;
            checkpoint.rows = Vec::new();

            counter!(SILVER_RECORDS_PROCESSED_TOTAL, TABLE_LABEL => table.name().to_string())
                .increment(batch_size as u64);
            histogram!(SILVER_BATCH_DURATION_SECONDS, TABLE_LABEL => table.name().to_string())
                .record(started.elapsed().as_secs_f64());

            debug!(
                table = %table.name(),
                received = summary.received,
                emitted = summary.emitted,
                next_offset,
                "committed batch"
            );
        }

        if let Some(err) = source_error {
            error!(table = %table.name(), error = %err, "source failed");
            return Err(err);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use silver_config::shared::TransformConfig;

    use super::*;
    use crate::append::AppendOnlyTable;
    use crate::concurrency::shutdown::{ShutdownTx, create_shutdown_channel};
    use crate::operator::TableSink;
    use crate::source::memory::MemorySource;
    use crate::store::memory::MemoryStateStore;
    use crate::transform::{MonotonicClock, TransformStage};
    use crate::types::Record;

    /// Memory store remembering how many rows every commit carried.
    #[derive(Debug, Clone, Default)]
    struct RecordingStore {
        inner: MemoryStateStore,
        committed_rows: Arc<Mutex<Vec<usize>>>,
    }

    impl RecordingStore {
        fn take_committed_rows(&self) -> Vec<usize> {
            std::mem::take(&mut *self.committed_rows.lock().unwrap())
        }
    }

    impl StateStore for RecordingStore {
        async fn load_checkpoint(&self, table: &str) -> SilverResult<Option<TableCheckpoint>> {
            self.inner.load_checkpoint(table).await
        }

        async fn store_checkpoint(&self, checkpoint: TableCheckpoint) -> SilverResult<()> {
            self.committed_rows
                .lock()
                .unwrap()
                .push(checkpoint.rows.len());
            self.inner.store_checkpoint(checkpoint).await
        }
    }

    fn booking(id: i64) -> Record {
        Record::new().with("booking_id", id)
    }

    fn bookings_worker(
        source: &MemorySource,
        store: RecordingStore,
    ) -> (TableWorker<RecordingStore>, AppendOnlyTable, ShutdownTx) {
        let table = AppendOnlyTable::new("silver_bookings");
        let transform = TransformStage::new(
            "silver_bookings",
            &TransformConfig::default(),
            Arc::new(MonotonicClock::system()),
        );
        let operator = TableOperator::new(
            Arc::new(transform),
            None,
            TableSink::Append(table.clone()),
        );
        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();

        let worker = TableWorker::new(
            Arc::new(source.clone()),
            operator,
            store,
            BatchConfig {
                max_size: 4,
                max_fill_ms: 1_000,
            },
            shutdown_rx,
        );

        (worker, table, shutdown_tx)
    }

    #[tokio::test]
    async fn append_commits_carry_only_their_batch() {
        let source = MemorySource::new("bookings");
        source.extend((0..10).map(booking));
        source.close();
        let store = RecordingStore::default();

        let (worker, table, _shutdown_tx) = bookings_worker(&source, store.clone());
        worker.run().await.unwrap();

        let committed = store.take_committed_rows();
        assert_eq!(table.len(), 10);
        assert_eq!(committed.iter().sum::<usize>(), 10);
        assert!(committed.iter().all(|rows| *rows <= 4));

        source.extend([booking(10), booking(11)]);
        let (worker, table, _shutdown_tx) = bookings_worker(&source, store.clone());
        worker.run().await.unwrap();

        assert_eq!(store.take_committed_rows(), vec![2]);
        assert_eq!(table.len(), 12);

        let checkpoint = store
            .load_checkpoint("silver_bookings")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(checkpoint.rows.len(), 12);
        assert_eq!(checkpoint.row_count, 12);
        assert_eq!(checkpoint.next_offset, 12);
    }
}
