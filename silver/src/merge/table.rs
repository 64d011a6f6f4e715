use std::cmp::Ordering;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex, PoisonError};

use futures::StreamExt;
use futures::stream::BoxStream;
use metrics::gauge;
use silver_config::shared::MergeConfig;
use tokio::task::JoinSet;
use tracing::debug;

use crate::error::{ErrorKind, SilverError, SilverResult};
use crate::log::RecordLog;
use crate::merge::{BusinessKey, DropReason, MergeBatchResult, MergeOutcome, MergeStats};
use crate::metrics::{SILVER_TABLE_ROWS, TABLE_LABEL};
use crate::silver_error;
use crate::types::{Record, RowChange};

#[derive(Debug, Default)]
struct Shard {
    rows: HashMap<BusinessKey, Record>,
}

#[derive(Debug)]
struct Inner {
    name: Arc<str>,
    keys: Vec<String>,
    sequence_column: String,
    shards: Box<[Mutex<Shard>]>,
    changes: RecordLog<RowChange>,
    stats: Mutex<MergeStats>,
}

/// Current-state table with type 1 slowly changing dimension semantics.
///
/// Rows live in `N` shards keyed by [`BusinessKey`]. The compare-and-replace of a record happens
/// under the lock of its key's shard, so updates to one key are serialized while different shards
/// proceed in parallel. The change feed holds a bounded window of the most recent accepted
/// changes. Cloning returns a handle to the same table.
#[derive(Debug, Clone)]
pub struct CurrentStateTable {
    inner: Arc<Inner>,
}

impl CurrentStateTable {
    pub fn new(
        name: impl Into<Arc<str>>,
        keys: Vec<String>,
        sequence_column: impl Into<String>,
        shards: usize,
    ) -> Self {
        Self::with_change_feed_retention(
            name,
            keys,
            sequence_column,
            shards,
            MergeConfig::DEFAULT_CHANGE_FEED_RETENTION,
        )
    }

    /// Creates a table whose change feed keeps the `retention` most recent changes.
    pub fn with_change_feed_retention(
        name: impl Into<Arc<str>>,
        keys: Vec<String>,
        sequence_column: impl Into<String>,
        shards: usize,
        retention: usize,
    ) -> Self {
        let shards = (0..shards.max(1))
            .map(|_| Mutex::new(Shard::default()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                keys,
                sequence_column: sequence_column.into(),
                shards,
                changes: RecordLog::with_retention(retention),
                stats: Mutex::new(MergeStats::default()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn keys(&self) -> &[String] {
        &self.inner.keys
    }

    pub fn sequence_column(&self) -> &str {
        &self.inner.sequence_column
    }

    /// Applies a single change record and returns its outcome.
    pub fn apply(&self, record: Record) -> MergeOutcome {
        let outcome = self.merge_record(record);

        let mut result = MergeBatchResult::empty();
        result.record(outcome);
        self.record_result(&result);

        outcome
    }

    /// Applies a batch of change records.
    ///
    /// Records are partitioned by shard into at most `partitions` groups, each applied on its own
    /// task. Records of one key always land in the same group and keep their relative order.
    pub async fn apply_batch(
        &self,
        records: Vec<Record>,
        partitions: usize,
    ) -> SilverResult<MergeBatchResult> {
        let partitions = partitions.max(1);

        if partitions == 1 || records.len() < 2 {
            let mut result = MergeBatchResult::empty();
            for record in records {
                result.record(self.merge_record(record));
            }
            self.record_result(&result);

            return Ok(result);
        }

        let shard_count = self.inner.shards.len();
        let mut groups: Vec<Vec<Record>> = (0..partitions).map(|_| Vec::new()).collect();
        for record in records {
            // Keyless records are dropped by whichever group sees them.
            let group = BusinessKey::from_record(&record, &self.inner.keys)
                .map(|key| key.shard(shard_count) % partitions)
                .unwrap_or(0);
            groups[group].push(record);
        }

        let mut join_set = JoinSet::new();
        for group in groups.into_iter().filter(|group| !group.is_empty()) {
            let table = self.clone();
            join_set.spawn(async move {
                let mut result = MergeBatchResult::empty();
                for record in group {
                    result.record(table.merge_record(record));
                }

                result
            });
        }

        let mut total = MergeBatchResult::empty();
        let mut errors = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(result) => total.merge(&result),
                Err(err) => errors.push(silver_error!(
                    ErrorKind::MergeTaskPanic,
                    "Merge task failed",
                    format!("a merge task of table `{}` did not complete: {err}", self.name())
                )),
            }
        }

        // Whatever was applied before a failure is part of the table, so it is counted either way.
        self.record_result(&total);

        if !errors.is_empty() {
            return Err(SilverError::from(errors));
        }

        Ok(total)
    }

    /// Returns the row currently stored for `key`.
    pub fn get(&self, key: &BusinessKey) -> Option<Record> {
        let shard = self.lock_shard(key.shard(self.inner.shards.len()));
        shard.rows.get(key).cloned()
    }

    /// Returns the row currently stored for the key columns of `record`.
    pub fn get_for(&self, record: &Record) -> Option<Record> {
        let key = BusinessKey::from_record(record, &self.inner.keys)?;
        self.get(&key)
    }

    /// Returns every current row.
    ///
    /// Shards are copied one at a time, so the snapshot is consistent per key.
    pub fn snapshot(&self) -> Vec<Record> {
        let mut rows = Vec::new();
        for index in 0..self.inner.shards.len() {
            let shard = self.lock_shard(index);
            rows.extend(shard.rows.values().cloned());
        }

        rows
    }

    /// Loads previously snapshotted rows, returning how many were kept.
    ///
    /// Restored rows go through the same keep-max rule as live changes and are published on the
    /// change feed, but are not counted in [`CurrentStateTable::stats`].
    pub fn restore(&self, rows: Vec<Record>) -> usize {
        let mut restored = 0;
        for row in rows {
            if matches!(
                self.merge_record(row),
                MergeOutcome::Inserted | MergeOutcome::Replaced
            ) {
                restored += 1;
            }
        }

        gauge!(SILVER_TABLE_ROWS, TABLE_LABEL => self.name().to_string()).set(self.len() as f64);
        debug!(table = %self.inner.name, rows = restored, "restored current-state table");

        restored
    }

    pub fn len(&self) -> usize {
        (0..self.inner.shards.len())
            .map(|index| self.lock_shard(index).rows.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cumulative merge counts since the table was created.
    pub fn stats(&self) -> MergeStats {
        *self
            .inner
            .stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Streams accepted changes starting at offset `from` of the change feed.
    ///
    /// Changes older than the retained window are skipped.
    pub fn read_changes(&self, from: u64) -> BoxStream<'static, (u64, RowChange)> {
        self.inner.changes.stream_from(from).boxed()
    }

    /// Ends change feed streams once they have caught up.
    pub fn close(&self) {
        self.inner.changes.close();
    }

    /// Number of changes currently held by the change feed.
    pub fn retained_changes(&self) -> usize {
        self.inner.changes.retained()
    }

    fn lock_shard(&self, index: usize) -> std::sync::MutexGuard<'_, Shard> {
        self.inner.shards[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn merge_record(&self, record: Record) -> MergeOutcome {
        let Some(key) = BusinessKey::from_record(&record, &self.inner.keys) else {
            return MergeOutcome::Dropped(DropReason::MissingKey);
        };

        if record.value(&self.inner.sequence_column).is_null() {
            return MergeOutcome::Dropped(DropReason::MissingSequence);
        }

        let mut shard = self.lock_shard(key.shard(self.inner.shards.len()));
        match shard.rows.entry(key) {
            Entry::Vacant(entry) => {
                self.inner.changes.append(RowChange::insert(record.clone()));
                entry.insert(record);

                MergeOutcome::Inserted
            }
            Entry::Occupied(mut entry) => {
                let incoming = record.value(&self.inner.sequence_column);
                let stored = entry.get().value(&self.inner.sequence_column);

                match incoming.sequence_cmp(stored) {
                    Some(Ordering::Greater) => {
                        self.inner.changes.append(RowChange::update(record.clone()));
                        entry.insert(record);

                        MergeOutcome::Replaced
                    }
                    Some(_) => MergeOutcome::Discarded,
                    None => MergeOutcome::Dropped(DropReason::IncomparableSequence),
                }
            }
        }
    }

    fn record_result(&self, result: &MergeBatchResult) {
        if result.records_processed == 0 {
            return;
        }

        self.inner
            .stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .merge(result);

        result.emit_metrics(&self.inner.name);
        gauge!(SILVER_TABLE_ROWS, TABLE_LABEL => self.name().to_string()).set(self.len() as f64);
    }
}
