//! Append-only output tables.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream::BoxStream;
use metrics::gauge;
use tracing::debug;

use crate::log::RecordLog;
use crate::metrics::{SILVER_TABLE_ROWS, TABLE_LABEL};
use crate::types::{Record, RowChange};

/// Table that only ever grows, keeping rows in the order they were appended.
///
/// Cloning returns a handle to the same table.
#[derive(Debug, Clone)]
pub struct AppendOnlyTable {
    name: Arc<str>,
    rows: RecordLog<Record>,
}

impl AppendOnlyTable {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            rows: RecordLog::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends `records` in order and returns the offset of the first one.
    pub fn append_batch(&self, records: Vec<Record>) -> u64 {
        let appended = records.len();
        let first = self.rows.extend(records);

        if appended > 0 {
            gauge!(SILVER_TABLE_ROWS, TABLE_LABEL => self.name.to_string()).set(self.len() as f64);
        }

        first
    }

    /// Returns every row in append order.
    pub fn snapshot(&self) -> Vec<Record> {
        self.rows.to_vec()
    }

    /// Returns the rows appended at or after row `from`.
    pub fn rows_from(&self, from: u64) -> Vec<Record> {
        self.rows
            .read(from, usize::MAX)
            .into_iter()
            .map(|(_, record)| record)
            .collect()
    }

    /// Loads previously snapshotted rows.
    ///
    /// Only meaningful on an empty table, as it happens on startup.
    pub fn restore(&self, rows: Vec<Record>) -> usize {
        let restored = rows.len();
        self.append_batch(rows);
        debug!(table = %self.name, rows = restored, "restored append-only table");

        restored
    }

    pub fn len(&self) -> usize {
        self.rows.len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Streams appended rows as inserts, starting at row offset `from`.
    pub fn read_changes(&self, from: u64) -> BoxStream<'static, (u64, RowChange)> {
        self.rows
            .stream_from(from)
            .map(|(offset, record)| (offset, RowChange::insert(record)))
            .boxed()
    }

    /// Ends change streams once they have caught up.
    pub fn close(&self) {
        self.rows.close();
    }
}
