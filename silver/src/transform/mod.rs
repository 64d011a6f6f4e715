//! Per-record normalization: quarantine removal, casts and processing-time stamping.

mod cast;
mod clock;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;
use silver_config::shared::{CastConfig, TransformConfig};
use tracing::debug;

pub use cast::{CastError, cast_cell};
pub use clock::{Clock, ManualClock, MonotonicClock, SystemClock};

use crate::metrics::{COLUMN_LABEL, SILVER_TRANSFORM_COERCION_FAILURES_TOTAL, TABLE_LABEL};
use crate::types::{Cell, Record};

/// Maps raw records to transformed records.
///
/// The stage is pure apart from the clock: it drops the configured columns, casts columns and
/// stamps the processing time. A value that cannot be cast is replaced by null and counted, the
/// record itself is never rejected.
#[derive(Debug)]
pub struct TransformStage {
    table: Arc<str>,
    casts: Vec<CastConfig>,
    drop_columns: Vec<String>,
    stamp_column: String,
    clock: Arc<dyn Clock>,
    coercion_failures: AtomicU64,
}

impl TransformStage {
    pub fn new(table: impl Into<Arc<str>>, config: &TransformConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            table: table.into(),
            casts: config.casts.clone(),
            drop_columns: config.drop_columns.clone(),
            stamp_column: config.stamp_column.clone(),
            clock,
            coercion_failures: AtomicU64::new(0),
        }
    }

    /// Returns the column holding the processing timestamp.
    pub fn stamp_column(&self) -> &str {
        &self.stamp_column
    }

    pub fn apply(&self, mut record: Record) -> Record {
        for column in &self.drop_columns {
            record.remove(column);
        }

        for cast in &self.casts {
            record.update(&cast.column, |cell| match cast_cell(cell, cast.to) {
                Ok(cell) => cell,
                Err(err) => {
                    self.coercion_failures.fetch_add(1, Ordering::Relaxed);
                    counter!(
                        SILVER_TRANSFORM_COERCION_FAILURES_TOTAL,
                        TABLE_LABEL => self.table.to_string(),
                        COLUMN_LABEL => cast.column.clone()
                    )
                    .increment(1);
                    debug!(table = %self.table, column = %cast.column, error = %err, "value nulled out");

                    Cell::Null
                }
            });
        }

        record.set(self.stamp_column.clone(), Cell::TimestampTz(self.clock.now()));

        record
    }

    /// Transforms every record of a batch, preserving order.
    pub fn apply_batch(&self, records: Vec<Record>) -> Vec<Record> {
        records.into_iter().map(|record| self.apply(record)).collect()
    }

    /// Number of values nulled out since creation.
    pub fn coercion_failures(&self) -> u64 {
        self.coercion_failures.load(Ordering::Relaxed)
    }
}
