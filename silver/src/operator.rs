//! Per-table processing chain: transform, optional validation, then the table sink.

use std::sync::Arc;

use tracing::debug;

use crate::append::AppendOnlyTable;
use crate::error::SilverResult;
use crate::merge::{CurrentStateTable, MergeBatchResult};
use crate::table::OutputTable;
use crate::transform::TransformStage;
use crate::types::Record;
use crate::validation::RowValidator;

/// Where the records surviving a [`TableOperator`] end up.
#[derive(Debug, Clone)]
pub enum TableSink {
    Append(AppendOnlyTable),
    Merge {
        table: CurrentStateTable,
        /// Number of concurrent merge tasks per batch.
        partitions: usize,
    },
}

impl TableSink {
    pub fn table(&self) -> OutputTable {
        match self {
            TableSink::Append(table) => OutputTable::Append(table.clone()),
            TableSink::Merge { table, .. } => OutputTable::CurrentState(table.clone()),
        }
    }
}

/// Counts of one processed batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    /// Records handed to the operator.
    pub received: usize,
    /// Records that reached the sink.
    pub emitted: usize,
    /// Merge outcomes, for current-state sinks.
    pub merge: Option<MergeBatchResult>,
}

/// Processing chain of one output table.
#[derive(Debug, Clone)]
pub struct TableOperator {
    transform: Arc<TransformStage>,
    validator: Option<Arc<RowValidator>>,
    sink: TableSink,
}

impl TableOperator {
    pub fn new(
        transform: Arc<TransformStage>,
        validator: Option<Arc<RowValidator>>,
        sink: TableSink,
    ) -> Self {
        Self {
            transform,
            validator,
            sink,
        }
    }

    pub fn table(&self) -> OutputTable {
        self.sink.table()
    }

    pub fn transform(&self) -> &TransformStage {
        &self.transform
    }

    pub fn validator(&self) -> Option<&RowValidator> {
        self.validator.as_deref()
    }

    /// Runs `records` through the chain in arrival order.
    ///
    /// Fails only when the validator runs under the `fail` policy and a record violates a rule.
    /// In that case nothing of the batch reaches the sink.
    pub async fn process(&self, records: Vec<Record>) -> SilverResult<BatchSummary> {
        let received = records.len();

        let records = self.transform.apply_batch(records);
        let records = match &self.validator {
            Some(validator) => validator.validate_batch(records)?,
            None => records,
        };
        let emitted = records.len();

        let merge = match &self.sink {
            TableSink::Append(table) => {
                table.append_batch(records);
                None
            }
            TableSink::Merge { table, partitions } => {
                Some(table.apply_batch(records, *partitions).await?)
            }
        };

        debug!(
            table = %self.sink.table().name(),
            received,
            emitted,
            "processed batch"
        );

        Ok(BatchSummary {
            received,
            emitted,
            merge,
        })
    }
}
