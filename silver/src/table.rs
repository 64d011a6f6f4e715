//! Output tables produced by a pipeline.

use futures::stream::BoxStream;

use crate::append::AppendOnlyTable;
use crate::merge::CurrentStateTable;
use crate::types::{Record, RowChange};

/// Handle to an output table, whatever its mode.
#[derive(Debug, Clone)]
pub enum OutputTable {
    Append(AppendOnlyTable),
    CurrentState(CurrentStateTable),
}

impl OutputTable {
    pub fn name(&self) -> &str {
        match self {
            OutputTable::Append(table) => table.name(),
            OutputTable::CurrentState(table) => table.name(),
        }
    }

    pub fn snapshot(&self) -> Vec<Record> {
        match self {
            OutputTable::Append(table) => table.snapshot(),
            OutputTable::CurrentState(table) => table.snapshot(),
        }
    }

    /// Loads checkpointed rows into an empty table.
    pub fn restore(&self, rows: Vec<Record>) -> usize {
        match self {
            OutputTable::Append(table) => table.restore(rows),
            OutputTable::CurrentState(table) => table.restore(rows),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            OutputTable::Append(table) => table.len(),
            OutputTable::CurrentState(table) => table.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn read_changes(&self, from: u64) -> BoxStream<'static, (u64, RowChange)> {
        match self {
            OutputTable::Append(table) => table.read_changes(from),
            OutputTable::CurrentState(table) => table.read_changes(from),
        }
    }

    pub fn close(&self) {
        match self {
            OutputTable::Append(table) => table.close(),
            OutputTable::CurrentState(table) => table.close(),
        }
    }

    pub fn as_current_state(&self) -> Option<&CurrentStateTable> {
        match self {
            OutputTable::CurrentState(table) => Some(table),
            OutputTable::Append(_) => None,
        }
    }

    pub fn as_append(&self) -> Option<&AppendOnlyTable> {
        match self {
            OutputTable::Append(table) => Some(table),
            OutputTable::CurrentState(_) => None,
        }
    }
}

impl From<AppendOnlyTable> for OutputTable {
    fn from(table: AppendOnlyTable) -> Self {
        OutputTable::Append(table)
    }
}

impl From<CurrentStateTable> for OutputTable {
    fn from(table: CurrentStateTable) -> Self {
        OutputTable::CurrentState(table)
    }
}
