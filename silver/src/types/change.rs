use serde::{Deserialize, Serialize};

use crate::types::Record;

/// Kind of change written to a table's change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// A row was appended, or a new key entered a current-state table.
    Insert,
    /// The row of an existing key was replaced.
    Update,
}

/// An accepted change to an output table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowChange {
    pub kind: ChangeKind,
    /// The row as stored after the change.
    pub record: Record,
}

impl RowChange {
    pub fn insert(record: Record) -> Self {
        Self {
            kind: ChangeKind::Insert,
            record,
        }
    }

    pub fn update(record: Record) -> Self {
        Self {
            kind: ChangeKind::Update,
            record,
        }
    }
}
