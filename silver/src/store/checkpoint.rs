//! Checkpoints for resumable table workers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Record;

/// Committed progress of one output table.
///
/// The rows and the source offset are stored together, so a restarted worker resumes exactly
/// where the persisted rows stop: append tables never re-append and current-state tables never
/// regress.
///
/// Current-state tables commit all their rows every time. Append tables only commit the rows
/// appended since their previous commit, marked by `appended_from`. A loaded checkpoint always
/// carries every committed row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCheckpoint {
    /// Name of the output table.
    pub table: String,
    /// First source offset not yet reflected in `rows`.
    pub next_offset: u64,
    /// Committed rows, starting at row `appended_from` when it is set.
    pub rows: Vec<Record>,
    /// Position of the first row in `rows` when the rows before it are already committed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appended_from: Option<u64>,
    /// Rows of the table at the time of the commit.
    #[serde(default)]
    pub row_count: u64,
    /// Batches committed since the table was created.
    pub batches_committed: u64,
    /// Source records processed since the table was created.
    pub records_processed: u64,
    pub committed_at: DateTime<Utc>,
}

impl TableCheckpoint {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            next_offset: 0,
            rows: Vec::new(),
            appended_from: None,
            row_count: 0,
            batches_committed: 0,
            records_processed: 0,
            committed_at: Utc::now(),
        }
    }

    /// Records a committed batch of `batch_size` source records ending before `next_offset`,
    /// with `rows` being every row of the table.
    pub fn update(&mut self, next_offset: u64, rows: Vec<Record>, batch_size: u64) {
        self.row_count = rows.len() as u64;
        self.rows = rows;
        self.appended_from = None;
        self.advance(next_offset, batch_size);
    }

    /// Records a committed batch whose `rows` were appended after the previously committed rows.
    pub fn update_appended(&mut self, next_offset: u64, rows: Vec<Record>, batch_size: u64) {
        self.appended_from = Some(self.row_count);
        self.row_count += rows.len() as u64;
        self.rows = rows;
        self.advance(next_offset, batch_size);
    }

    fn advance(&mut self, next_offset: u64, batch_size: u64) {
        self.next_offset = next_offset;
        self.batches_committed += 1;
        self.records_processed += batch_size;
        self.committed_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_advances_progress() {
        let mut checkpoint = TableCheckpoint::new("silver_flights");
        checkpoint.update(10, vec![Record::new().with("flight_id", 1)], 10);
        checkpoint.update(12, vec![], 2);

        assert_eq!(checkpoint.next_offset, 12);
        assert_eq!(checkpoint.batches_committed, 2);
        assert_eq!(checkpoint.records_processed, 12);
        assert_eq!(checkpoint.row_count, 0);
        assert!(checkpoint.rows.is_empty());
    }

    #[test]
    fn appended_updates_carry_only_new_rows() {
        let mut checkpoint = TableCheckpoint::new("silver_bookings");
        checkpoint.update_appended(2, vec![Record::new(), Record::new()], 2);
        checkpoint.update_appended(5, vec![Record::new()], 3);

        assert_eq!(checkpoint.appended_from, Some(2));
        assert_eq!(checkpoint.rows.len(), 1);
        assert_eq!(checkpoint.row_count, 3);
        assert_eq!(checkpoint.next_offset, 5);
    }
}
