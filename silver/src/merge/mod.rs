//! Change-data-capture merge into current-state tables.
//!
//! A [`CurrentStateTable`] keeps at most one row per business key. Every incoming record competes
//! with the stored row for its key on the sequence column: a strictly greater sequence replaces the
//! row, anything else is discarded. Records without a key or a usable sequence are dropped and
//! counted. Since the stored row is always the record with the greatest sequence seen so far, the
//! final state does not depend on delivery order or duplication.

mod key;
mod table;

use std::fmt;

use metrics::counter;

pub use key::BusinessKey;
pub use table::CurrentStateTable;

use crate::metrics::{OUTCOME_LABEL, SILVER_MERGE_OUTCOME_TOTAL, TABLE_LABEL};

/// Why a record was dropped by the merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    /// A key column is absent or null.
    MissingKey,
    /// The sequence column is absent or null.
    MissingSequence,
    /// The sequence cannot be ordered against the stored one.
    IncomparableSequence,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::MissingKey => "missing_key",
            DropReason::MissingSequence => "missing_sequence",
            DropReason::IncomparableSequence => "incomparable_sequence",
        }
    }
}

/// Effect of applying one record to a current-state table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MergeOutcome {
    /// The key was absent and the record was stored.
    Inserted,
    /// The record had a greater sequence and replaced the stored row.
    Replaced,
    /// The stored row has a greater or equal sequence, the record was ignored.
    Discarded,
    /// The record could not take part in the merge.
    Dropped(DropReason),
}

impl MergeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeOutcome::Inserted => "inserted",
            MergeOutcome::Replaced => "replaced",
            MergeOutcome::Discarded => "discarded",
            MergeOutcome::Dropped(reason) => reason.as_str(),
        }
    }
}

impl fmt::Display for MergeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-outcome counts of a merged batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeBatchResult {
    pub records_processed: usize,
    pub inserted: usize,
    pub replaced: usize,
    pub discarded: usize,
    pub dropped_missing_key: usize,
    pub dropped_missing_sequence: usize,
    pub dropped_incomparable: usize,
}

impl MergeBatchResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: MergeOutcome) {
        self.records_processed += 1;
        match outcome {
            MergeOutcome::Inserted => self.inserted += 1,
            MergeOutcome::Replaced => self.replaced += 1,
            MergeOutcome::Discarded => self.discarded += 1,
            MergeOutcome::Dropped(DropReason::MissingKey) => self.dropped_missing_key += 1,
            MergeOutcome::Dropped(DropReason::MissingSequence) => {
                self.dropped_missing_sequence += 1
            }
            MergeOutcome::Dropped(DropReason::IncomparableSequence) => {
                self.dropped_incomparable += 1
            }
        }
    }

    /// Adds the counts of `other` to this result.
    pub fn merge(&mut self, other: &MergeBatchResult) {
        self.records_processed += other.records_processed;
        self.inserted += other.inserted;
        self.replaced += other.replaced;
        self.discarded += other.discarded;
        self.dropped_missing_key += other.dropped_missing_key;
        self.dropped_missing_sequence += other.dropped_missing_sequence;
        self.dropped_incomparable += other.dropped_incomparable;
    }

    /// Total of dropped records, whatever the reason.
    pub fn dropped(&self) -> usize {
        self.dropped_missing_key + self.dropped_missing_sequence + self.dropped_incomparable
    }

    /// Records that changed the table.
    pub fn accepted(&self) -> usize {
        self.inserted + self.replaced
    }

    fn emit_metrics(&self, table: &str) {
        let counts = [
            (MergeOutcome::Inserted, self.inserted),
            (MergeOutcome::Replaced, self.replaced),
            (MergeOutcome::Discarded, self.discarded),
            (
                MergeOutcome::Dropped(DropReason::MissingKey),
                self.dropped_missing_key,
            ),
            (
                MergeOutcome::Dropped(DropReason::MissingSequence),
                self.dropped_missing_sequence,
            ),
            (
                MergeOutcome::Dropped(DropReason::IncomparableSequence),
                self.dropped_incomparable,
            ),
        ];

        for (outcome, count) in counts {
            if count > 0 {
                counter!(
                    SILVER_MERGE_OUTCOME_TOTAL,
                    TABLE_LABEL => table.to_string(),
                    OUTCOME_LABEL => outcome.as_str()
                )
                .increment(count as u64);
            }
        }
    }
}

/// Cumulative counts of a current-state table since it was created.
pub type MergeStats = MergeBatchResult;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_result_counts_outcomes() {
        let mut result = MergeBatchResult::empty();
        for outcome in [
            MergeOutcome::Inserted,
            MergeOutcome::Replaced,
            MergeOutcome::Discarded,
            MergeOutcome::Dropped(DropReason::MissingKey),
            MergeOutcome::Dropped(DropReason::MissingKey),
        ] {
            result.record(outcome);
        }

        let mut total = MergeBatchResult::empty();
        total.merge(&result);
        total.merge(&result);

        assert_eq!(total.records_processed, 10);
        assert_eq!(total.accepted(), 4);
        assert_eq!(total.dropped(), 4);
        assert_eq!(total.discarded, 2);
    }
}
