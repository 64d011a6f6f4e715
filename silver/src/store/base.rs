use std::future::Future;

use crate::error::SilverResult;
use crate::store::TableCheckpoint;

/// Trait for persisting the checkpoints of output tables.
///
/// A checkpoint is written in a single call, so implementations must make it visible either
/// entirely or not at all. Implementations should handle concurrent calls for different tables.
///
/// A checkpoint with [`TableCheckpoint::appended_from`] set only carries the rows appended since
/// the previous commit. Stores keep the previous rows and return all of them on load.
pub trait StateStore {
    /// Returns the last committed checkpoint of `table`, if any, holding every committed row.
    fn load_checkpoint(
        &self,
        table: &str,
    ) -> impl Future<Output = SilverResult<Option<TableCheckpoint>>> + Send;

    /// Replaces the checkpoint of `checkpoint.table`.
    fn store_checkpoint(
        &self,
        checkpoint: TableCheckpoint,
    ) -> impl Future<Output = SilverResult<()>> + Send;
}
