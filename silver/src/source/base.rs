use std::fmt;

use futures::stream::BoxStream;

use crate::error::SilverResult;
use crate::types::Record;

/// A raw record together with its position in the source log.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    /// Stable identity of the record, redelivering an offset yields the same record.
    pub offset: u64,
    pub record: Record,
}

impl SourceRecord {
    pub fn new(offset: u64, record: Record) -> Self {
        Self { offset, record }
    }
}

/// Durable, replayable, append-only log of raw records for one entity.
///
/// Implementations deliver records in offset order starting at any offset, then keep waiting
/// for new records. A stream only ends when the source knows no more records will arrive.
pub trait Source: fmt::Debug + Send + Sync {
    /// Returns the name of the source.
    fn name(&self) -> &str;

    /// Streams the records with an offset greater than or equal to `from`.
    ///
    /// An error item means the source became unavailable; the stream is not polled afterwards.
    fn read_stream(&self, from: u64) -> BoxStream<'static, SilverResult<SourceRecord>>;
}
