use std::sync::Arc;

use futures::StreamExt;
use futures::stream::BoxStream;

use crate::error::SilverResult;
use crate::log::RecordLog;
use crate::source::{Source, SourceRecord};
use crate::types::Record;

/// In-memory source for tests and development.
///
/// Records pushed to the source are visible to every stream, including streams opened earlier.
/// Cloning returns a handle to the same log.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: Arc<str>,
    log: RecordLog<Record>,
}

impl MemorySource {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            log: RecordLog::new(),
        }
    }

    /// Appends a record and returns its offset.
    pub fn push(&self, record: Record) -> u64 {
        self.log.append(record)
    }

    /// Appends records and returns the offset of the first one.
    pub fn extend<I>(&self, records: I) -> u64
    where
        I: IntoIterator<Item = Record>,
    {
        self.log.extend(records)
    }

    /// Ends the streams once they have delivered every record.
    pub fn close(&self) {
        self.log.close();
    }

    pub fn len(&self) -> u64 {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }
}

impl Source for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_stream(&self, from: u64) -> BoxStream<'static, SilverResult<SourceRecord>> {
        self.log
            .stream_from(from)
            .map(|(offset, record)| Ok(SourceRecord::new(offset, record)))
            .boxed()
    }
}
