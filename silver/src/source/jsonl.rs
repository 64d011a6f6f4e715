//! Source tailing a JSON-lines file.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::{self, BoxStream};
use metrics::counter;
use serde_json::Value;
use silver_config::shared::{QUARANTINE_COLUMN_NAME, SourceConfig};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use crate::conversions::json::json_object_to_record;
use crate::error::{ErrorKind, SilverResult};
use crate::metrics::{SILVER_SOURCE_RESCUED_TOTAL, SOURCE_LABEL};
use crate::silver_error;
use crate::source::{Source, SourceRecord};
use crate::types::Record;

/// Source reading one JSON object per line from a file.
///
/// The offset of a record is its zero-based line number. Blank lines consume an offset but
/// produce no record. A line that is not a JSON object is delivered as a record holding only the
/// quarantine column with the raw text.
///
/// When following, the source waits for the file to exist, and at the end of the file polls for
/// appended lines every `poll_interval`; a trailing line without a newline is only delivered
/// once it is terminated. Otherwise the stream ends at the end of the file.
#[derive(Debug, Clone)]
pub struct JsonLinesSource {
    name: Arc<str>,
    path: PathBuf,
    poll_interval: Duration,
    follow: bool,
}

impl JsonLinesSource {
    pub fn new(name: impl Into<Arc<str>>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            poll_interval: Duration::from_millis(SourceConfig::DEFAULT_POLL_INTERVAL_MS),
            follow: true,
        }
    }

    pub fn from_config(name: impl Into<Arc<str>>, config: &SourceConfig) -> Self {
        Self::new(name, &config.path)
            .with_poll_interval(Duration::from_millis(config.poll_interval_ms))
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Controls whether the stream keeps waiting for new lines at the end of the file.
    pub fn with_follow(mut self, follow: bool) -> Self {
        self.follow = follow;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Source for JsonLinesSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_stream(&self, from: u64) -> BoxStream<'static, SilverResult<SourceRecord>> {
        let reader = LineReader {
            source: self.clone(),
            from,
            reader: None,
            next_line: 0,
            partial: Vec::new(),
            finished: false,
        };

        stream::unfold(reader, |mut reader| async move {
            let item = reader.next_record().await?;
            Some((item, reader))
        })
        .boxed()
    }
}

struct LineReader {
    source: JsonLinesSource,
    from: u64,
    reader: Option<BufReader<File>>,
    next_line: u64,
    partial: Vec<u8>,
    finished: bool,
}

impl LineReader {
    async fn next_record(&mut self) -> Option<SilverResult<SourceRecord>> {
        loop {
            if self.finished {
                return None;
            }

            if self.reader.is_none() {
                if let Err(err) = self.open().await {
                    self.finished = true;
                    return Some(Err(err));
                }

                continue;
            }

            let Some(reader) = self.reader.as_mut() else {
                continue;
            };

            if let Err(err) = reader.read_until(b'\n', &mut self.partial).await {
                self.finished = true;
                return Some(Err(silver_error!(
                    ErrorKind::SourceIoError,
                    "Failed to read source file",
                    self.source.path.display(),
                    source: err
                )));
            }

            if !self.partial.ends_with(b"\n") {
                // End of file, possibly in the middle of a line still being written.
                if self.source.follow {
                    tokio::time::sleep(self.source.poll_interval).await;
                    continue;
                }

                if self.partial.is_empty() {
                    return None;
                }

                self.finished = true;
            }

            let line = std::mem::take(&mut self.partial);
            let offset = self.next_line;
            self.next_line += 1;

            if offset < self.from {
                continue;
            }

            let text = String::from_utf8_lossy(&line);
            let text = text.trim_end_matches(['\n', '\r']);
            if text.trim().is_empty() {
                continue;
            }

            return Some(Ok(SourceRecord::new(offset, self.parse_line(offset, text))));
        }
    }

    /// Opens the file, waiting for it to appear when following.
    async fn open(&mut self) -> SilverResult<()> {
        match File::open(&self.source.path).await {
            Ok(file) => {
                debug!(
                    source = %self.source.name,
                    path = %self.source.path.display(),
                    "opened source file"
                );
                self.reader = Some(BufReader::new(file));

                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound && self.source.follow => {
                tokio::time::sleep(self.source.poll_interval).await;

                Ok(())
            }
            Err(err) => Err(silver_error!(
                ErrorKind::SourceIoError,
                "Failed to open source file",
                self.source.path.display(),
                source: err
            )),
        }
    }

    fn parse_line(&self, offset: u64, text: &str) -> Record {
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(object)) => json_object_to_record(object),
            Ok(_) => self.rescue(offset, text, "line is not a JSON object"),
            Err(err) => self.rescue(offset, text, &err.to_string()),
        }
    }

    fn rescue(&self, offset: u64, text: &str, reason: &str) -> Record {
        counter!(SILVER_SOURCE_RESCUED_TOTAL, SOURCE_LABEL => self.source.name.to_string())
            .increment(1);
        warn!(source = %self.source.name, offset, reason, "quarantined unparseable line");

        Record::new().with(QUARANTINE_COLUMN_NAME, text)
    }
}
