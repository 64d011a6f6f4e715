use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::bail;
use crate::error::{ErrorKind, SilverResult};
use crate::silver_error;
use crate::store::{StateStore, TableCheckpoint};
use crate::types::Record;

const CHECKPOINT_FILE_SUFFIX: &str = ".checkpoint.json";

const SEGMENT_FILE_SUFFIX: &str = ".rows.json";

/// State store keeping one JSON file per table in a directory.
///
/// Checkpoints are written to a temporary file which is then renamed over the previous one, so a
/// crash during a commit leaves the previous checkpoint intact.
///
/// Rows of append tables are written to segment files named after the position of their first
/// row, next to a checkpoint file holding only the progress. A commit costs the size of its
/// batch, not of the table. Segments at or beyond the committed row count are left over from an
/// interrupted commit and are ignored, then overwritten by the next commit.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    directory: PathBuf,
}

impl FileStateStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn checkpoint_path(&self, table: &str) -> SilverResult<PathBuf> {
        validate_table_name(table)?;

        Ok(self
            .directory
            .join(format!("{table}{CHECKPOINT_FILE_SUFFIX}")))
    }

    fn segment_path(&self, table: &str, first_row: u64) -> PathBuf {
        self.directory
            .join(format!("{table}.{first_row:020}{SEGMENT_FILE_SUFFIX}"))
    }

    /// Returns the first row position of every segment file of `table`, in order.
    async fn segment_starts(&self, table: &str) -> SilverResult<Vec<u64>> {
        let prefix = format!("{table}.");

        let mut starts = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.directory).await.map_err(|err| {
            silver_error!(
                ErrorKind::StateStoreError,
                "Failed to list checkpoint segments",
                self.directory.display(),
                source: err
            )
        })?;

        while let Some(entry) = entries.next_entry().await.map_err(|err| {
            silver_error!(
                ErrorKind::StateStoreError,
                "Failed to list checkpoint segments",
                self.directory.display(),
                source: err
            )
        })? {
            let file_name = entry.file_name();
            let Some(start) = file_name
                .to_str()
                .and_then(|name| name.strip_prefix(&prefix))
                .and_then(|name| name.strip_suffix(SEGMENT_FILE_SUFFIX))
                .and_then(|start| start.parse::<u64>().ok())
            else {
                continue;
            };

            starts.push(start);
        }

        starts.sort_unstable();

        Ok(starts)
    }

    /// Reads the first `row_count` committed rows of `table` from its segments.
    async fn load_segments(&self, table: &str, row_count: u64) -> SilverResult<Vec<Record>> {
        let mut rows = Vec::new();
        for start in self.segment_starts(table).await? {
            if start >= row_count {
                break;
            }

            if start != rows.len() as u64 {
                bail!(
                    ErrorKind::DeserializationError,
                    "Checkpoint segments are not contiguous",
                    format!(
                        "table `{table}` has {} rows before a segment starting at row {start}",
                        rows.len()
                    )
                );
            }

            let path = self.segment_path(table, start);
            let contents = read_file(&path).await?;
            let segment = serde_json::from_slice::<Vec<Record>>(&contents).map_err(|err| {
                silver_error!(
                    ErrorKind::DeserializationError,
                    "Failed to decode checkpoint segment",
                    path.display(),
                    source: err
                )
            })?;
            rows.extend(segment);
        }

        if (rows.len() as u64) < row_count {
            bail!(
                ErrorKind::DeserializationError,
                "Missing checkpoint segments",
                format!(
                    "table `{table}` committed {row_count} rows but its segments hold {}",
                    rows.len()
                )
            );
        }

        rows.truncate(usize::try_from(row_count).unwrap_or(usize::MAX));

        Ok(rows)
    }
}

fn validate_table_name(table: &str) -> SilverResult<()> {
    let is_plain_name = !table.is_empty()
        && table != "."
        && table != ".."
        && !table.contains(['/', '\\']);

    if !is_plain_name {
        bail!(
            ErrorKind::StateStoreError,
            "Invalid table name for file state store",
            format!("`{table}` cannot be used as a file name")
        );
    }

    Ok(())
}

async fn read_file(path: &Path) -> SilverResult<Vec<u8>> {
    tokio::fs::read(path).await.map_err(|err| {
        silver_error!(
            ErrorKind::StateStoreError,
            "Failed to read checkpoint",
            path.display(),
            source: err
        )
    })
}

/// Writes `contents` next to `path` and renames it over `path`.
async fn write_atomically(directory: &Path, path: &Path, contents: &[u8]) -> SilverResult<()> {
    let mut temp_path = path.as_os_str().to_owned();
    temp_path.push(".tmp");

    let write = async {
        tokio::fs::create_dir_all(directory).await?;
        tokio::fs::write(&temp_path, contents).await?;
        tokio::fs::rename(&temp_path, path).await
    };

    write.await.map_err(|err| {
        silver_error!(
            ErrorKind::StateStoreError,
            "Failed to write checkpoint",
            path.display(),
            source: err
        )
    })
}

impl StateStore for FileStateStore {
    async fn load_checkpoint(&self, table: &str) -> SilverResult<Option<TableCheckpoint>> {
        let path = self.checkpoint_path(table)?;

        let contents = match tokio::fs::read(&path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(silver_error!(
                    ErrorKind::StateStoreError,
                    "Failed to read checkpoint",
                    path.display(),
                    source: err
                ));
            }
        };

        let mut checkpoint =
            serde_json::from_slice::<TableCheckpoint>(&contents).map_err(|err| {
                silver_error!(
                    ErrorKind::DeserializationError,
                    "Failed to decode checkpoint",
                    path.display(),
                    source: err
                )
            })?;

        if checkpoint.appended_from.take().is_some() {
            checkpoint.rows = self.load_segments(table, checkpoint.row_count).await?;
        }

        debug!(
            table,
            next_offset = checkpoint.next_offset,
            rows = checkpoint.rows.len(),
            "loaded checkpoint"
        );

        Ok(Some(checkpoint))
    }

    async fn store_checkpoint(&self, mut checkpoint: TableCheckpoint) -> SilverResult<()> {
        let path = self.checkpoint_path(&checkpoint.table)?;

        // Appended rows go to their own segment, the checkpoint file commits them.
        if let Some(appended_from) = checkpoint.appended_from {
            let rows = std::mem::take(&mut checkpoint.rows);
            if !rows.is_empty() {
                let segment_path = self.segment_path(&checkpoint.table, appended_from);
                let contents = serde_json::to_vec(&rows)?;
                write_atomically(&self.directory, &segment_path, &contents).await?;
            }
        }

        let contents = serde_json::to_vec(&checkpoint)?;
        write_atomically(&self.directory, &path, &contents).await?;

        debug!(
            table = %checkpoint.table,
            next_offset = checkpoint.next_offset,
            row_count = checkpoint.row_count,
            "stored checkpoint"
        );

        Ok(())
    }
}
