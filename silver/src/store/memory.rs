use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::SilverResult;
use crate::store::{StateStore, TableCheckpoint};

/// In-memory state store for testing and development purposes.
///
/// Cloning returns a handle to the same checkpoints, which lets tests restart a pipeline on the
/// state left by a previous one.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    checkpoints: Arc<Mutex<HashMap<String, TableCheckpoint>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every stored checkpoint.
    pub async fn checkpoints(&self) -> HashMap<String, TableCheckpoint> {
        self.checkpoints.lock().await.clone()
    }
}

impl StateStore for MemoryStateStore {
    async fn load_checkpoint(&self, table: &str) -> SilverResult<Option<TableCheckpoint>> {
        Ok(self.checkpoints.lock().await.get(table).cloned())
    }

    async fn store_checkpoint(&self, mut checkpoint: TableCheckpoint) -> SilverResult<()> {
        let mut checkpoints = self.checkpoints.lock().await;

        if let Some(appended_from) = checkpoint.appended_from.take() {
            let mut rows = checkpoints
                .remove(&checkpoint.table)
                .map(|previous| previous.rows)
                .unwrap_or_default();
            rows.truncate(usize::try_from(appended_from).unwrap_or(usize::MAX));
            rows.append(&mut checkpoint.rows);
            checkpoint.rows = rows;
        }

        checkpoints.insert(checkpoint.table.clone(), checkpoint);

        Ok(())
    }
}
