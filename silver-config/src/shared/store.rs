use serde::{Deserialize, Serialize};

/// Where table checkpoints are persisted.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateStoreConfig {
    /// Checkpoints live in memory and are lost on restart.
    #[default]
    Memory,
    /// Checkpoints are written as JSON files below `path`.
    File { path: String },
}
