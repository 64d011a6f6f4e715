use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Controls how source records are grouped before being applied to a table.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct BatchConfig {
    /// Maximum number of records in a batch.
    #[serde(default = "default_batch_max_size")]
    pub max_size: usize,
    /// Maximum time, in milliseconds, to wait for a batch to fill before applying it.
    #[serde(default = "default_batch_max_fill_ms")]
    pub max_fill_ms: u64,
}

impl BatchConfig {
    pub const DEFAULT_MAX_SIZE: usize = 10_000;

    pub const DEFAULT_MAX_FILL_MS: u64 = 500;

    /// Ensures `max_size` is non-zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_size == 0 {
            return Err(ValidationError::invalid(
                "batch.max_size",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_size: default_batch_max_size(),
            max_fill_ms: default_batch_max_fill_ms(),
        }
    }
}

fn default_batch_max_size() -> usize {
    BatchConfig::DEFAULT_MAX_SIZE
}

fn default_batch_max_fill_ms() -> u64 {
    BatchConfig::DEFAULT_MAX_FILL_MS
}
