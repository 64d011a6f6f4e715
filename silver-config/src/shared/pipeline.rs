use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::shared::{BatchConfig, EntityConfig, ValidationError, ViewConfig};

/// Tuning of the CDC merge engine.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MergeConfig {
    /// Number of independently locked shards in every current-state table.
    #[serde(default = "default_shards")]
    pub shards: usize,
    /// Number of tasks a batch is split over when applied.
    #[serde(default = "default_partitions")]
    pub partitions: usize,
    /// Number of most recent changes every current-state table keeps for change feed readers.
    #[serde(default = "default_change_feed_retention")]
    pub change_feed_retention: usize,
}

impl MergeConfig {
    pub const DEFAULT_SHARDS: usize = 16;

    pub const DEFAULT_PARTITIONS: usize = 4;

    pub const DEFAULT_CHANGE_FEED_RETENTION: usize = 10_000;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.shards == 0 {
            return Err(ValidationError::invalid(
                "merge.shards",
                "must be greater than 0",
            ));
        }

        if self.partitions == 0 {
            return Err(ValidationError::invalid(
                "merge.partitions",
                "must be greater than 0",
            ));
        }

        if self.change_feed_retention == 0 {
            return Err(ValidationError::invalid(
                "merge.change_feed_retention",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            shards: default_shards(),
            partitions: default_partitions(),
            change_feed_retention: default_change_feed_retention(),
        }
    }
}

fn default_shards() -> usize {
    MergeConfig::DEFAULT_SHARDS
}

fn default_partitions() -> usize {
    MergeConfig::DEFAULT_PARTITIONS
}

fn default_change_feed_retention() -> usize {
    MergeConfig::DEFAULT_CHANGE_FEED_RETENTION
}

/// Declarative description of a whole pipeline.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    /// Identifier used to label logs and metrics.
    pub id: String,
    pub entities: Vec<EntityConfig>,
    #[serde(default)]
    pub views: Vec<ViewConfig>,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub merge: MergeConfig,
}

impl PipelineConfig {
    /// Validates every entity and view and checks that names are unique and references resolve.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::invalid("pipeline.id", "cannot be empty"));
        }

        self.batch.validate()?;
        self.merge.validate()?;

        let mut entity_names = HashSet::new();
        let mut table_names = HashSet::new();
        for entity in &self.entities {
            entity.validate()?;

            if !entity_names.insert(entity.name.as_str()) {
                return Err(ValidationError::Duplicate {
                    kind: "entity",
                    name: entity.name.clone(),
                });
            }

            if !table_names.insert(entity.table.as_str()) {
                return Err(ValidationError::Duplicate {
                    kind: "table",
                    name: entity.table.clone(),
                });
            }
        }

        let mut view_names = HashSet::new();
        for view in &self.views {
            view.validate()?;

            if table_names.contains(view.name.as_str()) || !view_names.insert(view.name.as_str()) {
                return Err(ValidationError::Duplicate {
                    kind: "view",
                    name: view.name.clone(),
                });
            }

            for input in view.inputs() {
                if !table_names.contains(input) {
                    return Err(ValidationError::UnknownReference {
                        from: format!("views.{}", view.name),
                        kind: "table",
                        name: input.to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}
