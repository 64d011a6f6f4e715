use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Column reserved by the ingestion layer for payloads it failed to parse.
pub const QUARANTINE_COLUMN_NAME: &str = "_rescued_data";

/// Column stamped with the processing time of every transformed record.
pub const SEQUENCE_COLUMN_NAME: &str = "modifiedDate";

/// Declaration of one entity flowing through the pipeline.
///
/// An entity reads from one source, is transformed, optionally validated and lands in exactly
/// one output table.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EntityConfig {
    /// Entity name, also the name of its source.
    pub name: String,
    /// Name of the output table.
    pub table: String,
    /// Where the raw records of this entity come from.
    pub source: SourceConfig,
    #[serde(default)]
    pub transform: TransformConfig,
    /// Row quality rules applied after the transform.
    #[serde(default)]
    pub expectations: Option<ExpectationsConfig>,
    /// How the output table is maintained.
    pub mode: TableMode,
}

impl EntityConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::invalid("entities.name", "cannot be empty"));
        }

        if self.table.trim().is_empty() {
            return Err(ValidationError::invalid(
                format!("entities.{}.table", self.name),
                "cannot be empty",
            ));
        }

        if self.source.path.trim().is_empty() {
            return Err(ValidationError::invalid(
                format!("entities.{}.source.path", self.name),
                "cannot be empty",
            ));
        }

        if let Some(expectations) = &self.expectations {
            expectations.validate(&self.name)?;
        }

        self.mode.validate(&self.name)
    }
}

/// Location of the replayable raw record log for an entity.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceConfig {
    /// Path of the JSON-lines log.
    pub path: String,
    /// How often, in milliseconds, the log is polled for appended records once caught up.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl SourceConfig {
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
}

fn default_poll_interval_ms() -> u64 {
    SourceConfig::DEFAULT_POLL_INTERVAL_MS
}

/// Target type of a column cast.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CastType {
    Boolean,
    Integer,
    Double,
    String,
    Date,
    Timestamp,
}

/// Cast of a single column.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CastConfig {
    pub column: String,
    pub to: CastType,
}

/// Per-record normalization applied before validation and merging.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransformConfig {
    #[serde(default)]
    pub casts: Vec<CastConfig>,
    /// Columns removed from every record.
    #[serde(default = "default_drop_columns")]
    pub drop_columns: Vec<String>,
    /// Column stamped with the processing time.
    #[serde(default = "default_sequence_column")]
    pub stamp_column: String,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            casts: Vec::new(),
            drop_columns: default_drop_columns(),
            stamp_column: default_sequence_column(),
        }
    }
}

fn default_drop_columns() -> Vec<String> {
    vec![QUARANTINE_COLUMN_NAME.to_string()]
}

fn default_sequence_column() -> String {
    SEQUENCE_COLUMN_NAME.to_string()
}

/// What happens to a record violating one of the expectations.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationPolicy {
    /// The record is discarded and counted.
    #[default]
    Drop,
    /// The pipeline run is aborted.
    Fail,
    /// The record is kept and counted.
    Warn,
}

/// A named boolean predicate over record columns.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleConfig {
    pub name: String,
    /// Predicate such as `booking_id IS NOT NULL`.
    pub expression: String,
}

/// Row quality gate of an entity.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExpectationsConfig {
    #[serde(default)]
    pub policy: ViolationPolicy,
    pub rules: Vec<RuleConfig>,
}

impl ExpectationsConfig {
    fn validate(&self, entity: &str) -> Result<(), ValidationError> {
        let mut names = HashSet::new();
        for rule in &self.rules {
            if rule.name.trim().is_empty() || rule.expression.trim().is_empty() {
                return Err(ValidationError::invalid(
                    format!("entities.{entity}.expectations.rules"),
                    "rule name and expression cannot be empty",
                ));
            }

            if !names.insert(rule.name.as_str()) {
                return Err(ValidationError::Duplicate {
                    kind: "rule",
                    name: rule.name.clone(),
                });
            }
        }

        Ok(())
    }
}

/// How the output table of an entity is maintained.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TableMode {
    /// Every surviving record is appended.
    Append,
    /// Records are merged into a current-state table keyed by `keys`.
    Cdc {
        /// Business key columns.
        keys: Vec<String>,
        /// Column ordering competing changes to the same key.
        #[serde(default = "default_sequence_column")]
        sequence_by: String,
        /// Slowly changing dimension type, only type 1 is supported.
        #[serde(default = "default_scd_type")]
        stored_as_scd_type: u8,
    },
}

fn default_scd_type() -> u8 {
    1
}

impl TableMode {
    fn validate(&self, entity: &str) -> Result<(), ValidationError> {
        let TableMode::Cdc {
            keys,
            sequence_by,
            stored_as_scd_type,
        } = self
        else {
            return Ok(());
        };

        if keys.is_empty() || keys.iter().any(|key| key.trim().is_empty()) {
            return Err(ValidationError::invalid(
                format!("entities.{entity}.mode.keys"),
                "at least one non-empty key column is required",
            ));
        }

        if sequence_by.trim().is_empty() {
            return Err(ValidationError::invalid(
                format!("entities.{entity}.mode.sequence_by"),
                "cannot be empty",
            ));
        }

        if *stored_as_scd_type != 1 {
            return Err(ValidationError::invalid(
                format!("entities.{entity}.mode.stored_as_scd_type"),
                "only SCD type 1 is supported",
            ));
        }

        Ok(())
    }
}
