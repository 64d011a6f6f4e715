//! Shared configuration types for silver pipelines.

mod base;
mod batch;
mod entity;
mod pipeline;
mod runner;
mod store;
mod view;

pub use base::ValidationError;
pub use batch::BatchConfig;
pub use entity::{
    CastConfig, CastType, EntityConfig, ExpectationsConfig, QUARANTINE_COLUMN_NAME, RuleConfig,
    SEQUENCE_COLUMN_NAME, SourceConfig, TableMode, TransformConfig, ViolationPolicy,
};
pub use pipeline::{MergeConfig, PipelineConfig};
pub use runner::{MetricsConfig, RunnerConfig};
pub use store::StateStoreConfig;
pub use view::{JoinConfig, ViewConfig};
