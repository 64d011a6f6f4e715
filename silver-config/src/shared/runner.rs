use serde::{Deserialize, Serialize};

use crate::Config;
use crate::shared::{PipelineConfig, StateStoreConfig, ValidationError};

/// Prometheus exporter settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetricsConfig {
    /// Port the `/metrics` endpoint listens on.
    pub port: u16,
}

/// Top level configuration of the runner binary.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RunnerConfig {
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub state_store: StateStoreConfig,
    #[serde(default)]
    pub metrics: Option<MetricsConfig>,
    /// How often, in milliseconds, table and view sizes are logged.
    #[serde(default = "default_report_interval_ms")]
    pub report_interval_ms: u64,
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.report_interval_ms == 0 {
            return Err(ValidationError::invalid(
                "report_interval_ms",
                "must be greater than 0",
            ));
        }

        self.pipeline.validate()
    }
}

impl Config for RunnerConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}

fn default_report_interval_ms() -> u64 {
    10_000
}
