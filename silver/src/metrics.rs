//! Metric names and labels emitted through the [`metrics`] facade.

use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};

static REGISTER_METRICS: Once = Once::new();

/// Label for the output table.
pub const TABLE_LABEL: &str = "table";

/// Label for the name of a source.
pub const SOURCE_LABEL: &str = "source";

/// Label for the name of a validation rule.
pub const RULE_LABEL: &str = "rule";

/// Label for the column a coercion failed on.
pub const COLUMN_LABEL: &str = "column";

/// Label for the outcome of an evaluation or merge.
pub const OUTCOME_LABEL: &str = "outcome";

/// Evaluations of a validation rule. Labels: `table`, `rule`, `outcome` (`pass` or `fail`).
pub const SILVER_VALIDATION_RULE_TOTAL: &str = "silver_validation_rule_total";

/// Records dropped by the `drop` policy. Labels: `table`.
pub const SILVER_VALIDATION_DROPPED_TOTAL: &str = "silver_validation_dropped_total";

/// Records kept despite failing a rule under the `warn` policy. Labels: `table`.
pub const SILVER_VALIDATION_WARNED_TOTAL: &str = "silver_validation_warned_total";

/// Column values nulled out because they could not be cast. Labels: `table`, `column`.
pub const SILVER_TRANSFORM_COERCION_FAILURES_TOTAL: &str =
    "silver_transform_coercion_failures_total";

/// Merge outcomes. Labels: `table`, `outcome`.
pub const SILVER_MERGE_OUTCOME_TOTAL: &str = "silver_merge_outcome_total";

/// Records read from a source and handed to a table. Labels: `table`.
pub const SILVER_RECORDS_PROCESSED_TOTAL: &str = "silver_records_processed_total";

/// Source lines that could not be parsed and were quarantined. Labels: `source`.
pub const SILVER_SOURCE_RESCUED_TOTAL: &str = "silver_source_rescued_total";

/// Duration of processing and committing one batch. Labels: `table`.
pub const SILVER_BATCH_DURATION_SECONDS: &str = "silver_batch_duration_seconds";

/// Rows currently held by a table. Labels: `table`.
pub const SILVER_TABLE_ROWS: &str = "silver_table_rows";

/// Registers descriptions of every metric emitted by the crate.
///
/// Safe to call more than once.
pub fn register_metrics() {
    REGISTER_METRICS.call_once(|| {
        describe_counter!(
            SILVER_VALIDATION_RULE_TOTAL,
            Unit::Count,
            "Validation rule evaluations, labeled by table, rule and outcome"
        );

        describe_counter!(
            SILVER_VALIDATION_DROPPED_TOTAL,
            Unit::Count,
            "Records dropped because they failed a validation rule"
        );

        describe_counter!(
            SILVER_VALIDATION_WARNED_TOTAL,
            Unit::Count,
            "Records kept although they failed a validation rule"
        );

        describe_counter!(
            SILVER_TRANSFORM_COERCION_FAILURES_TOTAL,
            Unit::Count,
            "Column values nulled out because they could not be cast"
        );

        describe_counter!(
            SILVER_MERGE_OUTCOME_TOTAL,
            Unit::Count,
            "Change records applied to current-state tables, labeled by outcome"
        );

        describe_counter!(
            SILVER_RECORDS_PROCESSED_TOTAL,
            Unit::Count,
            "Source records processed by table workers"
        );

        describe_counter!(
            SILVER_SOURCE_RESCUED_TOTAL,
            Unit::Count,
            "Source lines quarantined into the rescued data column"
        );

        describe_histogram!(
            SILVER_BATCH_DURATION_SECONDS,
            Unit::Seconds,
            "Time taken to process and commit one batch"
        );

        describe_gauge!(
            SILVER_TABLE_ROWS,
            Unit::Count,
            "Rows currently held by a table"
        );
    });
}
