//! Declarative row quality gating.

mod expr;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;
use silver_config::shared::{ExpectationsConfig, ViolationPolicy};
use tracing::{debug, warn};

pub use expr::{CompareOp, Expression, ExpressionError};

use crate::bail;
use crate::error::{ErrorKind, SilverResult};
use crate::metrics::{
    OUTCOME_LABEL, RULE_LABEL, SILVER_VALIDATION_DROPPED_TOTAL, SILVER_VALIDATION_RULE_TOTAL,
    SILVER_VALIDATION_WARNED_TOTAL, TABLE_LABEL,
};
use crate::types::Record;

#[derive(Debug)]
struct Rule {
    name: String,
    expression: Expression,
    passed: AtomicU64,
    failed: AtomicU64,
}

/// Pass and fail counts of a single rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleStats {
    pub name: String,
    pub passed: u64,
    pub failed: u64,
}

/// Counters of a [`RowValidator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationStats {
    pub rules: Vec<RuleStats>,
    /// Records discarded under [`ViolationPolicy::Drop`].
    pub dropped: u64,
    /// Records kept despite a failure under [`ViolationPolicy::Warn`].
    pub warned: u64,
}

impl ValidationStats {
    pub fn rule(&self, name: &str) -> Option<&RuleStats> {
        self.rules.iter().find(|rule| rule.name == name)
    }
}

/// Evaluates named predicates against records and applies the violation policy.
///
/// A record passes when every rule evaluates to true; a false or unknown result is a failure.
#[derive(Debug)]
pub struct RowValidator {
    table: Arc<str>,
    policy: ViolationPolicy,
    rules: Vec<Rule>,
    dropped: AtomicU64,
    warned: AtomicU64,
}

impl RowValidator {
    /// Parses every rule of `config`, a rule that does not parse is a configuration error.
    pub fn new(table: impl Into<Arc<str>>, config: &ExpectationsConfig) -> SilverResult<Self> {
        let rules = config
            .rules
            .iter()
            .map(|rule| -> SilverResult<Rule> {
                Ok(Rule {
                    name: rule.name.clone(),
                    expression: Expression::parse(&rule.expression)?,
                    passed: AtomicU64::new(0),
                    failed: AtomicU64::new(0),
                })
            })
            .collect::<SilverResult<Vec<_>>>()?;

        Ok(Self {
            table: table.into(),
            policy: config.policy,
            rules,
            dropped: AtomicU64::new(0),
            warned: AtomicU64::new(0),
        })
    }

    pub fn policy(&self) -> ViolationPolicy {
        self.policy
    }

    /// Evaluates all rules and returns the names of those that did not hold.
    ///
    /// Every rule is evaluated, so the per-rule counters stay complete.
    pub fn evaluate(&self, record: &Record) -> Vec<&str> {
        let mut failed = Vec::new();

        for rule in &self.rules {
            let holds = rule.expression.holds(record);
            let outcome = if holds {
                rule.passed.fetch_add(1, Ordering::Relaxed);
                "pass"
            } else {
                rule.failed.fetch_add(1, Ordering::Relaxed);
                failed.push(rule.name.as_str());
                "fail"
            };

            counter!(
                SILVER_VALIDATION_RULE_TOTAL,
                TABLE_LABEL => self.table.to_string(),
                RULE_LABEL => rule.name.clone(),
                OUTCOME_LABEL => outcome
            )
            .increment(1);
        }

        failed
    }

    /// Applies the policy to one record.
    ///
    /// Returns `Ok(None)` when the record is dropped and an error of kind
    /// [`ErrorKind::ValidationFailed`] under [`ViolationPolicy::Fail`].
    pub fn validate(&self, record: Record) -> SilverResult<Option<Record>> {
        let failed = self.evaluate(&record);
        if failed.is_empty() {
            return Ok(Some(record));
        }

        match self.policy {
            ViolationPolicy::Drop => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                counter!(SILVER_VALIDATION_DROPPED_TOTAL, TABLE_LABEL => self.table.to_string())
                    .increment(1);
                debug!(table = %self.table, rules = ?failed, "record dropped by validation");

                Ok(None)
            }
            ViolationPolicy::Warn => {
                self.warned.fetch_add(1, Ordering::Relaxed);
                counter!(SILVER_VALIDATION_WARNED_TOTAL, TABLE_LABEL => self.table.to_string())
                    .increment(1);
                warn!(table = %self.table, rules = ?failed, "record failed validation");

                Ok(Some(record))
            }
            ViolationPolicy::Fail => {
                bail!(
                    ErrorKind::ValidationFailed,
                    "Record failed validation",
                    format!(
                        "table `{}` rejected a record failing rules {}",
                        self.table,
                        failed.join(", ")
                    )
                );
            }
        }
    }

    /// Validates a batch, keeping the surviving records in arrival order.
    pub fn validate_batch(&self, records: Vec<Record>) -> SilverResult<Vec<Record>> {
        let mut survivors = Vec::with_capacity(records.len());
        for record in records {
            if let Some(record) = self.validate(record)? {
                survivors.push(record);
            }
        }

        Ok(survivors)
    }

    pub fn stats(&self) -> ValidationStats {
        ValidationStats {
            rules: self
                .rules
                .iter()
                .map(|rule| RuleStats {
                    name: rule.name.clone(),
                    passed: rule.passed.load(Ordering::Relaxed),
                    failed: rule.failed.load(Ordering::Relaxed),
                })
                .collect(),
            dropped: self.dropped.load(Ordering::Relaxed),
            warned: self.warned.load(Ordering::Relaxed),
        }
    }
}
