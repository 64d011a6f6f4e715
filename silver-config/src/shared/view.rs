use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Inner join of the view's accumulated rows against another table.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct JoinConfig {
    /// Table joined in.
    pub table: String,
    /// Column compared for equality on both sides.
    pub key: String,
}

/// A derived business view over one base table and any number of joined tables.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewConfig {
    pub name: String,
    /// Table whose rows drive the view.
    pub base: String,
    #[serde(default)]
    pub joins: Vec<JoinConfig>,
    /// Columns removed from the composed rows.
    #[serde(default)]
    pub drop_columns: Vec<String>,
}

impl ViewConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::invalid("views.name", "cannot be empty"));
        }

        if self.base.trim().is_empty() {
            return Err(ValidationError::invalid(
                format!("views.{}.base", self.name),
                "cannot be empty",
            ));
        }

        for join in &self.joins {
            if join.table.trim().is_empty() || join.key.trim().is_empty() {
                return Err(ValidationError::invalid(
                    format!("views.{}.joins", self.name),
                    "join table and key cannot be empty",
                ));
            }
        }

        Ok(())
    }

    /// Returns every table this view reads from, base first.
    pub fn inputs(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.base.as_str()).chain(self.joins.iter().map(|join| join.table.as_str()))
    }
}
