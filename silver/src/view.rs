//! Non-materialized business views joining output tables.
//!
//! A view is recomputed from the current snapshot of each input on every read. Each input is
//! snapshotted independently, so a view read may combine tables at slightly different points of
//! their streams; it converges once the inputs stop changing.

use std::collections::HashMap;
use std::sync::Arc;

use crate::merge::BusinessKey;
use crate::table::OutputTable;
use crate::types::Record;

/// One inner join step of a view.
#[derive(Debug, Clone)]
pub struct ViewJoin {
    pub table: OutputTable,
    /// Column present in both the rows joined so far and `table`.
    pub key: String,
}

/// Inner join of a base table with an ordered list of tables.
#[derive(Debug, Clone)]
pub struct BusinessView {
    name: Arc<str>,
    base: OutputTable,
    joins: Vec<ViewJoin>,
    drop_columns: Vec<String>,
}

impl BusinessView {
    pub fn new(
        name: impl Into<Arc<str>>,
        base: OutputTable,
        joins: Vec<ViewJoin>,
        drop_columns: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base,
            joins,
            drop_columns,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Computes the rows of the view from the current state of its inputs.
    pub fn rows(&self) -> Vec<Record> {
        let base = self.base.snapshot();
        let joins = self
            .joins
            .iter()
            .map(|join| (join.table.snapshot(), join.key.as_str()))
            .collect::<Vec<_>>();
        let joins = joins
            .iter()
            .map(|(rows, key)| (rows.as_slice(), *key))
            .collect::<Vec<_>>();

        compose_rows(base, &joins, &self.drop_columns)
    }

    pub fn len(&self) -> usize {
        self.rows().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Inner-joins `base` with every `(rows, key)` pair in order, then removes `drop_columns`.
///
/// A row whose join key is absent or null never matches. On column name collisions the value of
/// the earliest input is kept, so the join key appears once.
pub fn compose_rows(
    base: Vec<Record>,
    joins: &[(&[Record], &str)],
    drop_columns: &[String],
) -> Vec<Record> {
    let mut rows = base;

    for (right, key) in joins {
        let key_columns = [key.to_string()];

        let mut index: HashMap<BusinessKey, Vec<&Record>> = HashMap::new();
        for row in right.iter() {
            if let Some(value) = BusinessKey::from_record(row, &key_columns) {
                index.entry(value).or_default().push(row);
            }
        }

        let mut joined = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(value) = BusinessKey::from_record(&row, &key_columns) else {
                continue;
            };
            let Some(matches) = index.get(&value) else {
                continue;
            };

            for matched in matches {
                let mut output = row.clone();
                for (column, cell) in matched.iter() {
                    if !output.contains(column) {
                        output.set(column, cell.clone());
                    }
                }
                joined.push(output);
            }
        }

        rows = joined;
    }

    for row in &mut rows {
        for column in drop_columns {
            row.remove(column);
        }
    }

    rows
}
