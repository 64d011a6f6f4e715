use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::types::{Cell, Record};

/// Value of the business key columns of a record, possibly composite.
#[derive(Debug, Clone, PartialEq)]
pub struct BusinessKey {
    values: Vec<Cell>,
}

// Key cells are never null and doubles compare by value, which is reflexive for every key that
// can be built from a record other than NaN.
impl Eq for BusinessKey {}

impl BusinessKey {
    pub fn new(values: Vec<Cell>) -> Self {
        Self { values }
    }

    /// Extracts the key columns of `record`.
    ///
    /// Returns [`None`] when any key column is absent or null.
    pub fn from_record(record: &Record, key_columns: &[String]) -> Option<Self> {
        let values = key_columns
            .iter()
            .map(|column| match record.get(column) {
                Some(cell) if !cell.is_null() => Some(cell.clone()),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()?;

        Some(Self { values })
    }

    pub fn values(&self) -> &[Cell] {
        &self.values
    }

    /// Maps the key to one of `shards` buckets, stable across runs.
    pub fn shard(&self, shards: usize) -> usize {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);

        (hasher.finish() % shards.max(1) as u64) as usize
    }
}

impl Hash for BusinessKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for value in &self.values {
            value.hash_into(state);
        }
    }
}
