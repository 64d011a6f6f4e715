use serde::{Deserialize, Serialize};

use crate::types::Cell;

static NULL_CELL: Cell = Cell::Null;

/// An ordered mapping from column name to [`Cell`].
///
/// Column order is the order in which columns were first set. A column that is absent reads as
/// [`Cell::Null`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    columns: Vec<(String, Cell)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            columns: Vec::with_capacity(capacity),
        }
    }

    /// Returns the cell of `column` if the column is present.
    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, cell)| cell)
    }

    /// Returns the cell of `column`, [`Cell::Null`] when absent.
    pub fn value(&self, column: &str) -> &Cell {
        self.get(column).unwrap_or(&NULL_CELL)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|(name, _)| name == column)
    }

    /// Sets `column` to `cell`, keeping the column position if it already exists.
    pub fn set(&mut self, column: impl Into<String>, cell: Cell) {
        let column = column.into();
        match self.columns.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => *existing = cell,
            None => self.columns.push((column, cell)),
        }
    }

    /// Builder flavour of [`Record::set`].
    pub fn with(mut self, column: impl Into<String>, cell: impl Into<Cell>) -> Self {
        self.set(column, cell.into());
        self
    }

    pub fn remove(&mut self, column: &str) -> Option<Cell> {
        let position = self.columns.iter().position(|(name, _)| name == column)?;
        Some(self.columns.remove(position).1)
    }

    /// Replaces the cell of `column` through `f`, if the column exists.
    pub fn update<F>(&mut self, column: &str, f: F)
    where
        F: FnOnce(Cell) -> Cell,
    {
        if let Some((_, cell)) = self.columns.iter_mut().find(|(name, _)| name == column) {
            let current = std::mem::replace(cell, Cell::Null);
            *cell = f(current);
        }
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.columns.iter().map(|(name, cell)| (name.as_str(), cell))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn into_columns(self) -> Vec<(String, Cell)> {
        self.columns
    }
}

impl<K> FromIterator<(K, Cell)> for Record
where
    K: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, Cell)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (column, cell) in iter {
            record.set(column, cell);
        }

        record
    }
}

impl IntoIterator for Record {
    type Item = (String, Cell);
    type IntoIter = std::vec::IntoIter<(String, Cell)>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}
