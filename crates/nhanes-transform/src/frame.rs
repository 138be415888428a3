//! Wide table representation.

use polars::prelude::DataFrame;

/// Columns identifying one wide-table row.
pub const KEY_COLUMNS: [&str; 5] = ["version", "cycle", "dataset", "sample", "sequence"];

/// Returns true when `name` is one of [`KEY_COLUMNS`].
pub fn is_key_column(name: &str) -> bool {
    KEY_COLUMNS.contains(&name)
}

/// A pivoted table: key columns plus one column per variable.
#[derive(Debug, Clone)]
pub struct WideTable {
    pub data: DataFrame,
    /// Number of (key, variable) cells that had more than one value.
    /// The first value encountered was kept for each.
    pub collisions: usize,
}

impl WideTable {
    pub fn new(data: DataFrame) -> Self {
        Self {
            data,
            collisions: 0,
        }
    }

    pub fn empty() -> Self {
        Self::new(DataFrame::empty())
    }

    pub fn row_count(&self) -> usize {
        self.data.height()
    }

    pub fn is_empty(&self) -> bool {
        self.data.height() == 0
    }

    /// Non-key column names in table order.
    pub fn variable_columns(&self) -> Vec<String> {
        self.data
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .filter(|name| !is_key_column(name))
            .collect()
    }

    pub fn into_data(self) -> DataFrame {
        self.data
    }
}
