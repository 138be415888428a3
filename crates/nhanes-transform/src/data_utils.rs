//! DataFrame helpers shared by rule implementations.

use polars::prelude::{AnyValue, Column, DataFrame, IntoColumn, NamedFrom, Series};

use crate::error::{Result, TransformError};
use crate::value::{Value, any_to_string};

/// Get a string value from a DataFrame column at the given row index.
pub fn column_value_string(df: &DataFrame, name: &str, idx: usize) -> String {
    match df.column(name) {
        Ok(column) => any_to_string(column.get(idx).unwrap_or(AnyValue::Null)),
        Err(_) => String::new(),
    }
}

/// All cells of a column as tagged values.
pub fn column_values(df: &DataFrame, name: &str) -> Result<Vec<Value>> {
    let column = df
        .column(name)
        .map_err(|_| TransformError::MissingColumn(name.to_string()))?;
    let mut out = Vec::with_capacity(column.len());
    for idx in 0..column.len() {
        out.push(Value::from_any(column.get(idx)?));
    }
    Ok(out)
}

/// Builds a `Float64` column from tagged values; non-numeric cells are null.
pub fn numeric_column(name: &str, values: &[Value]) -> Column {
    let cells: Vec<Option<f64>> = values.iter().map(Value::as_f64).collect();
    Series::new(name.into(), cells).into_column()
}
