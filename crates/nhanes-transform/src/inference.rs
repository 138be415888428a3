//! Variable type inference from observed values.

use std::collections::HashSet;

use polars::prelude::{AnyValue, Column, DataType};

use nhanes_model::VariableType;

use crate::value::{any_to_string, parse_f64};

/// Default distinct-to-row ratio under which string data is categorical.
pub const DEFAULT_CATEGORICAL_RATIO: f64 = 0.1;

/// Distinct non-null values of a column in storage form.
pub fn distinct_values(column: &Column) -> HashSet<String> {
    let mut out = HashSet::new();
    for idx in 0..column.len() {
        match column.get(idx) {
            Ok(AnyValue::Null) | Err(_) => {}
            Ok(value) => {
                out.insert(any_to_string(value));
            }
        }
    }
    out
}

fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Infers a concrete type for a column.
///
/// Checks run in order and the first match wins: boolean dtype or exactly
/// two distinct values is binary; all values numeric is numeric; distinct
/// count below `categorical_ratio` of the row count is categorical; string
/// dtype is text. Anything else, including an all-null column, is other.
pub fn infer_variable_type(column: &Column, categorical_ratio: f64) -> VariableType {
    let dtype = column.dtype();
    if dtype == &DataType::Boolean {
        return VariableType::Binary;
    }
    let distinct = distinct_values(column);
    if distinct.is_empty() {
        return VariableType::Other;
    }
    if distinct.len() == 2 {
        return VariableType::Binary;
    }
    let all_numeric = is_numeric_dtype(dtype) || distinct.iter().all(|v| parse_f64(v).is_some());
    if all_numeric {
        return VariableType::Numeric;
    }
    let rows = column.len() as f64;
    if (distinct.len() as f64) < categorical_ratio * rows {
        return VariableType::Categorical;
    }
    if dtype == &DataType::String {
        return VariableType::Text;
    }
    VariableType::Other
}
