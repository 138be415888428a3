//! Column coercion to declared variable types.
//!
//! Numeric and binary columns become `Float64` (unparseable values turn
//! null). Categorical and text columns become `String`. `Other` columns are
//! left alone. A column that already has the target dtype is not touched,
//! so coercion is idempotent.

use std::collections::BTreeMap;

use polars::prelude::{AnyValue, Column, DataFrame, DataType, IntoColumn, NamedFrom, Series};
use tracing::{debug, warn};

use nhanes_model::VariableType;

use crate::error::Result;
use crate::value::{any_to_f64, any_to_string};

/// Number of non-empty values lost per column during coercion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoercionReport {
    pub lost: BTreeMap<String, usize>,
}

impl CoercionReport {
    pub fn total_lost(&self) -> usize {
        self.lost.values().sum()
    }

    pub fn lost_in(&self, column: &str) -> usize {
        self.lost.get(column).copied().unwrap_or(0)
    }
}

/// The dtype a declared type coerces to, or `None` for `Other`.
pub fn target_dtype(variable_type: VariableType) -> Option<DataType> {
    match variable_type {
        VariableType::Numeric | VariableType::Binary => Some(DataType::Float64),
        VariableType::Categorical | VariableType::Text => Some(DataType::String),
        VariableType::Other => None,
    }
}

fn is_blank(value: &AnyValue<'_>) -> bool {
    match value {
        AnyValue::Null => true,
        AnyValue::String(s) => s.trim().is_empty(),
        AnyValue::StringOwned(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Coerces a single column. Returns the coerced column and the number of
/// non-empty values that could not be represented.
pub fn coerce_column(column: &Column, variable_type: VariableType) -> Result<(Column, usize)> {
    let Some(dtype) = target_dtype(variable_type) else {
        return Ok((column.clone(), 0));
    };
    if column.dtype() == &dtype {
        return Ok((column.clone(), 0));
    }
    let name = column.name().clone();
    let mut lost = 0usize;
    let coerced = match dtype {
        DataType::Float64 => {
            let mut values: Vec<Option<f64>> = Vec::with_capacity(column.len());
            for idx in 0..column.len() {
                let value = column.get(idx)?;
                let parsed = any_to_f64(value.clone());
                if parsed.is_none() && !is_blank(&value) {
                    lost += 1;
                }
                values.push(parsed);
            }
            Series::new(name, values).into_column()
        }
        _ => {
            let mut values: Vec<Option<String>> = Vec::with_capacity(column.len());
            for idx in 0..column.len() {
                let value = column.get(idx)?;
                if matches!(value, AnyValue::Null) {
                    values.push(None);
                } else {
                    values.push(Some(any_to_string(value)));
                }
            }
            Series::new(name, values).into_column()
        }
    };
    Ok((coerced, lost))
}

/// Coerces each listed column present in `df`. Absent columns are skipped.
pub fn set_data_types(
    df: &mut DataFrame,
    types: &[(String, VariableType)],
) -> Result<CoercionReport> {
    let mut report = CoercionReport::default();
    for (name, variable_type) in types {
        let Ok(column) = df.column(name) else {
            debug!(column = %name, "coercion skipped, column absent");
            continue;
        };
        let (coerced, lost) = coerce_column(column, *variable_type)?;
        df.with_column(coerced)?;
        if lost > 0 {
            warn!(column = %name, variable_type = %variable_type, lost, "values lost in coercion");
            report.lost.insert(name.clone(), lost);
        }
    }
    Ok(report)
}
