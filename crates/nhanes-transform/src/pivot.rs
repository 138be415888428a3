//! Long ↔ wide reshaping of observations.
//!
//! [`pivot`] groups observations by `(version, cycle, dataset, sample,
//! sequence)` and spreads variables into columns. [`unpivot`] is the
//! inverse and emits rows in key order.

use std::collections::{BTreeMap, HashMap};

use polars::prelude::{AnyValue, Column, DataFrame, IntoColumn, NamedFrom, Series};
use tracing::debug;

use nhanes_model::{Observation, ObservationKey};

use crate::error::{Result, TransformError};
use crate::frame::{KEY_COLUMNS, WideTable, is_key_column};
use crate::value::{any_to_i64, any_to_string};

/// Pivots long observations into a wide table.
///
/// Variable columns follow `variable_order`; variables missing from it are
/// appended in first-seen order. Variables without any value get no column.
/// When a (key, variable) cell is seen twice the first value wins.
pub fn pivot(observations: &[Observation], variable_order: &[String]) -> Result<WideTable> {
    if observations.is_empty() {
        return Ok(WideTable::empty());
    }

    let mut rows: BTreeMap<ObservationKey, HashMap<&str, &str>> = BTreeMap::new();
    let mut seen_variables: Vec<&str> = Vec::new();
    let mut collisions = 0usize;
    for observation in observations {
        let cells = rows.entry(observation.key()).or_default();
        let variable = observation.variable.as_str();
        if cells.contains_key(variable) {
            collisions += 1;
            continue;
        }
        cells.insert(variable, observation.value.as_str());
        if !seen_variables.contains(&variable) {
            seen_variables.push(variable);
        }
    }

    let mut columns_order: Vec<&str> = variable_order
        .iter()
        .map(String::as_str)
        .filter(|name| seen_variables.contains(name))
        .collect();
    for name in &seen_variables {
        if !columns_order.contains(name) {
            columns_order.push(*name);
        }
    }

    let height = rows.len();
    let mut versions = Vec::with_capacity(height);
    let mut cycles = Vec::with_capacity(height);
    let mut datasets = Vec::with_capacity(height);
    let mut samples = Vec::with_capacity(height);
    let mut sequences = Vec::with_capacity(height);
    let mut values: Vec<Vec<Option<String>>> = vec![Vec::with_capacity(height); columns_order.len()];
    for (key, cells) in &rows {
        versions.push(key.version.clone());
        cycles.push(key.cycle.clone());
        datasets.push(key.dataset.clone());
        samples.push(key.sample);
        sequences.push(key.sequence);
        for (idx, name) in columns_order.iter().enumerate() {
            values[idx].push(cells.get(name).map(|value| (*value).to_string()));
        }
    }

    let mut columns: Vec<Column> = vec![
        Series::new("version".into(), versions).into_column(),
        Series::new("cycle".into(), cycles).into_column(),
        Series::new("dataset".into(), datasets).into_column(),
        Series::new("sample".into(), samples).into_column(),
        Series::new("sequence".into(), sequences).into_column(),
    ];
    for (name, cells) in columns_order.iter().zip(values) {
        columns.push(Series::new((*name).into(), cells).into_column());
    }
    let data = DataFrame::new(columns)?;
    debug!(
        rows = data.height(),
        variables = columns_order.len(),
        collisions,
        "pivoted observations"
    );
    Ok(WideTable { data, collisions })
}

/// How [`unpivot`] treats null cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingCells {
    /// Emit nothing for a null cell.
    #[default]
    Skip,
    /// Emit an empty-string value for a null cell.
    Empty,
}

/// Reads the row key at `idx`. All five key columns must be present.
pub fn key_at(df: &DataFrame, idx: usize) -> Result<ObservationKey> {
    let text = |column: &'static str| -> Result<String> {
        let value = df
            .column(column)
            .map_err(|_| TransformError::MissingColumn(column.to_string()))?
            .get(idx)?;
        if matches!(value, AnyValue::Null) {
            return Err(TransformError::InvalidKey { column, row: idx });
        }
        Ok(any_to_string(value))
    };
    let integer = |column: &'static str| -> Result<i64> {
        let value = df
            .column(column)
            .map_err(|_| TransformError::MissingColumn(column.to_string()))?
            .get(idx)?;
        any_to_i64(value).ok_or(TransformError::InvalidKey { column, row: idx })
    };
    Ok(ObservationKey {
        version: text("version")?,
        cycle: text("cycle")?,
        dataset: text("dataset")?,
        sample: integer("sample")?,
        sequence: integer("sequence")?,
    })
}

/// Converts a wide table back to long observations for `variables`.
///
/// Output is sorted by key, then by the order of `variables`. Values are
/// rendered in storage form.
pub fn unpivot(
    df: &DataFrame,
    variables: &[String],
    missing: MissingCells,
) -> Result<Vec<Observation>> {
    for name in KEY_COLUMNS {
        if df.column(name).is_err() {
            return Err(TransformError::MissingColumn(name.to_string()));
        }
    }
    let mut columns = Vec::with_capacity(variables.len());
    for name in variables {
        if is_key_column(name) {
            continue;
        }
        let column = df
            .column(name)
            .map_err(|_| TransformError::MissingColumn(name.clone()))?;
        columns.push((name.as_str(), column));
    }

    let mut keyed = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        keyed.push((key_at(df, idx)?, idx));
    }
    keyed.sort();

    let mut out = Vec::with_capacity(df.height() * columns.len());
    for (key, idx) in keyed {
        for (name, column) in &columns {
            let value = column.get(idx)?;
            if matches!(value, AnyValue::Null) && missing == MissingCells::Skip {
                continue;
            }
            out.push(Observation::new(key.clone(), *name, any_to_string(value)));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(sample: i64, variable: &str, value: &str) -> Observation {
        Observation::new(
            ObservationKey::new("nhanes", "2017-2018", "DEMO", sample, 0),
            variable,
            value,
        )
    }

    #[test]
    fn one_row_per_key_and_null_for_missing() {
        let rows = vec![
            obs(1, "RIDAGEYR", "30"),
            obs(2, "RIDAGEYR", "45"),
            obs(1, "RIAGENDR", "2"),
        ];
        let wide = pivot(&rows, &["RIDAGEYR".to_string()]).unwrap();
        assert_eq!(wide.row_count(), 2);
        assert_eq!(wide.variable_columns(), vec!["RIDAGEYR", "RIAGENDR"]);
        let gender = wide.data.column("RIAGENDR").unwrap();
        assert_eq!(gender.get(1).unwrap(), AnyValue::Null);
    }

    #[test]
    fn empty_input_gives_empty_table() {
        let wide = pivot(&[], &[]).unwrap();
        assert!(wide.is_empty());
    }

    #[test]
    fn unpivot_requires_key_columns() {
        let df = DataFrame::new(vec![
            Series::new("RIDAGEYR".into(), vec!["30"]).into_column(),
        ])
        .unwrap();
        let err = unpivot(&df, &["RIDAGEYR".to_string()], MissingCells::Skip).unwrap_err();
        assert!(matches!(err, TransformError::MissingColumn(name) if name == "version"));
    }

    #[test]
    fn unpivot_can_emit_empty_cells() {
        let rows = vec![obs(1, "A", "x"), obs(2, "B", "y")];
        let wide = pivot(&rows, &[]).unwrap();
        let names = vec!["A".to_string(), "B".to_string()];
        assert_eq!(unpivot(&wide.data, &names, MissingCells::Skip).unwrap().len(), 2);
        let full = unpivot(&wide.data, &names, MissingCells::Empty).unwrap();
        assert_eq!(full.len(), 4);
        assert_eq!(full[1].value, "");
    }
}
