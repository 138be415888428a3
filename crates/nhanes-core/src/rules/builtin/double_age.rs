use std::sync::Arc;

use anyhow::{Context, Result};
use polars::prelude::DataFrame;

use nhanes_transform::Value;
use nhanes_transform::data_utils::{column_values, numeric_column};

use crate::rules::contract::{Transformation, TransformationInput};

/// Writes twice the first source variable into the first target.
pub struct DoubleAge;

pub fn factory() -> Arc<dyn Transformation> {
    Arc::new(DoubleAge)
}

impl Transformation for DoubleAge {
    fn description(&self) -> &'static str {
        "Doubles the first source variable"
    }

    fn apply_transformation(&self, input: &TransformationInput) -> Result<DataFrame> {
        let source = input.sources.first().context("double_age needs a source variable")?;
        let target = input.targets.first().context("double_age needs a target variable")?;
        let mut df = input.data.clone();
        let doubled: Vec<Value> = column_values(&df, source)
            .with_context(|| format!("read {source}"))?
            .into_iter()
            .map(|value| match value.as_f64() {
                Some(v) => Value::Numeric(v * 2.0),
                None => Value::Missing,
            })
            .collect();
        df.with_column(numeric_column(target, &doubled))?;
        Ok(df)
    }
}
