use std::sync::Arc;

use anyhow::{Context, Result, bail};
use polars::prelude::DataFrame;

use crate::rules::contract::{Transformation, TransformationInput};

/// Copies sources into targets pairwise, in declaration order.
pub struct CopyVariable;

pub fn factory() -> Arc<dyn Transformation> {
    Arc::new(CopyVariable)
}

impl Transformation for CopyVariable {
    fn description(&self) -> &'static str {
        "Copies source variables to target variables"
    }

    fn apply_transformation(&self, input: &TransformationInput) -> Result<DataFrame> {
        if input.sources.len() < input.targets.len() {
            bail!(
                "copy_variable needs one source per target ({} sources, {} targets)",
                input.sources.len(),
                input.targets.len()
            );
        }
        let mut df = input.data.clone();
        for (source, target) in input.sources.iter().zip(&input.targets) {
            let column = df
                .column(source)
                .with_context(|| format!("source column {source} missing"))?
                .clone()
                .with_name(target.as_str().into());
            df.with_column(column)?;
        }
        Ok(df)
    }
}
