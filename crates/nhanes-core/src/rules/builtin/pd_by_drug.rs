use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use polars::prelude::{BooleanChunked, DataFrame, IntoColumn, NamedFrom, NewChunkedArray, Series};
use tracing::debug;

use nhanes_transform::data_utils::column_value_string;
use nhanes_transform::key_at;

use crate::rules::contract::{Transformation, TransformationInput};

/// Generic drug codes for Parkinson's disease medication.
/// d03473: carbidopa; levodopa.
const PD_DRUG_CODES: &[&str] = &["d03473"];

const DRUG_COLUMN: &str = "RXDDRGID";

/// Flags participants taking Parkinson's disease medication.
///
/// Keeps one row per (cycle, dataset, sample) among prescriptions matching
/// [`PD_DRUG_CODES`], with `sequence` reset to 0 and the flag set to true.
pub struct PdByDrug;

pub fn factory() -> Arc<dyn Transformation> {
    Arc::new(PdByDrug)
}

impl Transformation for PdByDrug {
    fn description(&self) -> &'static str {
        "Parkinson's disease by medication"
    }

    fn apply_transformation(&self, input: &TransformationInput) -> Result<DataFrame> {
        let target = input.targets.first().context("pd_by_drug needs a target variable")?;
        let df = &input.data;
        df.column(DRUG_COLUMN)
            .with_context(|| format!("{DRUG_COLUMN} missing from input"))?;

        let mut seen = HashSet::new();
        let mut keep = Vec::with_capacity(df.height());
        for idx in 0..df.height() {
            let code = column_value_string(df, DRUG_COLUMN, idx);
            let matches = PD_DRUG_CODES.contains(&code.trim());
            let first = matches && {
                let key = key_at(df, idx)?;
                seen.insert((key.cycle, key.dataset, key.sample))
            };
            keep.push(first);
        }
        let mask = BooleanChunked::from_slice("keep".into(), &keep);
        let mut out = df.filter(&mask)?;
        out.drop_in_place(DRUG_COLUMN)?;

        let height = out.height();
        out.with_column(Series::new("sequence".into(), vec![0i64; height]).into_column())?;
        out.with_column(Series::new(target.as_str().into(), vec![true; height]).into_column())?;
        debug!(participants = height, "pd_by_drug flagged participants");
        Ok(out)
    }
}
