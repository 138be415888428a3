//! Resolves a rule's source variables into a wide input table.

use tracing::debug;

use nhanes_model::{PipelineOptions, RuleVariables};
use nhanes_store::{DataStore, ObservationFilter, SourceScope};
use nhanes_transform::{WideTable, pivot};

use crate::error::{PipelineError, StageError};
use crate::pipeline::Stage;

pub struct InputResolver<'a> {
    store: &'a dyn DataStore,
    options: &'a PipelineOptions,
}

impl<'a> InputResolver<'a> {
    pub fn new(store: &'a dyn DataStore, options: &'a PipelineOptions) -> Self {
        Self { store, options }
    }

    /// Fetches the declared sources and pivots them. A row is read when its
    /// variable is any declared source and its dataset is any declared
    /// source dataset; an unscoped source allows every dataset. Rule output
    /// (the normalized version) is never read back as input. No matching
    /// rows yields an empty table.
    pub fn resolve(&self, variables: &RuleVariables) -> Result<WideTable, PipelineError> {
        let scopes = variables
            .sources
            .iter()
            .map(|row| SourceScope::new(row.variable.clone(), row.dataset.clone()))
            .collect();
        let filter = ObservationFilter::new(scopes)
            .excluding_version(self.options.normalized_version.clone());
        let observations = self.store.fetch_observations(&filter)?;
        let table = pivot(&observations, &variables.source_names())
            .map_err(|err| StageError::new(Stage::ValidateInput, err.to_string()))?;
        debug!(
            observations = observations.len(),
            rows = table.row_count(),
            collisions = table.collisions,
            "resolved input table"
        );
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nhanes_model::{Observation, ObservationKey, RuleId, RuleVariable};
    use nhanes_store::MemoryStore;
    use nhanes_transform::data_utils::column_value_string;

    fn raw(dataset: &str, variable: &str, sample: i64, value: &str) -> Observation {
        Observation::new(
            ObservationKey::new("nhanes", "2017-2018", dataset, sample, 0),
            variable,
            value,
        )
    }

    #[test]
    fn sources_in_different_datasets_share_both_sets() {
        let store = MemoryStore::new();
        store
            .insert_observations(&[
                raw("DEMO", "AGE_YEARS", 1, "30"),
                raw("BMX", "AGE_YEARS", 2, "45"),
                raw("BMX", "RXDDRGID", 2, "x"),
            ])
            .unwrap();
        let id = RuleId::new(1);
        let variables = RuleVariables::from_rows([
            RuleVariable::source(id, "AGE_YEARS", Some("DEMO")),
            RuleVariable::source(id, "RXDDRGID", Some("BMX")),
            RuleVariable::target(id, "AGE_DOUBLED", None),
        ]);
        let options = PipelineOptions::default();

        let table = InputResolver::new(&store, &options).resolve(&variables).unwrap();

        assert_eq!(table.row_count(), 2);
        assert_eq!(column_value_string(&table.data, "dataset", 0), "BMX");
        assert_eq!(column_value_string(&table.data, "AGE_YEARS", 0), "45");
        assert_eq!(column_value_string(&table.data, "RXDDRGID", 0), "x");
        assert_eq!(column_value_string(&table.data, "dataset", 1), "DEMO");
        assert_eq!(column_value_string(&table.data, "AGE_YEARS", 1), "30");
    }
}
