//! The contract every transformation rule implements.
//!
//! Only [`Transformation::apply_transformation`] is required. The other
//! hooks default to the functions in [`base`], which a rule may call from
//! its own override to extend rather than replace the default.

use polars::prelude::DataFrame;

use nhanes_model::{CoercionMode, PipelineOptions, Rule, RuleVariables, VariableType};
use nhanes_store::DataStore;
use nhanes_transform::{CoercionReport, WideTable};

use crate::catalog::VariableCatalog;
use crate::error::StageError;

pub type StageResult = Result<(), StageError>;

/// What rule code receives: the coerced input table and the declared
/// variable names.
#[derive(Debug, Clone)]
pub struct TransformationInput {
    pub data: DataFrame,
    pub sources: Vec<String>,
    pub targets: Vec<String>,
}

/// Mutable state of one rule run, threaded through every stage.
#[derive(Debug)]
pub struct RuleRun {
    pub rule: Rule,
    pub variables: RuleVariables,
    pub source_types: Vec<(String, VariableType)>,
    pub target_types: Vec<(String, VariableType)>,
    pub input: WideTable,
    pub result: Option<DataFrame>,
    pub input_coercion: CoercionReport,
    pub output_coercion: CoercionReport,
    pub inferred: Vec<(String, VariableType)>,
    pub rows_saved: usize,
}

impl RuleRun {
    pub fn new(
        rule: Rule,
        variables: RuleVariables,
        source_types: Vec<(String, VariableType)>,
        target_types: Vec<(String, VariableType)>,
        input: WideTable,
    ) -> Self {
        Self {
            rule,
            variables,
            source_types,
            target_types,
            input,
            result: None,
            input_coercion: CoercionReport::default(),
            output_coercion: CoercionReport::default(),
            inferred: Vec::new(),
            rows_saved: 0,
        }
    }

    pub fn target_names(&self) -> Vec<String> {
        self.target_types.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn transformation_input(&self) -> TransformationInput {
        TransformationInput {
            data: self.input.data.clone(),
            sources: self.source_types.iter().map(|(name, _)| name.clone()).collect(),
            targets: self.target_names(),
        }
    }
}

/// Collaborators available to stages.
pub struct StageEnv<'a> {
    pub store: &'a dyn DataStore,
    pub catalog: &'a VariableCatalog<'a>,
    pub options: &'a PipelineOptions,
}

/// A user-authored transformation rule.
///
/// Implementations are registered in a [`RuleRegistry`] under a module name
/// and looked up when the rule runs.
///
/// [`RuleRegistry`]: crate::rules::RuleRegistry
pub trait Transformation: Send + Sync {
    /// Business logic: input wide table to result wide table. Must not
    /// depend on row order.
    fn apply_transformation(&self, input: &TransformationInput) -> anyhow::Result<DataFrame>;

    /// Human-readable description of the rule.
    fn description(&self) -> &'static str {
        "Transformation rule"
    }

    fn validate_input(&self, run: &RuleRun, _env: &StageEnv<'_>) -> StageResult {
        base::validate_input(run)
    }

    fn set_data_type(
        &self,
        run: &mut RuleRun,
        mode: CoercionMode,
        _env: &StageEnv<'_>,
    ) -> StageResult {
        base::set_data_type(run, mode)
    }

    fn filter_output_columns(&self, run: &mut RuleRun, env: &StageEnv<'_>) -> StageResult {
        base::filter_output_columns(run, env)
    }

    fn validate_output(&self, run: &RuleRun, _env: &StageEnv<'_>) -> StageResult {
        base::validate_output(run)
    }

    fn set_variable_type(&self, run: &mut RuleRun, env: &StageEnv<'_>) -> StageResult {
        base::set_variable_type(run, env)
    }

    fn save_data(&self, run: &mut RuleRun, env: &StageEnv<'_>) -> StageResult {
        base::save_data(run, env)
    }
}

/// Default stage behaviour.
pub mod base {
    use polars::prelude::{DataType, IntoColumn, NamedFrom, Series};
    use tracing::{debug, trace};

    use nhanes_model::{CoercionMode, VariableType};
    use nhanes_transform::{
        KEY_COLUMNS, MissingCells, distinct_values, infer_variable_type, set_data_types, unpivot,
    };

    use super::{RuleRun, StageEnv, StageResult};
    use crate::catalog::TypeUpdate;
    use crate::error::StageError;
    use crate::pipeline::Stage;
    use crate::redact::redact_value;

    pub fn validate_input(run: &RuleRun) -> StageResult {
        if run.input.is_empty() {
            return Err(StageError::new(
                Stage::ValidateInput,
                "input table is empty",
            ));
        }
        Ok(())
    }

    pub fn set_data_type(run: &mut RuleRun, mode: CoercionMode) -> StageResult {
        let stage = match mode {
            CoercionMode::In => Stage::SetDataTypeIn,
            CoercionMode::Out => Stage::SetDataTypeOut,
        };
        match mode {
            CoercionMode::In => {
                run.input_coercion = set_data_types(&mut run.input.data, &run.source_types)
                    .map_err(|err| StageError::new(stage, err.to_string()))?;
            }
            CoercionMode::Out => {
                let result = run
                    .result
                    .as_mut()
                    .ok_or_else(|| StageError::new(stage, "no result table"))?;
                run.output_coercion = set_data_types(result, &run.target_types)
                    .map_err(|err| StageError::new(stage, err.to_string()))?;
            }
        }
        Ok(())
    }

    /// Keeps key columns plus declared targets. A missing `version` column
    /// is filled with the normalized tag; any other missing key or target
    /// fails.
    pub fn filter_output_columns(run: &mut RuleRun, env: &StageEnv<'_>) -> StageResult {
        let stage = Stage::FilterOutputColumns;
        let result = run
            .result
            .as_mut()
            .ok_or_else(|| StageError::new(stage, "no result table"))?;

        if result.column("version").is_err() {
            let fill = vec![env.options.normalized_version.clone(); result.height()];
            result
                .with_column(Series::new("version".into(), fill).into_column())
                .map_err(|err| StageError::new(stage, err.to_string()))?;
        }
        let missing_keys: Vec<&str> = KEY_COLUMNS
            .iter()
            .copied()
            .filter(|name| result.column(name).is_err())
            .collect();
        if !missing_keys.is_empty() {
            return Err(StageError::new(
                stage,
                format!("missing key column(s): {}", missing_keys.join(", ")),
            ));
        }
        let targets = run
            .target_types
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>();
        let missing_targets: Vec<&str> = targets
            .iter()
            .copied()
            .filter(|name| result.column(name).is_err())
            .collect();
        if !missing_targets.is_empty() {
            return Err(StageError::new(
                stage,
                format!("missing target column(s): {}", missing_targets.join(", ")),
            ));
        }

        let keep: Vec<&str> = KEY_COLUMNS.iter().copied().chain(targets).collect();
        let filtered = result
            .select(keep)
            .map_err(|err| StageError::new(stage, err.to_string()))?;
        *result = filtered;
        Ok(())
    }

    pub fn validate_output(run: &RuleRun) -> StageResult {
        let stage = Stage::ValidateOutput;
        let result = run
            .result
            .as_ref()
            .ok_or_else(|| StageError::new(stage, "no result table"))?;
        if result.height() == 0 {
            return Err(StageError::new(stage, "result table is empty"));
        }
        for (name, variable_type) in &run.target_types {
            let column = result
                .column(name)
                .map_err(|_| StageError::new(stage, format!("missing target column {name}")))?;
            match variable_type {
                VariableType::Numeric | VariableType::Binary => {
                    let lost = run.output_coercion.lost_in(name);
                    if lost > 0 {
                        return Err(StageError::new(
                            stage,
                            format!("{lost} value(s) of {name} are not {variable_type}"),
                        ));
                    }
                    if *variable_type == VariableType::Binary {
                        let distinct = distinct_values(column).len();
                        if distinct > 2 {
                            return Err(StageError::new(
                                stage,
                                format!("{name} is binary but has {distinct} distinct values"),
                            ));
                        }
                    }
                }
                VariableType::Categorical | VariableType::Text => {
                    if column.dtype() != &DataType::String {
                        return Err(StageError::new(
                            stage,
                            format!("{name} is {variable_type} but holds {}", column.dtype()),
                        ));
                    }
                }
                VariableType::Other => {}
            }
        }
        Ok(())
    }

    /// Infers and records a type for every target still declared `other`.
    pub fn set_variable_type(run: &mut RuleRun, env: &StageEnv<'_>) -> StageResult {
        let stage = Stage::SetVariableType;
        let result = run
            .result
            .as_ref()
            .ok_or_else(|| StageError::new(stage, "no result table"))?;
        for (name, variable_type) in &run.target_types {
            if *variable_type != VariableType::Other {
                continue;
            }
            let column = result
                .column(name)
                .map_err(|_| StageError::new(stage, format!("missing target column {name}")))?;
            let inferred = infer_variable_type(column, env.options.categorical_ratio);
            let update = env
                .catalog
                .record_inferred(name, inferred)
                .map_err(|err| StageError::new(stage, err.to_string()))?;
            if let TypeUpdate::Applied(applied) = update {
                run.inferred.push((name.clone(), applied));
            }
        }
        Ok(())
    }

    /// Writes one observation per result row and target under the
    /// normalized version, tagged with the rule id, in a single batch.
    pub fn save_data(run: &mut RuleRun, env: &StageEnv<'_>) -> StageResult {
        let stage = Stage::SaveData;
        let result = run
            .result
            .as_ref()
            .ok_or_else(|| StageError::new(stage, "no result table"))?;
        let mut rows = unpivot(result, &run.target_names(), MissingCells::Empty)
            .map_err(|err| StageError::new(stage, err.to_string()))?;
        for row in &mut rows {
            row.version.clone_from(&env.options.normalized_version);
            row.rule_id = Some(run.rule.id);
        }
        if let Some(first) = rows.first() {
            trace!(
                variable = %first.variable,
                sample = first.sample,
                value = redact_value(&first.value),
                "first row to save"
            );
        }
        let written = env
            .store
            .insert_observations(&rows)
            .map_err(|err| StageError::new(stage, err.to_string()))?;
        debug!(rule = %run.rule.name, rows = written, "saved rule output");
        run.rows_saved = written;
        Ok(())
    }
}
