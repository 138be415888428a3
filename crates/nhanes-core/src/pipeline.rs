//! Ordered stage execution for one rule run.
//!
//! # Standard Order
//!
//! 1. `validate_input`
//! 2. `set_data_type(in)`
//! 3. `apply_transformation` (worker thread, optional deadline)
//! 4. `filter_output_columns`
//! 5. `set_data_type(out)`
//! 6. `validate_output`
//! 7. `set_variable_type`
//! 8. `save_data`
//!
//! The first failure stops the run. Only `save_data` writes observations,
//! so a failed run commits nothing.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use nhanes_model::CoercionMode;

use crate::error::{PipelineError, StageError};
use crate::rules::{RuleRun, StageEnv, Transformation};
use crate::watchdog::run_with_timeout;

/// One step of the rule pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    ValidateInput,
    SetDataTypeIn,
    ApplyTransformation,
    FilterOutputColumns,
    SetDataTypeOut,
    ValidateOutput,
    SetVariableType,
    SaveData,
}

impl Stage {
    pub const STANDARD: [Stage; 8] = [
        Stage::ValidateInput,
        Stage::SetDataTypeIn,
        Stage::ApplyTransformation,
        Stage::FilterOutputColumns,
        Stage::SetDataTypeOut,
        Stage::ValidateOutput,
        Stage::SetVariableType,
        Stage::SaveData,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::ValidateInput => "validate_input",
            Stage::SetDataTypeIn => "set_data_type_in",
            Stage::ApplyTransformation => "apply_transformation",
            Stage::FilterOutputColumns => "filter_output_columns",
            Stage::SetDataTypeOut => "set_data_type_out",
            Stage::ValidateOutput => "validate_output",
            Stage::SetVariableType => "set_variable_type",
            Stage::SaveData => "save_data",
        }
    }

    /// Message recorded on the work process when the stage fails.
    pub fn failure_message(&self) -> &'static str {
        match self {
            Stage::ValidateInput => "Input validation failed.",
            Stage::SetDataTypeIn | Stage::SetDataTypeOut | Stage::SetVariableType => {
                "Variable type setting failed."
            }
            Stage::ApplyTransformation => "Transformation failed.",
            Stage::FilterOutputColumns => "Output filtering failed.",
            Stage::ValidateOutput => "Output validation failed.",
            Stage::SaveData => "Data saving failed.",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An ordered list of stages.
#[derive(Debug, Clone)]
pub struct RulePipeline {
    stages: Vec<Stage>,
}

impl Default for RulePipeline {
    fn default() -> Self {
        Self::standard()
    }
}

impl RulePipeline {
    /// The standard eight-stage order.
    pub fn standard() -> Self {
        Self {
            stages: Stage::STANDARD.to_vec(),
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// List stage names in execution order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(Stage::name).collect()
    }

    /// Execute all stages in order, stopping at the first failure.
    pub fn execute(
        &self,
        rule: &Arc<dyn Transformation>,
        run: &mut RuleRun,
        env: &StageEnv<'_>,
    ) -> Result<Vec<Stage>, PipelineError> {
        let mut executed = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            debug!(stage = %stage, "running stage");
            match stage {
                Stage::ValidateInput => rule.validate_input(run, env)?,
                Stage::SetDataTypeIn => rule.set_data_type(run, CoercionMode::In, env)?,
                Stage::ApplyTransformation => {
                    run.result = Some(apply(rule, run, env)?);
                }
                Stage::FilterOutputColumns => rule.filter_output_columns(run, env)?,
                Stage::SetDataTypeOut => rule.set_data_type(run, CoercionMode::Out, env)?,
                Stage::ValidateOutput => rule.validate_output(run, env)?,
                Stage::SetVariableType => rule.set_variable_type(run, env)?,
                Stage::SaveData => rule.save_data(run, env)?,
            }
            executed.push(*stage);
        }
        Ok(executed)
    }
}

fn apply(
    rule: &Arc<dyn Transformation>,
    run: &RuleRun,
    env: &StageEnv<'_>,
) -> Result<polars::prelude::DataFrame, PipelineError> {
    let worker_rule = Arc::clone(rule);
    let input = run.transformation_input();
    let outcome = run_with_timeout(
        &format!("rule-{}", run.rule.id),
        env.options.timeout(),
        move || worker_rule.apply_transformation(&input),
    )?;
    outcome.map_err(|err| {
        StageError::new(
            Stage::ApplyTransformation,
            format!("transformation failed: {err:#}"),
        )
        .into()
    })
}
