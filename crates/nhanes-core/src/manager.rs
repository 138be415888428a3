//! Batch execution of transformation rules.
//!
//! The manager walks active rules in id order. For each one it applies the
//! pre-flight gates, runs the stage pipeline and records the outcome on the
//! rule's work process. A failing rule never stops the batch.

use std::collections::BTreeSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

use tracing::{error, info, info_span, warn};

use nhanes_model::{PipelineOptions, Rule, RuleId, RuleVariables, WorkProcessRule, WorkStatus};
use nhanes_store::DataStore;

use crate::catalog::VariableCatalog;
use crate::error::PipelineError;
use crate::pipeline::RulePipeline;
use crate::resolver::InputResolver;
use crate::rules::{RuleRegistry, RuleRun, StageEnv};
use crate::watchdog::panic_message;

pub const ALREADY_APPLIED: &str = "transformation already applied. Delete the data to reapply";
pub const COMPLETED: &str = "transformation completed successfully";

/// How a rule ended within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Completed,
    AlreadyApplied,
    Skipped,
    Failed,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Completed => "completed",
            OutcomeKind::AlreadyApplied => "already applied",
            OutcomeKind::Skipped => "skipped",
            OutcomeKind::Failed => "failed",
        }
    }
}

/// Per-rule result of a batch.
#[derive(Debug, Clone)]
pub struct RuleOutcome {
    pub rule_id: RuleId,
    pub rule_name: String,
    pub kind: OutcomeKind,
    pub status: WorkStatus,
    pub message: String,
    pub rows_written: usize,
    pub duration_ms: Option<u64>,
}

/// Summary of one [`TransformationManager::apply`] call.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub outcomes: Vec<RuleOutcome>,
    /// Requested ids that are not active rules.
    pub unknown: Vec<RuleId>,
}

impl BatchReport {
    fn count(&self, kind: OutcomeKind) -> usize {
        self.outcomes.iter().filter(|o| o.kind == kind).count()
    }

    pub fn completed(&self) -> usize {
        self.count(OutcomeKind::Completed)
    }

    pub fn already_applied(&self) -> usize {
        self.count(OutcomeKind::AlreadyApplied)
    }

    pub fn skipped(&self) -> usize {
        self.count(OutcomeKind::Skipped)
    }

    pub fn failed(&self) -> usize {
        self.count(OutcomeKind::Failed)
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    pub fn rows_written(&self) -> usize {
        self.outcomes.iter().map(|o| o.rows_written).sum()
    }

    pub fn outcome(&self, rule_id: RuleId) -> Option<&RuleOutcome> {
        self.outcomes.iter().find(|o| o.rule_id == rule_id)
    }
}

pub struct TransformationManager<'a> {
    store: &'a dyn DataStore,
    registry: &'a RuleRegistry,
    pipeline: RulePipeline,
    options: PipelineOptions,
}

impl<'a> TransformationManager<'a> {
    pub fn new(
        store: &'a dyn DataStore,
        registry: &'a RuleRegistry,
        options: PipelineOptions,
    ) -> Self {
        Self {
            store,
            registry,
            pipeline: RulePipeline::standard(),
            options,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Runs every active rule, or only the listed ones when `rule_ids` is
    /// given. Only a failure to list rules is returned as an error.
    pub fn apply(&self, rule_ids: Option<&[RuleId]>) -> Result<BatchReport, PipelineError> {
        let span = info_span!("batch");
        let _enter = span.enter();

        let mut rules: Vec<Rule> = self
            .store
            .rules()?
            .into_iter()
            .filter(|rule| rule.is_active)
            .collect();
        rules.sort_by_key(|rule| rule.id);

        let mut report = BatchReport::default();
        if let Some(ids) = rule_ids {
            let requested: BTreeSet<RuleId> = ids.iter().copied().collect();
            let active: BTreeSet<RuleId> = rules.iter().map(|rule| rule.id).collect();
            report.unknown = requested.difference(&active).copied().collect();
            for id in &report.unknown {
                warn!(rule_id = %id, "requested rule is not an active rule");
            }
            rules.retain(|rule| requested.contains(&rule.id));
        }

        info!(rules = rules.len(), "applying transformations");
        for rule in &rules {
            report.outcomes.push(self.apply_rule(rule));
        }
        info!(
            completed = report.completed(),
            already_applied = report.already_applied(),
            skipped = report.skipped(),
            failed = report.failed(),
            rows = report.rows_written(),
            "batch finished"
        );
        Ok(report)
    }

    fn apply_rule(&self, rule: &Rule) -> RuleOutcome {
        let span = info_span!("rule", rule = %rule.name, rule_id = %rule.id);
        let _enter = span.enter();
        info!("applying transformation");

        let mut outcome = RuleOutcome {
            rule_id: rule.id,
            rule_name: rule.name.clone(),
            kind: OutcomeKind::Failed,
            status: WorkStatus::Error,
            message: String::new(),
            rows_written: 0,
            duration_ms: None,
        };

        let mut process = match self.store.work_process_rule(rule.id) {
            Ok(Some(process)) => process,
            Ok(None) => WorkProcessRule::new(rule.id),
            Err(err) => {
                error!(error = %err, "could not load work process");
                outcome.message = err.to_string();
                return outcome;
            }
        };

        if !process.status.is_runnable() {
            let message = format!("Rule status is {}. Skip transformation", process.status);
            warn!("{message}");
            process.execution_logs.clone_from(&message);
            outcome.kind = OutcomeKind::Skipped;
            outcome.status = process.status;
            outcome.message = message;
            self.save_process(&process, &mut outcome);
            return outcome;
        }

        match self.store.has_rule_output(rule.id) {
            Ok(true) => {
                info!("{ALREADY_APPLIED}");
                process.mark_complete(ALREADY_APPLIED);
                outcome.kind = OutcomeKind::AlreadyApplied;
                outcome.status = WorkStatus::Complete;
                outcome.message = ALREADY_APPLIED.to_string();
                self.save_process(&process, &mut outcome);
                return outcome;
            }
            Ok(false) => {}
            Err(err) => {
                let err = PipelineError::from(err);
                error!(error = %err, "could not check existing output");
                process.mark_error(err.to_string());
                outcome.message = err.to_string();
                self.save_process(&process, &mut outcome);
                return outcome;
            }
        }

        let started = Instant::now();
        let result = catch_unwind(AssertUnwindSafe(|| self.execute(rule)))
            .unwrap_or_else(|payload| Err(PipelineError::Panicked(panic_message(payload.as_ref()))));
        let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        process.execution_time_ms = Some(elapsed);
        outcome.duration_ms = Some(elapsed);

        match result {
            Ok(rows) => {
                info!(rows, elapsed_ms = elapsed, "{COMPLETED}");
                process.mark_complete(COMPLETED);
                outcome.kind = OutcomeKind::Completed;
                outcome.status = WorkStatus::Complete;
                outcome.message = COMPLETED.to_string();
                outcome.rows_written = rows;
            }
            Err(err) => {
                error!(error = %err, kind = err.kind(), elapsed_ms = elapsed, "transformation failed");
                process.mark_error(err.to_string());
                outcome.message = err.to_string();
            }
        }
        self.save_process(&process, &mut outcome);
        outcome
    }

    fn save_process(&self, process: &WorkProcessRule, outcome: &mut RuleOutcome) {
        if let Err(err) = self.store.save_work_process_rule(process) {
            error!(error = %err, "could not save work process");
            outcome.kind = OutcomeKind::Failed;
            outcome.message = format!("{} (work process not saved: {err})", outcome.message);
        }
    }

    /// Resolves code and input, then runs the stage pipeline. Returns the
    /// number of observations written.
    fn execute(&self, rule: &Rule) -> Result<usize, PipelineError> {
        let variables = RuleVariables::from_rows(self.store.rule_variables(rule.id)?);
        if variables.sources.is_empty() {
            return Err(PipelineError::configuration(
                "rule declares no source variables",
            ));
        }
        if variables.targets.is_empty() {
            return Err(PipelineError::configuration(
                "rule declares no target variables",
            ));
        }

        let implementation = self
            .registry
            .resolve(&rule.module, &self.options.entry_point)?;

        let catalog = VariableCatalog::new(self.store);
        let source_types = catalog.types_of(&variables.source_names())?;
        let target_types = catalog.types_of(&variables.target_names())?;

        let input = InputResolver::new(self.store, &self.options).resolve(&variables)?;
        let mut run = RuleRun::new(rule.clone(), variables, source_types, target_types, input);
        let env = StageEnv {
            store: self.store,
            catalog: &catalog,
            options: &self.options,
        };
        self.pipeline.execute(&implementation, &mut run, &env)?;
        Ok(run.rows_saved)
    }
}
