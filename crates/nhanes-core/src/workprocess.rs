//! Operator-facing state transitions for rule and dataset work processes.
//!
//! The manager moves rule work processes through `pending`, `complete` and
//! `error` on its own; everything else goes through [`WorkProcessTracker`].

use std::collections::BTreeSet;

use tracing::{error, info, warn};

use nhanes_model::{
    Cycle, Dataset, PipelineOptions, RuleId, SystemConfig, WorkProcess, WorkProcessRule,
    WorkStatus,
};
use nhanes_store::DataStore;

use crate::error::PipelineError;

/// Statuses an operator may assign to a rule work process.
pub const OPERATOR_RULE_STATUSES: [WorkStatus; 3] =
    [WorkStatus::Pending, WorkStatus::Standby, WorkStatus::Complete];

/// Which dataset work processes a bulk update touches. Empty lists match
/// everything.
#[derive(Debug, Clone, Default)]
pub struct BulkSelection {
    pub datasets: Vec<String>,
    pub groups: Vec<String>,
}

impl BulkSelection {
    pub fn datasets(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            datasets: names.into_iter().map(Into::into).collect(),
            groups: Vec::new(),
        }
    }

    pub fn groups(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            datasets: Vec::new(),
            groups: names.into_iter().map(Into::into).collect(),
        }
    }
}

pub struct WorkProcessTracker<'a> {
    store: &'a dyn DataStore,
    options: &'a PipelineOptions,
}

impl<'a> WorkProcessTracker<'a> {
    pub fn new(store: &'a dyn DataStore, options: &'a PipelineOptions) -> Self {
        Self { store, options }
    }

    /// Bulk status change for rule work processes. Missing records are
    /// created. Every id is checked before anything is written. Returns the
    /// number of records written.
    pub fn mark_rules(&self, ids: &[RuleId], status: WorkStatus) -> Result<usize, PipelineError> {
        if !OPERATOR_RULE_STATUSES.contains(&status) {
            return Err(PipelineError::configuration(format!(
                "rule status {status} cannot be set by an operator"
            )));
        }
        for &id in ids {
            if self.store.rule(id)?.is_none() {
                return Err(PipelineError::configuration(format!("rule {id} does not exist")));
            }
        }
        let mut written = 0;
        for &id in ids {
            let mut process = self
                .store
                .work_process_rule(id)?
                .unwrap_or_else(|| WorkProcessRule::new(id));
            process.status = status;
            if status == WorkStatus::Pending {
                process.attempt_count = 0;
            }
            process.execution_logs = format!("status set to {status}");
            self.store.save_work_process_rule(&process)?;
            written += 1;
        }
        info!(rules = written, status = %status, "rule work processes updated");
        Ok(written)
    }

    /// Deletes the rule's output and returns it to `pending` with a clean
    /// attempt count. Returns the number of observations removed.
    pub fn purge_rule(&self, id: RuleId) -> Result<usize, PipelineError> {
        if self.store.rule(id)?.is_none() {
            return Err(PipelineError::configuration(format!("rule {id} does not exist")));
        }
        let removed = self.store.delete_rule_output(id)?;
        let mut process = self
            .store
            .work_process_rule(id)?
            .unwrap_or_else(|| WorkProcessRule::new(id));
        process.status = WorkStatus::Pending;
        process.attempt_count = 0;
        process.execution_time_ms = None;
        process.execution_logs = format!("purged {removed} observations");
        self.store.save_work_process_rule(&process)?;
        info!(rule_id = %id, removed, "rule output purged");
        Ok(removed)
    }

    /// Creates a `pending` work process for every rule that lacks one.
    pub fn ensure_rule_processes(&self) -> Result<usize, PipelineError> {
        let existing: BTreeSet<RuleId> = self
            .store
            .work_process_rules()?
            .into_iter()
            .map(|process| process.rule_id)
            .collect();
        let mut created = 0;
        for rule in self.store.rules()? {
            if !existing.contains(&rule.id) {
                self.store
                    .save_work_process_rule(&WorkProcessRule::new(rule.id))?;
                created += 1;
            }
        }
        if created > 0 {
            info!(created, "rule work processes created");
        }
        Ok(created)
    }

    /// Sets the status of a dataset×cycle work process.
    ///
    /// `delete` removes the pair's raw observations (normalized rows are
    /// kept) and resets the record to `pending`. When the removal fails the
    /// record is left in `error` and the failure is returned.
    pub fn set_status(
        &self,
        dataset: &str,
        cycle: &str,
        status: WorkStatus,
    ) -> Result<WorkProcess, PipelineError> {
        let mut process = self.store.work_process(dataset, cycle)?.ok_or_else(|| {
            PipelineError::configuration(format!("no work process for {dataset} in {cycle}"))
        })?;

        if status != WorkStatus::Delete {
            process.status = status;
            self.store.save_work_process(&process)?;
            info!(dataset, cycle, status = %status, "work process updated");
            return Ok(process);
        }

        match self
            .store
            .delete_observations(dataset, cycle, &self.options.normalized_version)
        {
            Ok(removed) => {
                process.reset();
                self.store.save_work_process(&process)?;
                info!(dataset, cycle, removed, "raw observations deleted");
                Ok(process)
            }
            Err(err) => {
                error!(dataset, cycle, error = %err, "raw observation delete failed");
                process.status = WorkStatus::Error;
                if let Err(save_err) = self.store.save_work_process(&process) {
                    error!(dataset, cycle, error = %save_err, "could not record delete failure");
                }
                Err(err.into())
            }
        }
    }

    pub fn auto_create_enabled(&self) -> Result<bool, PipelineError> {
        Ok(self
            .store
            .system_config(SystemConfig::AUTO_CREATE_WORKPROCESS)?
            .is_some_and(|config| config.is_enabled()))
    }

    /// Inserts the dataset and, when auto-creation is on, a `standby` work
    /// process against every known cycle. Returns the number created.
    pub fn register_dataset(&self, dataset: &Dataset) -> Result<usize, PipelineError> {
        self.store.insert_dataset(dataset)?;
        info!(dataset = %dataset.name, "dataset registered");
        if !self.auto_create_enabled()? {
            return Ok(0);
        }
        let mut created = 0;
        for cycle in self.store.cycles()? {
            created += self.create_missing(&dataset.name, &cycle.name)?;
        }
        Ok(created)
    }

    /// Inserts the cycle and, when auto-creation is on, a `standby` work
    /// process against every known dataset. Returns the number created.
    pub fn register_cycle(&self, cycle: &Cycle) -> Result<usize, PipelineError> {
        self.store.insert_cycle(cycle)?;
        info!(cycle = %cycle.name, "cycle registered");
        if !self.auto_create_enabled()? {
            return Ok(0);
        }
        let mut created = 0;
        for dataset in self.store.datasets()? {
            created += self.create_missing(&dataset.name, &cycle.name)?;
        }
        Ok(created)
    }

    /// Creates a `standby` work process for every dataset×cycle pair that
    /// lacks one.
    pub fn sync_work_processes(&self) -> Result<usize, PipelineError> {
        let cycles = self.store.cycles()?;
        let mut created = 0;
        for dataset in self.store.datasets()? {
            for cycle in &cycles {
                created += self.create_missing(&dataset.name, &cycle.name)?;
            }
        }
        info!(created, "work processes synchronized");
        Ok(created)
    }

    /// Sets `status` (and optionally `is_download`) on every dataset work
    /// process matching `selection`. Returns the number updated.
    pub fn bulk_update(
        &self,
        selection: &BulkSelection,
        status: WorkStatus,
        is_download: Option<bool>,
    ) -> Result<usize, PipelineError> {
        if status == WorkStatus::Delete {
            return Err(PipelineError::configuration(
                "bulk updates cannot delete; use set_status per pair",
            ));
        }
        let datasets = self.store.datasets()?;
        let for_groups: BTreeSet<&str> = datasets
            .iter()
            .filter(|dataset| {
                dataset
                    .group
                    .as_ref()
                    .is_some_and(|group| selection.groups.contains(group))
            })
            .map(|dataset| dataset.name.as_str())
            .collect();
        for name in &selection.datasets {
            if !datasets.iter().any(|dataset| &dataset.name == name) {
                warn!(dataset = %name, "dataset not found, ignored");
            }
        }

        let everything = selection.datasets.is_empty() && selection.groups.is_empty();
        let mut updated = 0;
        for mut process in self.store.work_processes()? {
            let selected = everything
                || selection.datasets.contains(&process.dataset)
                || for_groups.contains(process.dataset.as_str());
            if !selected {
                continue;
            }
            process.status = status;
            if let Some(flag) = is_download {
                process.is_download = flag;
            }
            self.store.save_work_process(&process)?;
            updated += 1;
        }
        info!(updated, status = %status, "work processes updated");
        Ok(updated)
    }

    fn create_missing(&self, dataset: &str, cycle: &str) -> Result<usize, PipelineError> {
        if self.store.work_process(dataset, cycle)?.is_some() {
            return Ok(0);
        }
        self.store
            .save_work_process(&WorkProcess::new(dataset, cycle, WorkStatus::Standby))?;
        Ok(1)
    }
}
