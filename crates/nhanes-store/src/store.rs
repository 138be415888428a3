use std::collections::BTreeSet;

use nhanes_model::{
    Cycle, Dataset, Group, Observation, Rule, RuleId, RuleVariable, SystemConfig, Variable,
    VariableType, WorkProcess, WorkProcessRule,
};

use crate::error::Result;

/// One declared source of a rule: a variable, optionally limited to a
/// dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceScope {
    pub variable: String,
    /// `None` leaves the dataset unrestricted.
    pub dataset: Option<String>,
}

impl SourceScope {
    pub fn new(variable: impl Into<String>, dataset: Option<String>) -> Self {
        Self {
            variable: variable.into(),
            dataset,
        }
    }
}

/// Observation query over two sets: the variable must be one of
/// `variables` and the dataset one of `datasets`. A `None` dataset set
/// matches every dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservationFilter {
    pub variables: BTreeSet<String>,
    pub datasets: Option<BTreeSet<String>>,
    pub exclude_version: Option<String>,
}

impl ObservationFilter {
    /// Collapses declared sources into the two sets. A single unscoped
    /// source lifts the dataset restriction for all of them.
    pub fn new(scopes: Vec<SourceScope>) -> Self {
        let mut variables = BTreeSet::new();
        let mut datasets = Some(BTreeSet::new());
        for scope in scopes {
            variables.insert(scope.variable);
            match scope.dataset {
                Some(dataset) => {
                    if let Some(set) = datasets.as_mut() {
                        set.insert(dataset);
                    }
                }
                None => datasets = None,
            }
        }
        Self {
            variables,
            datasets,
            exclude_version: None,
        }
    }

    pub fn excluding_version(mut self, version: impl Into<String>) -> Self {
        self.exclude_version = Some(version.into());
        self
    }

    pub fn matches(&self, observation: &Observation) -> bool {
        if self
            .exclude_version
            .as_deref()
            .is_some_and(|version| version == observation.version)
        {
            return false;
        }
        self.variables.contains(&observation.variable)
            && self
                .datasets
                .as_ref()
                .is_none_or(|datasets| datasets.contains(&observation.dataset))
    }

    /// Requested variable names in ascending order.
    pub fn variable_names(&self) -> Vec<&str> {
        self.variables.iter().map(String::as_str).collect()
    }

    /// Allowed dataset names in ascending order, `None` when unrestricted.
    pub fn dataset_names(&self) -> Option<Vec<&str>> {
        self.datasets
            .as_ref()
            .map(|datasets| datasets.iter().map(String::as_str).collect())
    }
}

/// Storage seam used by every pipeline component.
///
/// Observations come back ordered by `(version, cycle, dataset, sample,
/// sequence)` and then by insertion order.
pub trait DataStore {
    // --- observations ---

    fn fetch_observations(&self, filter: &ObservationFilter) -> Result<Vec<Observation>>;

    /// Inserts all rows in one atomic batch and returns the number written.
    /// Any duplicate key rejects the whole batch.
    fn insert_observations(&self, rows: &[Observation]) -> Result<usize>;

    fn has_rule_output(&self, rule_id: RuleId) -> Result<bool>;

    fn delete_rule_output(&self, rule_id: RuleId) -> Result<usize>;

    /// Deletes the observations of a dataset×cycle pair, skipping rows with
    /// version `keep_version`.
    fn delete_observations(&self, dataset: &str, cycle: &str, keep_version: &str)
    -> Result<usize>;

    fn count_observations(&self, dataset: &str, cycle: &str, version: &str) -> Result<usize>;

    // --- catalog ---

    fn variables(&self) -> Result<Vec<Variable>>;

    fn variable(&self, name: &str) -> Result<Option<Variable>>;

    fn insert_variable(&self, variable: &Variable) -> Result<()>;

    /// Sets `variable_type` to `to` only when it currently equals `from`.
    /// Returns whether the row changed.
    fn compare_and_set_variable_type(
        &self,
        name: &str,
        from: VariableType,
        to: VariableType,
    ) -> Result<bool>;

    fn cycles(&self) -> Result<Vec<Cycle>>;

    fn insert_cycle(&self, cycle: &Cycle) -> Result<()>;

    fn groups(&self) -> Result<Vec<Group>>;

    fn insert_group(&self, group: &Group) -> Result<()>;

    fn datasets(&self) -> Result<Vec<Dataset>>;

    fn insert_dataset(&self, dataset: &Dataset) -> Result<()>;

    // --- rules ---

    /// All rules ordered by id.
    fn rules(&self) -> Result<Vec<Rule>>;

    fn rule(&self, id: RuleId) -> Result<Option<Rule>>;

    fn insert_rule(&self, rule: &Rule) -> Result<()>;

    /// Declared variables of a rule in declaration order.
    fn rule_variables(&self, rule_id: RuleId) -> Result<Vec<RuleVariable>>;

    fn insert_rule_variable(&self, row: &RuleVariable) -> Result<()>;

    // --- work processes ---

    fn work_process_rules(&self) -> Result<Vec<WorkProcessRule>>;

    fn work_process_rule(&self, rule_id: RuleId) -> Result<Option<WorkProcessRule>>;

    /// Inserts or replaces the record for `process.rule_id`.
    fn save_work_process_rule(&self, process: &WorkProcessRule) -> Result<()>;

    /// All dataset×cycle records ordered by `(dataset, cycle)`.
    fn work_processes(&self) -> Result<Vec<WorkProcess>>;

    fn work_process(&self, dataset: &str, cycle: &str) -> Result<Option<WorkProcess>>;

    /// Inserts or replaces the record for `(process.dataset, process.cycle)`.
    fn save_work_process(&self, process: &WorkProcess) -> Result<()>;

    // --- system config ---

    fn system_config(&self, key: &str) -> Result<Option<SystemConfig>>;

    fn set_system_config(&self, config: &SystemConfig) -> Result<()>;
}
