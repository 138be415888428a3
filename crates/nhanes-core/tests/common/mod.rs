#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};

use nhanes_model::{
    Cycle, Dataset, Group, Observation, ObservationKey, Rule, RuleId, RuleVariable, SystemConfig,
    Variable, VariableType, WorkProcess, WorkProcessRule,
};
use nhanes_store::{DataStore, MemoryStore, ObservationFilter, Result, SourceScope, StoreError};

pub const CYCLE: &str = "2017-2018";

pub fn raw(dataset: &str, variable: &str, sample: i64, sequence: i64, value: &str) -> Observation {
    Observation::new(
        ObservationKey::new("nhanes", CYCLE, dataset, sample, sequence),
        variable,
        value,
    )
}

/// Catalog used across scenarios.
pub fn seed_catalog(store: &dyn DataStore) {
    store.insert_cycle(&Cycle::new(CYCLE).unwrap().with_year_code("J")).unwrap();
    store
        .insert_group(&Group {
            name: "Demographics".to_string(),
            description: "Demographic variables".to_string(),
        })
        .unwrap();
    store
        .insert_dataset(&Dataset::new("DEMO").unwrap().in_group("Demographics"))
        .unwrap();
    store.insert_dataset(&Dataset::new("RXQ_RX").unwrap()).unwrap();
    for (name, ty) in [
        ("AGE_YEARS", VariableType::Numeric),
        ("AGE_DOUBLED", VariableType::Numeric),
        ("AGE_COPY", VariableType::Other),
        ("RXDDRGID", VariableType::Text),
        ("PD_FLAG", VariableType::Binary),
    ] {
        store.insert_variable(&Variable::new(name, ty).unwrap()).unwrap();
    }
}

pub fn add_rule(
    store: &dyn DataStore,
    id: i64,
    module: &str,
    sources: &[(&str, Option<&str>)],
    targets: &[&str],
) -> RuleId {
    let id = RuleId::new(id);
    store.insert_rule(&Rule::new(id, module)).unwrap();
    for (variable, dataset) in sources {
        store
            .insert_rule_variable(&RuleVariable::source(id, *variable, *dataset))
            .unwrap();
    }
    for variable in targets {
        store
            .insert_rule_variable(&RuleVariable::target(id, *variable, None))
            .unwrap();
    }
    id
}

/// Seeded store with ages for two DEMO participants and a `double_age`
/// rule writing `AGE_DOUBLED`.
pub fn double_age_store() -> (MemoryStore, RuleId) {
    let store = MemoryStore::new();
    seed_catalog(&store);
    store
        .insert_observations(&[
            raw("DEMO", "AGE_YEARS", 1, 0, "30"),
            raw("DEMO", "AGE_YEARS", 2, 0, "45"),
        ])
        .unwrap();
    let id = add_rule(
        &store,
        1,
        "double_age",
        &[("AGE_YEARS", Some("DEMO"))],
        &["AGE_DOUBLED"],
    );
    (store, id)
}

/// Normalized values of `variable` as `(sample, value)` in key order.
pub fn normalized(store: &dyn DataStore, variable: &str) -> Vec<(i64, String)> {
    let filter = ObservationFilter::new(vec![SourceScope::new(variable, None)]);
    store
        .fetch_observations(&filter)
        .unwrap()
        .into_iter()
        .filter(|row| row.version == "normalized")
        .map(|row| (row.sample, row.value))
        .collect()
}

/// Delegates to a [`MemoryStore`] and fails observation deletes or inserts
/// on demand.
#[derive(Default)]
pub struct FailingStore {
    pub inner: MemoryStore,
    pub fail_deletes: AtomicBool,
    pub fail_inserts: AtomicBool,
}

impl FailingStore {
    pub fn failing_deletes() -> Self {
        let store = Self::default();
        store.fail_deletes.store(true, Ordering::SeqCst);
        store
    }

    pub fn failing_inserts() -> Self {
        let store = Self::default();
        store.fail_inserts.store(true, Ordering::SeqCst);
        store
    }

    fn injected(&self, switch: &AtomicBool, operation: &'static str) -> Result<()> {
        if switch.load(Ordering::SeqCst) {
            tracing::debug!(operation, "injected store failure");
            return Err(StoreError::Poisoned);
        }
        Ok(())
    }
}

impl DataStore for FailingStore {
    fn fetch_observations(&self, filter: &ObservationFilter) -> Result<Vec<Observation>> {
        self.inner.fetch_observations(filter)
    }
    fn insert_observations(&self, rows: &[Observation]) -> Result<usize> {
        self.injected(&self.fail_inserts, "insert observations")?;
        self.inner.insert_observations(rows)
    }
    fn has_rule_output(&self, rule_id: RuleId) -> Result<bool> {
        self.inner.has_rule_output(rule_id)
    }
    fn delete_rule_output(&self, rule_id: RuleId) -> Result<usize> {
        self.injected(&self.fail_deletes, "delete rule output")?;
        self.inner.delete_rule_output(rule_id)
    }
    fn delete_observations(&self, dataset: &str, cycle: &str, keep_version: &str) -> Result<usize> {
        self.injected(&self.fail_deletes, "delete observations")?;
        self.inner.delete_observations(dataset, cycle, keep_version)
    }
    fn count_observations(&self, dataset: &str, cycle: &str, version: &str) -> Result<usize> {
        self.inner.count_observations(dataset, cycle, version)
    }
    fn variables(&self) -> Result<Vec<Variable>> {
        self.inner.variables()
    }
    fn variable(&self, name: &str) -> Result<Option<Variable>> {
        self.inner.variable(name)
    }
    fn insert_variable(&self, variable: &Variable) -> Result<()> {
        self.inner.insert_variable(variable)
    }
    fn compare_and_set_variable_type(
        &self,
        name: &str,
        from: VariableType,
        to: VariableType,
    ) -> Result<bool> {
        self.inner.compare_and_set_variable_type(name, from, to)
    }
    fn cycles(&self) -> Result<Vec<Cycle>> {
        self.inner.cycles()
    }
    fn insert_cycle(&self, cycle: &Cycle) -> Result<()> {
        self.inner.insert_cycle(cycle)
    }
    fn groups(&self) -> Result<Vec<Group>> {
        self.inner.groups()
    }
    fn insert_group(&self, group: &Group) -> Result<()> {
        self.inner.insert_group(group)
    }
    fn datasets(&self) -> Result<Vec<Dataset>> {
        self.inner.datasets()
    }
    fn insert_dataset(&self, dataset: &Dataset) -> Result<()> {
        self.inner.insert_dataset(dataset)
    }
    fn rules(&self) -> Result<Vec<Rule>> {
        self.inner.rules()
    }
    fn rule(&self, id: RuleId) -> Result<Option<Rule>> {
        self.inner.rule(id)
    }
    fn insert_rule(&self, rule: &Rule) -> Result<()> {
        self.inner.insert_rule(rule)
    }
    fn rule_variables(&self, rule_id: RuleId) -> Result<Vec<RuleVariable>> {
        self.inner.rule_variables(rule_id)
    }
    fn insert_rule_variable(&self, row: &RuleVariable) -> Result<()> {
        self.inner.insert_rule_variable(row)
    }
    fn work_process_rules(&self) -> Result<Vec<WorkProcessRule>> {
        self.inner.work_process_rules()
    }
    fn work_process_rule(&self, rule_id: RuleId) -> Result<Option<WorkProcessRule>> {
        self.inner.work_process_rule(rule_id)
    }
    fn save_work_process_rule(&self, process: &WorkProcessRule) -> Result<()> {
        self.inner.save_work_process_rule(process)
    }
    fn work_processes(&self) -> Result<Vec<WorkProcess>> {
        self.inner.work_processes()
    }
    fn work_process(&self, dataset: &str, cycle: &str) -> Result<Option<WorkProcess>> {
        self.inner.work_process(dataset, cycle)
    }
    fn save_work_process(&self, process: &WorkProcess) -> Result<()> {
        self.inner.save_work_process(process)
    }
    fn system_config(&self, key: &str) -> Result<Option<SystemConfig>> {
        self.inner.system_config(key)
    }
    fn set_system_config(&self, config: &SystemConfig) -> Result<()> {
        self.inner.set_system_config(config)
    }
}
