//! In-process store.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use nhanes_model::{
    Cycle, Dataset, Group, Observation, ObservationKey, Rule, RuleId, RuleVariable, SystemConfig,
    Variable, VariableType, WorkProcess, WorkProcessRule,
};

use crate::error::{Result, StoreError};
use crate::store::{DataStore, ObservationFilter};

#[derive(Debug, Default)]
struct Inner {
    observations: Vec<Observation>,
    observation_keys: BTreeSet<(ObservationKey, String)>,
    variables: BTreeMap<String, Variable>,
    cycles: BTreeMap<String, Cycle>,
    groups: BTreeMap<String, Group>,
    datasets: BTreeMap<String, Dataset>,
    rules: BTreeMap<RuleId, Rule>,
    rule_variables: Vec<RuleVariable>,
    work_process_rules: BTreeMap<RuleId, WorkProcessRule>,
    work_processes: BTreeMap<(String, String), WorkProcess>,
    system_config: BTreeMap<String, SystemConfig>,
}

impl Inner {
    fn rebuild_keys(&mut self) {
        self.observation_keys = self
            .observations
            .iter()
            .map(|row| {
                let (key, variable) = row.identity();
                (key, variable.to_string())
            })
            .collect();
    }
}

/// A [`DataStore`] backed by ordered in-memory maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Number of stored observations across all versions.
    pub fn observation_count(&self) -> Result<usize> {
        Ok(self.lock()?.observations.len())
    }
}

fn duplicate(entity: &'static str, key: impl Into<String>) -> StoreError {
    StoreError::Duplicate {
        entity,
        key: key.into(),
    }
}

impl DataStore for MemoryStore {
    fn fetch_observations(&self, filter: &ObservationFilter) -> Result<Vec<Observation>> {
        let inner = self.lock()?;
        let mut rows: Vec<Observation> = inner
            .observations
            .iter()
            .filter(|row| filter.matches(row))
            .cloned()
            .collect();
        // Stable sort keeps insertion order within a key.
        rows.sort_by_key(Observation::key);
        Ok(rows)
    }

    fn insert_observations(&self, rows: &[Observation]) -> Result<usize> {
        let mut inner = self.lock()?;
        let mut batch_keys = BTreeSet::new();
        for row in rows {
            let (key, variable) = row.identity();
            let identity = (key, variable.to_string());
            if inner.observation_keys.contains(&identity) || !batch_keys.insert(identity) {
                return Err(duplicate(
                    "observation",
                    format!(
                        "{}/{}/{}/{}/{}/{}",
                        row.version, row.cycle, row.dataset, row.variable, row.sample, row.sequence
                    ),
                ));
            }
        }
        inner.observation_keys.extend(batch_keys);
        inner.observations.extend_from_slice(rows);
        Ok(rows.len())
    }

    fn has_rule_output(&self, rule_id: RuleId) -> Result<bool> {
        let inner = self.lock()?;
        Ok(inner
            .observations
            .iter()
            .any(|row| row.rule_id == Some(rule_id)))
    }

    fn delete_rule_output(&self, rule_id: RuleId) -> Result<usize> {
        let mut inner = self.lock()?;
        let before = inner.observations.len();
        inner.observations.retain(|row| row.rule_id != Some(rule_id));
        let removed = before - inner.observations.len();
        if removed > 0 {
            inner.rebuild_keys();
        }
        Ok(removed)
    }

    fn delete_observations(
        &self,
        dataset: &str,
        cycle: &str,
        keep_version: &str,
    ) -> Result<usize> {
        let mut inner = self.lock()?;
        let before = inner.observations.len();
        inner.observations.retain(|row| {
            row.dataset != dataset || row.cycle != cycle || row.version == keep_version
        });
        let removed = before - inner.observations.len();
        if removed > 0 {
            inner.rebuild_keys();
        }
        Ok(removed)
    }

    fn count_observations(&self, dataset: &str, cycle: &str, version: &str) -> Result<usize> {
        let inner = self.lock()?;
        Ok(inner
            .observations
            .iter()
            .filter(|row| row.dataset == dataset && row.cycle == cycle && row.version == version)
            .count())
    }

    fn variables(&self) -> Result<Vec<Variable>> {
        Ok(self.lock()?.variables.values().cloned().collect())
    }

    fn variable(&self, name: &str) -> Result<Option<Variable>> {
        Ok(self.lock()?.variables.get(name).cloned())
    }

    fn insert_variable(&self, variable: &Variable) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.variables.contains_key(&variable.name) {
            return Err(duplicate("variable", variable.name.clone()));
        }
        inner
            .variables
            .insert(variable.name.clone(), variable.clone());
        Ok(())
    }

    fn compare_and_set_variable_type(
        &self,
        name: &str,
        from: VariableType,
        to: VariableType,
    ) -> Result<bool> {
        let mut inner = self.lock()?;
        let variable = inner
            .variables
            .get_mut(name)
            .ok_or_else(|| StoreError::NotFound {
                entity: "variable",
                key: name.to_string(),
            })?;
        if variable.variable_type != from {
            return Ok(false);
        }
        variable.variable_type = to;
        Ok(true)
    }

    fn cycles(&self) -> Result<Vec<Cycle>> {
        Ok(self.lock()?.cycles.values().cloned().collect())
    }

    fn insert_cycle(&self, cycle: &Cycle) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.cycles.contains_key(&cycle.name) {
            return Err(duplicate("cycle", cycle.name.clone()));
        }
        inner.cycles.insert(cycle.name.clone(), cycle.clone());
        Ok(())
    }

    fn groups(&self) -> Result<Vec<Group>> {
        Ok(self.lock()?.groups.values().cloned().collect())
    }

    fn insert_group(&self, group: &Group) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.groups.contains_key(&group.name) {
            return Err(duplicate("group", group.name.clone()));
        }
        inner.groups.insert(group.name.clone(), group.clone());
        Ok(())
    }

    fn datasets(&self) -> Result<Vec<Dataset>> {
        Ok(self.lock()?.datasets.values().cloned().collect())
    }

    fn insert_dataset(&self, dataset: &Dataset) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.datasets.contains_key(&dataset.name) {
            return Err(duplicate("dataset", dataset.name.clone()));
        }
        inner.datasets.insert(dataset.name.clone(), dataset.clone());
        Ok(())
    }

    fn rules(&self) -> Result<Vec<Rule>> {
        Ok(self.lock()?.rules.values().cloned().collect())
    }

    fn rule(&self, id: RuleId) -> Result<Option<Rule>> {
        Ok(self.lock()?.rules.get(&id).cloned())
    }

    fn insert_rule(&self, rule: &Rule) -> Result<()> {
        let mut inner = self.lock()?;
        let clash = inner.rules.values().any(|existing| {
            existing.id == rule.id || (existing.name == rule.name && existing.version == rule.version)
        });
        if clash {
            return Err(duplicate("rule", format!("{} ({} v{})", rule.id, rule.name, rule.version)));
        }
        inner.rules.insert(rule.id, rule.clone());
        Ok(())
    }

    fn rule_variables(&self, rule_id: RuleId) -> Result<Vec<RuleVariable>> {
        let inner = self.lock()?;
        Ok(inner
            .rule_variables
            .iter()
            .filter(|row| row.rule_id == rule_id)
            .cloned()
            .collect())
    }

    fn insert_rule_variable(&self, row: &RuleVariable) -> Result<()> {
        let mut inner = self.lock()?;
        if !inner.rules.contains_key(&row.rule_id) {
            return Err(StoreError::NotFound {
                entity: "rule",
                key: row.rule_id.to_string(),
            });
        }
        if inner.rule_variables.contains(row) {
            return Err(duplicate(
                "rule variable",
                format!("{}:{}:{}", row.rule_id, row.variable, row.role),
            ));
        }
        inner.rule_variables.push(row.clone());
        Ok(())
    }

    fn work_process_rules(&self) -> Result<Vec<WorkProcessRule>> {
        Ok(self.lock()?.work_process_rules.values().cloned().collect())
    }

    fn work_process_rule(&self, rule_id: RuleId) -> Result<Option<WorkProcessRule>> {
        Ok(self.lock()?.work_process_rules.get(&rule_id).cloned())
    }

    fn save_work_process_rule(&self, process: &WorkProcessRule) -> Result<()> {
        self.lock()?
            .work_process_rules
            .insert(process.rule_id, process.clone());
        Ok(())
    }

    fn work_processes(&self) -> Result<Vec<WorkProcess>> {
        Ok(self.lock()?.work_processes.values().cloned().collect())
    }

    fn work_process(&self, dataset: &str, cycle: &str) -> Result<Option<WorkProcess>> {
        Ok(self
            .lock()?
            .work_processes
            .get(&(dataset.to_string(), cycle.to_string()))
            .cloned())
    }

    fn save_work_process(&self, process: &WorkProcess) -> Result<()> {
        self.lock()?.work_processes.insert(
            (process.dataset.clone(), process.cycle.clone()),
            process.clone(),
        );
        Ok(())
    }

    fn system_config(&self, key: &str) -> Result<Option<SystemConfig>> {
        Ok(self.lock()?.system_config.get(key).cloned())
    }

    fn set_system_config(&self, config: &SystemConfig) -> Result<()> {
        self.lock()?
            .system_config
            .insert(config.config_key.clone(), config.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SourceScope;

    fn obs(variable: &str, sample: i64, value: &str) -> Observation {
        Observation::new(
            ObservationKey::new("nhanes", "2017-2018", "DEMO", sample, 0),
            variable,
            value,
        )
    }

    #[test]
    fn duplicate_in_batch_rejects_whole_batch() {
        let store = MemoryStore::new();
        let batch = vec![obs("RIDAGEYR", 1, "20"), obs("RIDAGEYR", 1, "21")];
        assert!(store.insert_observations(&batch).is_err());
        assert_eq!(store.observation_count().unwrap(), 0);
    }

    #[test]
    fn fetch_orders_by_key() {
        let store = MemoryStore::new();
        store
            .insert_observations(&[obs("RIDAGEYR", 2, "30"), obs("RIDAGEYR", 1, "20")])
            .unwrap();
        let filter = ObservationFilter::new(vec![SourceScope::new("RIDAGEYR", None)]);
        let rows = store.fetch_observations(&filter).unwrap();
        assert_eq!(rows[0].sample, 1);
        assert_eq!(rows[1].sample, 2);
    }

    #[test]
    fn compare_and_set_respects_current_type() {
        let store = MemoryStore::new();
        store
            .insert_variable(&Variable::new("AGE", VariableType::Other).unwrap())
            .unwrap();
        assert!(
            store
                .compare_and_set_variable_type("AGE", VariableType::Other, VariableType::Numeric)
                .unwrap()
        );
        assert!(
            !store
                .compare_and_set_variable_type("AGE", VariableType::Other, VariableType::Text)
                .unwrap()
        );
        assert_eq!(
            store.variable("AGE").unwrap().unwrap().variable_type,
            VariableType::Numeric
        );
    }
}
