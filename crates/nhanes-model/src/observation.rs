//! Long-format observation rows.

use serde::{Deserialize, Serialize};

use crate::ids::RuleId;

/// Composite identity of one observation, minus the variable.
///
/// Rows of a wide table are identified by this key; ordering is the
/// lexicographic field order and is used wherever a stable row order is
/// required.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObservationKey {
    pub version: String,
    pub cycle: String,
    pub dataset: String,
    pub sample: i64,
    pub sequence: i64,
}

impl ObservationKey {
    pub fn new(
        version: impl Into<String>,
        cycle: impl Into<String>,
        dataset: impl Into<String>,
        sample: i64,
        sequence: i64,
    ) -> Self {
        Self {
            version: version.into(),
            cycle: cycle.into(),
            dataset: dataset.into(),
            sample,
            sequence,
        }
    }
}

/// A single measured or derived value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub version: String,
    pub cycle: String,
    pub dataset: String,
    pub variable: String,
    pub sample: i64,
    pub sequence: i64,
    pub value: String,
    /// Set on rows produced by a rule.
    pub rule_id: Option<RuleId>,
}

impl Observation {
    pub fn new(key: ObservationKey, variable: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            version: key.version,
            cycle: key.cycle,
            dataset: key.dataset,
            variable: variable.into(),
            sample: key.sample,
            sequence: key.sequence,
            value: value.into(),
            rule_id: None,
        }
    }

    pub fn with_rule(mut self, rule_id: RuleId) -> Self {
        self.rule_id = Some(rule_id);
        self
    }

    pub fn key(&self) -> ObservationKey {
        ObservationKey {
            version: self.version.clone(),
            cycle: self.cycle.clone(),
            dataset: self.dataset.clone(),
            sample: self.sample,
            sequence: self.sequence,
        }
    }

    /// Full uniqueness key: the observation key plus the variable name.
    pub fn identity(&self) -> (ObservationKey, &str) {
        (self.key(), self.variable.as_str())
    }
}
