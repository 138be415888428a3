//! Transformation rule metadata.

use serde::{Deserialize, Serialize};

use crate::enums::VariableRole;
use crate::ids::RuleId;

/// A user-authored transformation rule. `module` names the code artifact
/// registered for the rule and equals `name` by convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub name: String,
    pub version: String,
    pub description: String,
    pub module: String,
    pub is_active: bool,
}

impl Rule {
    pub fn new(id: impl Into<RuleId>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            module: name.clone(),
            name,
            version: "0.0.1".to_string(),
            description: String::new(),
            is_active: true,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Declares a variable a rule reads (`Source`) or writes (`Target`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleVariable {
    pub rule_id: RuleId,
    pub variable: String,
    /// Dataset scope; `None` matches any dataset.
    pub dataset: Option<String>,
    pub role: VariableRole,
}

impl RuleVariable {
    pub fn source(rule_id: RuleId, variable: impl Into<String>, dataset: Option<&str>) -> Self {
        Self {
            rule_id,
            variable: variable.into(),
            dataset: dataset.map(str::to_string),
            role: VariableRole::Source,
        }
    }

    pub fn target(rule_id: RuleId, variable: impl Into<String>, dataset: Option<&str>) -> Self {
        Self {
            rule_id,
            variable: variable.into(),
            dataset: dataset.map(str::to_string),
            role: VariableRole::Target,
        }
    }
}

/// The declared variables of one rule, split by role and kept in
/// declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleVariables {
    pub sources: Vec<RuleVariable>,
    pub targets: Vec<RuleVariable>,
}

impl RuleVariables {
    pub fn from_rows(rows: impl IntoIterator<Item = RuleVariable>) -> Self {
        let mut out = Self::default();
        for row in rows {
            match row.role {
                VariableRole::Source => out.sources.push(row),
                VariableRole::Target => out.targets.push(row),
            }
        }
        out
    }

    /// Distinct source variable names in declaration order.
    pub fn source_names(&self) -> Vec<String> {
        distinct(self.sources.iter().map(|row| row.variable.as_str()))
    }

    /// Distinct target variable names in declaration order.
    pub fn target_names(&self) -> Vec<String> {
        distinct(self.targets.iter().map(|row| row.variable.as_str()))
    }

    pub fn is_runnable(&self) -> bool {
        !self.sources.is_empty() && !self.targets.is_empty()
    }
}

fn distinct<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in names {
        if !out.iter().any(|existing| existing == name) {
            out.push(name.to_string());
        }
    }
    out
}
