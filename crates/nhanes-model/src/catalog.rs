//! Survey catalog entities: cycles, groups, datasets, variables and
//! system configuration entries.

use serde::{Deserialize, Serialize};

use crate::enums::VariableType;
use crate::error::Result;
use crate::ids::checked_name;

/// A survey period such as `2017-2018`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cycle {
    pub name: String,
    /// Letter suffix of the cycle's file names (`J` for 2017-2018).
    pub year_code: Option<String>,
    pub base_url: String,
    pub dataset_url_pattern: String,
}

impl Cycle {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        Ok(Self {
            name: checked_name(name)?,
            year_code: None,
            base_url: "https://wwwn.cdc.gov/Nchs/Nhanes".to_string(),
            dataset_url_pattern: "%s/%s/%s_%s.XPT".to_string(),
        })
    }

    pub fn with_year_code(mut self, code: impl Into<String>) -> Self {
        self.year_code = Some(code.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub description: String,
}

/// A named table within a group, e.g. `DEMO` under `Demographics`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    pub description: String,
    pub group: Option<String>,
}

impl Dataset {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        Ok(Self {
            name: checked_name(name)?,
            description: String::new(),
            group: None,
        })
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

/// A survey field. `variable_type` changes only through the catalog
/// service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub description: String,
    pub variable_type: VariableType,
}

impl Variable {
    pub fn new(name: impl Into<String>, variable_type: VariableType) -> Result<Self> {
        Ok(Self {
            name: checked_name(name)?,
            description: String::new(),
            variable_type,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// A key/value system flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    pub config_key: String,
    /// Boolean switch for flag-style entries.
    pub config_check: bool,
    pub config_value: String,
}

impl SystemConfig {
    pub const AUTO_CREATE_WORKPROCESS: &'static str = "auto_create_workprocess";

    /// A flag is on when its check is set or its value reads `true`.
    pub fn is_enabled(&self) -> bool {
        self.config_check || self.config_value.trim().eq_ignore_ascii_case("true")
    }
}
