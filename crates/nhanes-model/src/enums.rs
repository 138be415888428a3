//! Type-safe enumerations for catalog and work-process metadata.
//!
//! These enums are stored as short string codes (`num`, `pending`, `i`, ...)
//! and parsed back case-insensitively.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// Declared semantic type of a variable.
///
/// `Other` is the "not yet known" marker: rules targeting an `Other`
/// variable get its concrete type inferred from the produced values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableType {
    /// Binary: two distinct values (0/1, yes/no, true/false).
    Binary,
    /// Categorical: small finite label set.
    Categorical,
    /// Numeric: integer or floating point values.
    Numeric,
    /// Free text.
    Text,
    /// Unknown type, inferred lazily.
    #[default]
    Other,
}

impl VariableType {
    /// Returns the short storage code.
    pub fn as_code(&self) -> &'static str {
        match self {
            VariableType::Binary => "bin",
            VariableType::Categorical => "cat",
            VariableType::Numeric => "num",
            VariableType::Text => "tex",
            VariableType::Other => "oth",
        }
    }

    /// Returns the human-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            VariableType::Binary => "Binary",
            VariableType::Categorical => "Category",
            VariableType::Numeric => "Numeric",
            VariableType::Text => "Text",
            VariableType::Other => "Other",
        }
    }

    /// Returns true for types whose values are coerced to numbers.
    pub fn is_numeric_like(&self) -> bool {
        matches!(self, VariableType::Numeric | VariableType::Binary)
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VariableType {
    type Err = ModelError;

    /// Parses both storage codes (`num`) and full names (`numeric`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bin" | "binary" => Ok(VariableType::Binary),
            "cat" | "category" | "categorical" => Ok(VariableType::Categorical),
            "num" | "numeric" => Ok(VariableType::Numeric),
            "tex" | "text" => Ok(VariableType::Text),
            "oth" | "other" => Ok(VariableType::Other),
            _ => Err(ModelError::UnknownVariableType(s.to_string())),
        }
    }
}

/// Status vocabulary shared by both work-process state machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    #[default]
    Pending,
    Complete,
    Error,
    Standby,
    Delete,
    NoFile,
}

impl WorkStatus {
    pub const ALL: [WorkStatus; 6] = [
        WorkStatus::Pending,
        WorkStatus::Complete,
        WorkStatus::Error,
        WorkStatus::Standby,
        WorkStatus::Delete,
        WorkStatus::NoFile,
    ];

    /// Returns the storage code.
    pub fn as_code(&self) -> &'static str {
        match self {
            WorkStatus::Pending => "pending",
            WorkStatus::Complete => "complete",
            WorkStatus::Error => "error",
            WorkStatus::Standby => "standby",
            WorkStatus::Delete => "delete",
            WorkStatus::NoFile => "no_file",
        }
    }

    /// Returns true when the transformation manager may execute the rule.
    pub fn is_runnable(&self) -> bool {
        matches!(self, WorkStatus::Pending | WorkStatus::Error)
    }
}

impl fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_code())
    }
}

impl FromStr for WorkStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "pending" => Ok(WorkStatus::Pending),
            "complete" => Ok(WorkStatus::Complete),
            "error" => Ok(WorkStatus::Error),
            "standby" | "stand_by" => Ok(WorkStatus::Standby),
            "delete" => Ok(WorkStatus::Delete),
            "no_file" | "nofile" => Ok(WorkStatus::NoFile),
            _ => Err(ModelError::UnknownStatus(s.to_string())),
        }
    }
}

/// Whether a rule variable is read (source) or written (target).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableRole {
    /// Source variable ("in").
    Source,
    /// Target variable ("out").
    Target,
}

impl VariableRole {
    pub fn as_code(&self) -> &'static str {
        match self {
            VariableRole::Source => "i",
            VariableRole::Target => "o",
        }
    }
}

impl fmt::Display for VariableRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableRole::Source => f.write_str("in"),
            VariableRole::Target => f.write_str("out"),
        }
    }
}

impl FromStr for VariableRole {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "i" | "in" | "source" => Ok(VariableRole::Source),
            "o" | "out" | "target" => Ok(VariableRole::Target),
            _ => Err(ModelError::UnknownRole(s.to_string())),
        }
    }
}

/// Direction of a type coercion pass in the rule pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoercionMode {
    /// Coerce the resolved input table against source variable types.
    In,
    /// Coerce the result table against target variable types.
    Out,
}

impl fmt::Display for CoercionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoercionMode::In => f.write_str("in"),
            CoercionMode::Out => f.write_str("out"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_type_parses_codes_and_names() {
        assert_eq!("num".parse::<VariableType>().unwrap(), VariableType::Numeric);
        assert_eq!("Binary".parse::<VariableType>().unwrap(), VariableType::Binary);
        assert_eq!("CAT".parse::<VariableType>().unwrap(), VariableType::Categorical);
        assert!("date".parse::<VariableType>().is_err());
    }

    #[test]
    fn status_code_round_trips() {
        for status in WorkStatus::ALL {
            assert_eq!(status.as_code().parse::<WorkStatus>().unwrap(), status);
        }
        assert_eq!("stand-by".parse::<WorkStatus>().unwrap(), WorkStatus::Standby);
    }

    #[test]
    fn only_pending_and_error_are_runnable() {
        let runnable: Vec<_> = WorkStatus::ALL
            .into_iter()
            .filter(WorkStatus::is_runnable)
            .collect();
        assert_eq!(runnable, vec![WorkStatus::Pending, WorkStatus::Error]);
    }

    #[test]
    fn role_accepts_short_codes() {
        assert_eq!("i".parse::<VariableRole>().unwrap(), VariableRole::Source);
        assert_eq!("out".parse::<VariableRole>().unwrap(), VariableRole::Target);
    }
}
