use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Numeric identifier of a transformation rule.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RuleId(i64);

impl RuleId {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for RuleId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RuleId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| ModelError::Message(format!("invalid rule id: {s}")))
    }
}

/// Trims a catalog name and rejects empty values.
pub fn checked_name(value: impl Into<String>) -> Result<String, ModelError> {
    let value = value.into();
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ModelError::InvalidVariableName(value));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_id_parses_and_orders() {
        let a: RuleId = "2".parse().unwrap();
        let b = RuleId::new(10);
        assert!(a < b);
        assert_eq!(a.to_string(), "2");
        assert!("abc".parse::<RuleId>().is_err());
    }

    #[test]
    fn checked_name_trims() {
        assert_eq!(checked_name(" RIDAGEYR ").unwrap(), "RIDAGEYR");
        assert!(checked_name("   ").is_err());
    }
}
