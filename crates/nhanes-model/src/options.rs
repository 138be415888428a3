//! Configuration options for rule processing.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Options controlling a transformation batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineOptions {
    /// Version tag of raw (ingested) observations.
    pub raw_version: String,

    /// Version tag written on every observation a rule produces.
    pub normalized_version: String,

    /// Distinct-to-row ratio below which a string column is inferred as
    /// categorical.
    pub categorical_ratio: f64,

    /// Upper bound on a rule's `apply_transformation` runtime.
    /// `None` disables the watchdog.
    pub rule_timeout_secs: Option<u64>,

    /// Export name every rule module registers its implementation under.
    pub entry_point: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            raw_version: "nhanes".to_string(),
            normalized_version: "normalized".to_string(),
            categorical_ratio: 0.1,
            rule_timeout_secs: Some(300),
            entry_point: "rule".to_string(),
        }
    }
}

impl PipelineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.rule_timeout_secs = timeout.map(|value| value.as_secs().max(1));
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.rule_timeout_secs.map(Duration::from_secs)
    }
}
