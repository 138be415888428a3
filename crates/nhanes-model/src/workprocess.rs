//! Work-process records: one per rule and one per dataset×cycle pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::WorkStatus;
use crate::ids::RuleId;

/// Execution state of a single rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkProcessRule {
    pub rule_id: RuleId,
    pub status: WorkStatus,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub attempt_count: u32,
    pub execution_logs: String,
    pub execution_time_ms: Option<u64>,
}

impl WorkProcessRule {
    pub fn new(rule_id: RuleId) -> Self {
        Self {
            rule_id,
            status: WorkStatus::Pending,
            last_synced_at: None,
            attempt_count: 0,
            execution_logs: String::new(),
            execution_time_ms: None,
        }
    }

    /// Records a successful or already-applied outcome.
    pub fn mark_complete(&mut self, log: impl Into<String>) {
        self.status = WorkStatus::Complete;
        self.attempt_count = 0;
        self.execution_logs = log.into();
        self.last_synced_at = Some(Utc::now());
    }

    /// Records a failed attempt.
    pub fn mark_error(&mut self, log: impl Into<String>) {
        self.status = WorkStatus::Error;
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.execution_logs = log.into();
        self.last_synced_at = Some(Utc::now());
    }
}

/// Download/load/normalization state of a dataset in a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkProcess {
    pub dataset: String,
    pub cycle: String,
    pub status: WorkStatus,
    pub is_download: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub source_file_version: String,
    pub source_file_size: u64,
    pub chk_raw: bool,
    pub chk_normalization: bool,
    pub system_version: String,
    pub time_download: f64,
    pub time_raw: f64,
    pub time_normalization: f64,
    pub records_raw: u64,
    pub records_normalization: u64,
    pub n_samples: u64,
    pub n_variables: u64,
}

impl WorkProcess {
    pub fn new(dataset: impl Into<String>, cycle: impl Into<String>, status: WorkStatus) -> Self {
        Self {
            dataset: dataset.into(),
            cycle: cycle.into(),
            status,
            is_download: false,
            last_synced_at: None,
            source_file_version: String::new(),
            source_file_size: 0,
            chk_raw: false,
            chk_normalization: false,
            system_version: String::new(),
            time_download: 0.0,
            time_raw: 0.0,
            time_normalization: 0.0,
            records_raw: 0,
            records_normalization: 0,
            n_samples: 0,
            n_variables: 0,
        }
    }

    /// Clears every counter and check flag and returns to `pending`.
    pub fn reset(&mut self) {
        let is_download = self.is_download;
        *self = Self::new(
            std::mem::take(&mut self.dataset),
            std::mem::take(&mut self.cycle),
            WorkStatus::Pending,
        );
        self.is_download = is_download;
        self.last_synced_at = Some(Utc::now());
    }

    pub fn key(&self) -> (&str, &str) {
        (self.dataset.as_str(), self.cycle.as_str())
    }
}
