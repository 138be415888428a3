//! Pipeline error taxonomy.

use std::time::Duration;

use nhanes_store::StoreError;
use thiserror::Error;

use crate::pipeline::Stage;

/// Rule code could not be resolved from the registry.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("rule module not found: {module}")]
    ModuleNotFound { module: String },

    #[error("rule module {module} has no entry point `{entry_point}`")]
    ClassNotFound { module: String, entry_point: String },
}

/// A pipeline stage reported failure.
#[derive(Debug, Error)]
#[error("{} {detail}", stage.failure_message())]
pub struct StageError {
    pub stage: Stage,
    pub detail: String,
}

impl StageError {
    pub fn new(stage: Stage, detail: impl Into<String>) -> Self {
        Self {
            stage,
            detail: detail.into(),
        }
    }
}

/// Every way a rule run can fail. None of these escape a batch; they are
/// recorded on the rule's work process instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("transformation timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("transformation panicked: {0}")]
    Panicked(String),
}

impl PipelineError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Short label for summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Configuration(_) => "configuration",
            PipelineError::Load(_) => "load",
            PipelineError::Stage(_) => "stage",
            PipelineError::Store(_) => "store",
            PipelineError::Timeout(_) => "timeout",
            PipelineError::Panicked(_) => "panic",
        }
    }
}
