//! Rule-driven normalization of NHANES observations.
//!
//! [`TransformationManager`] runs each active rule through the
//! [`RulePipeline`] stages, reading source observations through the
//! [`InputResolver`] and writing normalized rows back to the store.
//! [`WorkProcessTracker`] covers the operator-side state transitions.

pub mod catalog;
pub mod error;
pub mod manager;
pub mod pipeline;
pub mod redact;
pub mod resolver;
pub mod rules;
pub mod watchdog;
pub mod workprocess;

pub use catalog::{TypeUpdate, VariableCatalog};
pub use error::{LoadError, PipelineError, StageError};
pub use manager::{BatchReport, OutcomeKind, RuleOutcome, TransformationManager};
pub use pipeline::{RulePipeline, Stage};
pub use resolver::InputResolver;
pub use rules::{
    RuleRegistry, RuleRun, StageEnv, Transformation, TransformationInput, builtin_registry,
};
pub use workprocess::{BulkSelection, OPERATOR_RULE_STATUSES, WorkProcessTracker};
