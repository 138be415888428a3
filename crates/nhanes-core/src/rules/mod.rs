//! Transformation rules: the contract, the registry and the shipped rules.

pub mod builtin;
pub mod contract;
pub mod registry;

pub use contract::{RuleRun, StageEnv, StageResult, Transformation, TransformationInput, base};
pub use registry::{RuleFactory, RuleRegistry, build_builtin_registry, builtin_registry};
