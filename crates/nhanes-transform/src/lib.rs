//! Reshaping and typing of NHANES observation data.
//!
//! - [`pivot`] turns long `(key, variable, value)` rows into a [`WideTable`]
//!   and back.
//! - [`coercion`] casts columns to their declared [`VariableType`].
//! - [`inference`] guesses a concrete type for variables declared `other`.
//!
//! [`VariableType`]: nhanes_model::VariableType

pub mod coercion;
pub mod data_utils;
pub mod error;
pub mod frame;
pub mod inference;
pub mod pivot;
pub mod value;

pub use coercion::{CoercionReport, coerce_column, set_data_types, target_dtype};
pub use error::{Result, TransformError};
pub use frame::{KEY_COLUMNS, WideTable, is_key_column};
pub use inference::{DEFAULT_CATEGORICAL_RATIO, distinct_values, infer_variable_type};
pub use pivot::{MissingCells, key_at, pivot, unpivot};
pub use value::Value;
