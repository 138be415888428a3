//! Single-writer access to variable types.
//!
//! Every type change made by the pipeline goes through
//! [`VariableCatalog::record_inferred`], which holds a process-wide writer
//! lock and performs a compare-and-set from `other` in the store. A type
//! that is no longer `other` when the write lands is kept and the inference
//! is rejected.

use std::sync::Mutex;

use tracing::{info, warn};

use nhanes_model::VariableType;
use nhanes_store::DataStore;

use crate::error::PipelineError;

static WRITER: Mutex<()> = Mutex::new(());

/// Result of recording an inferred type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeUpdate {
    /// The variable was `other` and now carries the inferred type.
    Applied(VariableType),
    /// The variable already had a concrete type; the stored type wins.
    Rejected { stored: VariableType },
    /// Inference produced `other`; nothing to write.
    Unchanged,
}

pub struct VariableCatalog<'a> {
    store: &'a dyn DataStore,
}

impl<'a> VariableCatalog<'a> {
    pub fn new(store: &'a dyn DataStore) -> Self {
        Self { store }
    }

    /// Declared types for `names`, in order. Unknown variables are a
    /// configuration error.
    pub fn types_of(&self, names: &[String]) -> Result<Vec<(String, VariableType)>, PipelineError> {
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            let variable = self.store.variable(name)?.ok_or_else(|| {
                PipelineError::configuration(format!("variable {name} is not in the catalog"))
            })?;
            out.push((name.clone(), variable.variable_type));
        }
        Ok(out)
    }

    pub fn record_inferred(
        &self,
        name: &str,
        inferred: VariableType,
    ) -> Result<TypeUpdate, PipelineError> {
        if inferred == VariableType::Other {
            return Ok(TypeUpdate::Unchanged);
        }
        // The store compare-and-set stays authoritative after a poisoned lock.
        let _guard = WRITER.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if self
            .store
            .compare_and_set_variable_type(name, VariableType::Other, inferred)?
        {
            info!(variable = %name, variable_type = %inferred, "variable type inferred");
            return Ok(TypeUpdate::Applied(inferred));
        }
        let stored = self
            .store
            .variable(name)?
            .map(|variable| variable.variable_type)
            .unwrap_or(VariableType::Other);
        warn!(
            variable = %name,
            inferred = %inferred,
            stored = %stored,
            "type inference rejected, variable already typed"
        );
        Ok(TypeUpdate::Rejected { stored })
    }
}
