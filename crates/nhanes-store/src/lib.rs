//! Storage for NHANES observations, catalog metadata, rules and
//! work-process state.
//!
//! The pipeline talks to storage only through [`DataStore`]. Two adapters
//! are provided:
//!
//! - [`MemoryStore`] - in-process maps, used by tests and dry runs
//! - [`SqliteStore`] - a single SQLite file with WAL journaling
//!
//! Both adapters insert observation batches atomically: either every row in
//! the batch is written or none is.

mod error;
mod memory;
mod sqlite;
mod store;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::{DataStore, ObservationFilter, SourceScope};
