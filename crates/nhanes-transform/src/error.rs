use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("missing column: {0}")]
    MissingColumn(String),

    #[error("invalid key value in column {column} at row {row}")]
    InvalidKey { column: &'static str, row: usize },

    #[error(transparent)]
    Polars(#[from] PolarsError),
}

pub type Result<T> = std::result::Result<T, TransformError>;
