use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid variable name: {0:?}")]
    InvalidVariableName(String),
    #[error("unknown variable type: {0}")]
    UnknownVariableType(String),
    #[error("unknown work process status: {0}")]
    UnknownStatus(String),
    #[error("unknown rule variable role: {0}")]
    UnknownRole(String),
    #[error("{0}")]
    Message(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
