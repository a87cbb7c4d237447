use thiserror::Error;

use crate::types::ElemType;

/// Canonical result for core and the optimizer.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Type mismatch in {context}: expected {expected}, found {found}")]
    TypeMismatch {
        context: String,
        expected: ElemType,
        found: ElemType,
    },

    #[error("Graph error: {0}")]
    Graph(String),

    #[error("Pipeline parse error: {0}")]
    Parse(String),

    #[error("Hashing error: {0}")]
    Hash(String),

    #[error("Internal invariant failed: {0}")]
    Invariant(String),
}

impl Error {
    pub fn type_mismatch(context: impl Into<String>, expected: &ElemType, found: &ElemType) -> Self {
        Error::TypeMismatch {
            context: context.into(),
            expected: expected.clone(),
            found: found.clone(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Hash(e.to_string())
    }
}
