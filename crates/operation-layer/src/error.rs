use thiserror::Error;

/// The primary argument of a validated operation was empty or blank.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation}: input cannot be empty")]
pub struct InvalidInput {
    pub operation: String,
}

impl InvalidInput {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
        }
    }
}
