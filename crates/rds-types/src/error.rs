use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    /// A primary-key value was neither a string nor a number.
    #[error("Must be a string or a number! (got {actual})")]
    InvalidId { actual: &'static str },

    /// A resource definition failed its structural checks.
    #[error("invalid resource definition: {0}")]
    InvalidDefinition(String),
}
