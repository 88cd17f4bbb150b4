use serde_json::Value;
use thiserror::Error;

/// Errors raised by adapters.
///
/// The core never rewrites these; a failed fetch reaches every waiting
/// caller exactly as the adapter produced it.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum AdapterError {
    #[error("{url}: Not Found!")]
    NotFound { url: String },

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: Value },

    #[error("transport error: {0}")]
    Transport(String),
}

impl AdapterError {
    /// The response body, for errors that carry one.
    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Http { body, .. } => Some(body),
            _ => None,
        }
    }
}

pub type AdapterResult<T> = Result<T, AdapterError>;
