use std::error::Error as StdError;
use std::sync::Arc;

use rds_types::{ResourceId, TypeError};
use serde_json::Value;

/// Boxed error returned by lifecycle hooks.
pub type HookError = Box<dyn StdError + Send + Sync>;

/// Errors from store operations.
///
/// Every variant names the operation that raised it. The enum is `Clone` so a
/// single failure can be handed to every caller waiting on a shared request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// An argument has the wrong type or shape.
    #[error("{op}: {message}")]
    IllegalArgument { op: &'static str, message: String },

    /// The operation references a resource type that was never registered.
    #[error("{op}: {resource} is not a registered resource!")]
    NonexistentResource { op: &'static str, resource: String },

    /// A resource type with this name is already registered.
    #[error("{op}: {resource} is already registered!")]
    DuplicateResource { op: &'static str, resource: String },

    /// Unexpected failure while running an otherwise synchronous operation.
    #[error("{op}: unhandled error: {source}")]
    Unhandled {
        op: &'static str,
        #[source]
        source: Arc<dyn StdError + Send + Sync>,
    },

    /// The store configuration could not be parsed.
    #[error("invalid store config: {0}")]
    Config(String),
}

impl StoreError {
    pub fn illegal(op: &'static str, message: impl Into<String>) -> Self {
        Self::IllegalArgument {
            op,
            message: message.into(),
        }
    }

    pub fn nonexistent(op: &'static str, resource: impl Into<String>) -> Self {
        Self::NonexistentResource {
            op,
            resource: resource.into(),
        }
    }

    /// Wrap a hook failure, keeping the original as the source.
    pub fn unhandled(op: &'static str, source: HookError) -> Self {
        Self::Unhandled {
            op,
            source: Arc::from(source),
        }
    }

    /// The operation name carried by this error, if any.
    pub fn op(&self) -> Option<&'static str> {
        match self {
            Self::IllegalArgument { op, .. }
            | Self::NonexistentResource { op, .. }
            | Self::DuplicateResource { op, .. }
            | Self::Unhandled { op, .. } => Some(op),
            Self::Config(_) => None,
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Parse a primary-key argument, reporting bad shapes as `IllegalArgument`.
pub fn parse_id(op: &'static str, value: &Value) -> StoreResult<ResourceId> {
    ResourceId::from_value(value).map_err(|e| match e {
        TypeError::InvalidId { .. } => StoreError::illegal(op, "id: Must be a string or a number!"),
        other => StoreError::illegal(op, format!("id: {other}")),
    })
}
