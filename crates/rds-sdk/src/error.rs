use rds_adapter::AdapterError;
use rds_store::StoreError;
use rds_types::ResourceId;
use thiserror::Error;

/// Errors from the data store facade.
///
/// `Clone` so one failed fetch can be delivered to every caller that joined
/// it.
#[derive(Debug, Clone, Error)]
pub enum SdkError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The adapter's own error, unchanged.
    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("find: no adapter registered under {0:?}")]
    AdapterNotFound(String),

    /// The request this caller joined was dropped before it settled.
    #[error("find: request for {resource} {id} was abandoned before it settled")]
    RequestAbandoned { resource: String, id: ResourceId },
}

impl SdkError {
    /// The wrapped store error, if this is one.
    pub fn as_store(&self) -> Option<&StoreError> {
        match self {
            Self::Store(e) => Some(e),
            _ => None,
        }
    }

    /// The wrapped adapter error, if this is one.
    pub fn as_adapter(&self) -> Option<&AdapterError> {
        match self {
            Self::Adapter(e) => Some(e),
            _ => None,
        }
    }
}

pub type SdkResult<T> = Result<T, SdkError>;
