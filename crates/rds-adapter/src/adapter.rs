use std::sync::Arc;

use async_trait::async_trait;
use rds_types::{Attributes, ResourceDefinition, ResourceId};
use serde_json::Value;

use crate::error::AdapterResult;

/// A single-item fetch handed to an adapter.
#[derive(Clone, Debug)]
pub struct FindRequest {
    pub resource: Arc<ResourceDefinition>,
    pub id: ResourceId,
    /// Fully resolved URL, nested parents included.
    pub url: String,
    /// Query parameters left after endpoint resolution.
    pub params: Attributes,
}

/// Persistence layer behind a resource type.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Fetch the raw payload of one item.
    async fn find(&self, request: &FindRequest) -> AdapterResult<Value>;
}
