//! Client-side resource data store.
//!
//! [`DataStore`] is the main entry point for applications: register resource
//! types and adapters, inject and fetch items, and poll for changes.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use rds_sdk::{DataStore, FindOptions, InMemoryAdapter, ResourceDefinition};
//! use serde_json::json;
//!
//! # async fn run() -> rds_sdk::SdkResult<()> {
//! let store = DataStore::new();
//! let adapter = Arc::new(InMemoryAdapter::new());
//! adapter.respond("/posts/5", json!({"id": 5, "title": "Hello"}));
//! store.register_adapter("http", adapter);
//! store.register_resource(ResourceDefinition::new("post").with_endpoint("posts"))?;
//!
//! let post = store.find("post", &json!(5), FindOptions::default()).await?;
//! post.set("title", json!("Hello, world"));
//! assert!(!store.digest().is_clean());
//! # Ok(())
//! # }
//! ```

mod coordinator;
pub mod datastore;
pub mod error;
pub mod options;

pub use datastore::DataStore;
pub use error::{SdkError, SdkResult};
pub use options::FindOptions;

// Re-export key types
pub use rds_adapter::{Adapter, AdapterError, AdapterResult, FindRequest, InMemoryAdapter};
pub use rds_diff::{AttributeChange, AttributeDiff, ChangeKind};
pub use rds_store::{
    DigestReport, HookError, Injected, Item, NoOpHooks, Related, ResourceHooks, StoreConfig,
    StoreError,
};
pub use rds_types::{Attributes, Relation, RelationKind, ResourceDefinition, ResourceId, Timestamp};
