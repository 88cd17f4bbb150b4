//! Foundation types for the resource data store.
//!
//! Every other `rds` crate depends on `rds-types`.
//!
//! # Key Types
//!
//! - [`ResourceId`] -- Primary-key value, canonicalised so `5` and `"5"` agree
//! - [`Timestamp`] / [`MonotonicClock`] -- Strictly increasing store timestamps
//! - [`ResourceDefinition`] -- Static per-type configuration
//! - [`Relation`] / [`RelationKind`] -- Declared foreign-key relationships

pub mod definition;
pub mod error;
pub mod id;
pub mod temporal;

pub use definition::{
    Relation, RelationKind, ResourceDefinition, DEFAULT_ADAPTER, DEFAULT_BASE_URL,
    DEFAULT_ID_ATTRIBUTE,
};
pub use error::TypeError;
pub use id::{value_kind, ResourceId};
pub use temporal::{MonotonicClock, Timestamp};

/// Attribute bag of one resource item.
pub type Attributes = serde_json::Map<String, serde_json::Value>;
