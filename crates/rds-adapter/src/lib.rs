//! Adapter contract for the resource data store.
//!
//! Adapters move items between the store and a persistence layer. The store
//! only ever calls [`Adapter::find`]; errors pass through it untouched.
//!
//! # Key Types
//!
//! - [`Adapter`] -- async persistence trait
//! - [`FindRequest`] -- one resolved single-item fetch
//! - [`InMemoryAdapter`] -- URL-keyed canned responses for tests and embedding
//! - [`resolve_endpoint`] -- nested URL construction from parent relations

pub mod adapter;
pub mod endpoint;
pub mod error;
pub mod memory;

pub use adapter::{Adapter, FindRequest};
pub use endpoint::{make_path, resolve_endpoint, Endpoint};
pub use error::{AdapterError, AdapterResult};
pub use memory::InMemoryAdapter;
