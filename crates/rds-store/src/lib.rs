//! In-memory resource collections for the resource data store.
//!
//! A [`Registry`] owns one [`ResourceStore`] per registered resource type.
//! Every instance of a type is held exactly once as a canonical [`Item`];
//! the store's collection, its index, and every caller share that handle.
//!
//! # Operations
//!
//! - Inject / eject -- insert, merge, and remove items ([`Registry::inject`],
//!   [`Registry::eject`], [`Registry::eject_all`])
//! - Digest -- batch change detection against per-item snapshots
//!   ([`Registry::digest`])
//! - Linking -- attach related items as weak relation fields
//!   ([`Registry::link_all`])
//! - Reads -- [`Registry::get`], [`Registry::filter`], change and timestamp
//!   queries
//!
//! # Design Rules
//!
//! 1. Arguments are validated before anything is mutated.
//! 2. The resource type is checked before any other argument.
//! 3. Relation fields never own their targets.
//! 4. Nothing here performs I/O; remote fetches live in `rds-sdk`.

pub mod config;
pub mod digest;
pub mod error;
pub mod hooks;
pub mod inject;
pub mod item;
pub mod linker;
pub mod observer;
pub mod query;
pub mod registry;
pub mod store;

pub use config::StoreConfig;
pub use digest::DigestReport;
pub use error::{parse_id, HookError, StoreError, StoreResult};
pub use hooks::{NoOpHooks, ResourceHooks};
pub use inject::Injected;
pub use item::{Item, Related, WeakItem};
pub use observer::{Observer, ObserverArena};
pub use query::{Direction, Query};
pub use registry::Registry;
pub use store::ResourceStore;
