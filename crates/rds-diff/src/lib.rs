//! Diff engine for the resource data store.
//!
//! Compares two attribute snapshots of the same item and produces the
//! structured change set the digest records for it.
//!
//! # Key Types
//!
//! - [`AttributeDiff`] -- changed attributes keyed by name
//! - [`AttributeChange`] / [`ChangeKind`] -- added, removed or modified

pub mod attr_diff;

pub use attr_diff::{diff_attributes, AttributeChange, AttributeDiff, ChangeKind};
