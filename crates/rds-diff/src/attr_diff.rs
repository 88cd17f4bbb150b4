//! Attribute-level diff: compare two snapshots of one item.
//!
//! Snapshots are `serde_json::Map<String, Value>`. The diff is shallow on
//! keys and deep on values: a nested object that changed anywhere shows up as
//! one `Modified` entry for its top-level key.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::{Map, Value};

/// Changed attributes of one item, keyed by attribute name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AttributeDiff(BTreeMap<String, AttributeChange>);

/// What happened to one attribute.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum AttributeChange {
    Added { value: Value },
    Removed { value: Value },
    Modified { old: Value, new: Value },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

impl AttributeChange {
    /// Classify one key given its value on each side. Equal or absent on both
    /// sides is no change.
    pub fn between(old: Option<&Value>, new: Option<&Value>) -> Option<Self> {
        match (old, new) {
            (None, None) => None,
            (None, Some(value)) => Some(Self::Added { value: value.clone() }),
            (Some(value), None) => Some(Self::Removed { value: value.clone() }),
            (Some(a), Some(b)) if a == b => None,
            (Some(a), Some(b)) => Some(Self::Modified {
                old: a.clone(),
                new: b.clone(),
            }),
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Added { .. } => ChangeKind::Added,
            Self::Removed { .. } => ChangeKind::Removed,
            Self::Modified { .. } => ChangeKind::Modified,
        }
    }

    /// Value before the change; `None` for additions.
    pub fn old_value(&self) -> Option<&Value> {
        match self {
            Self::Added { .. } => None,
            Self::Removed { value } => Some(value),
            Self::Modified { old, .. } => Some(old),
        }
    }

    /// Value after the change; `None` for removals.
    pub fn new_value(&self) -> Option<&Value> {
        match self {
            Self::Added { value } => Some(value),
            Self::Removed { .. } => None,
            Self::Modified { new, .. } => Some(new),
        }
    }
}

impl AttributeDiff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, key: &str) -> Option<&AttributeChange> {
        self.0.get(key)
    }

    /// Changed attribute names in key order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeChange)> {
        self.0.iter().map(|(k, c)| (k.as_str(), c))
    }

    /// Number of changes of `kind`.
    pub fn count(&self, kind: ChangeKind) -> usize {
        self.0.values().filter(|c| c.kind() == kind).count()
    }
}

/// Compare two attribute snapshots of the same item.
pub fn diff_attributes(old: &Map<String, Value>, new: &Map<String, Value>) -> AttributeDiff {
    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    AttributeDiff(
        keys.into_iter()
            .filter_map(|key| {
                AttributeChange::between(old.get(key), new.get(key)).map(|c| (key.clone(), c))
            })
            .collect(),
    )
}
