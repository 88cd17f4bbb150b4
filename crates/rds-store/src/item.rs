//! Canonical item handles.
//!
//! An [`Item`] is a shared handle to the one in-memory record representing a
//! resource instance. Every holder (the store's collection, its index, UI
//! consumers, linked relation fields) sees the same record, so a mutation
//! through any handle is visible through all of them.
//!
//! Relation fields live beside the attributes, not inside them. They hold
//! [`WeakItem`]s: a link never keeps its target alive and two items that
//! point at each other never form an ownership cycle.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use rds_types::Attributes;
use serde_json::Value;

/// Derived reference(s) stored in a relation field.
#[derive(Clone, Debug)]
pub(crate) enum Link {
    One(WeakItem),
    Many(Vec<WeakItem>),
}

struct Record {
    attrs: Attributes,
    links: BTreeMap<String, Link>,
    /// Bumped on every mutable access to `attrs`.
    revision: u64,
}

/// Shared handle to a canonical item.
#[derive(Clone)]
pub struct Item(Arc<RwLock<Record>>);

/// Non-owning handle to a canonical item.
#[derive(Clone)]
pub struct WeakItem(Weak<RwLock<Record>>);

/// Resolved contents of a relation field.
#[derive(Clone, Debug)]
pub enum Related {
    One(Item),
    Many(Vec<Item>),
}

impl Item {
    /// Wrap an attribute bag in a new, unshared record.
    pub fn new(attrs: Attributes) -> Self {
        Self(Arc::new(RwLock::new(Record {
            attrs,
            links: BTreeMap::new(),
            revision: 0,
        })))
    }

    fn read(&self) -> RwLockReadGuard<'_, Record> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Record> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Value of one attribute.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.read().attrs.get(key).cloned()
    }

    /// Set one attribute, returning the previous value.
    pub fn set(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.update(|attrs| attrs.insert(key.into(), value))
    }

    /// Remove one attribute, returning its value.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.update(|attrs| attrs.remove(key))
    }

    /// Mutate the attributes in place.
    pub fn update<R>(&self, f: impl FnOnce(&mut Attributes) -> R) -> R {
        let mut record = self.write();
        record.revision += 1;
        f(&mut record.attrs)
    }

    /// Read the attributes without copying them.
    pub fn with_attributes<R>(&self, f: impl FnOnce(&Attributes) -> R) -> R {
        f(&self.read().attrs)
    }

    /// Deep copy of the current attributes.
    pub fn attributes(&self) -> Attributes {
        self.read().attrs.clone()
    }

    /// Attributes as a JSON object. Relation fields are not included.
    pub fn to_json(&self) -> Value {
        Value::Object(self.attributes())
    }

    /// Current revision counter.
    pub fn revision(&self) -> u64 {
        self.read().revision
    }

    /// Revision and attribute copy taken under one lock.
    pub(crate) fn snapshot(&self) -> (u64, Attributes) {
        let record = self.read();
        (record.revision, record.attrs.clone())
    }

    /// Shallow merge: every key of `attrs` overwrites the stored value.
    pub(crate) fn merge(&self, attrs: Attributes) {
        self.update(|current| {
            for (key, value) in attrs {
                current.insert(key, value);
            }
        });
    }

    /// Returns `true` if both handles point at the same record.
    pub fn ptr_eq(&self, other: &Item) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn downgrade(&self) -> WeakItem {
        WeakItem(Arc::downgrade(&self.0))
    }

    /// Resolve a relation field. Targets that no longer exist are dropped.
    pub fn related(&self, field: &str) -> Option<Related> {
        let link = self.read().links.get(field).cloned()?;
        match link {
            Link::One(target) => target.upgrade().map(Related::One),
            Link::Many(targets) => Some(Related::Many(
                targets.iter().filter_map(WeakItem::upgrade).collect(),
            )),
        }
    }

    /// The single item linked under `field`.
    pub fn related_one(&self, field: &str) -> Option<Item> {
        match self.related(field)? {
            Related::One(item) => Some(item),
            Related::Many(_) => None,
        }
    }

    /// The items linked under `field`; empty if the field is unset.
    pub fn related_many(&self, field: &str) -> Vec<Item> {
        match self.related(field) {
            Some(Related::Many(items)) => items,
            Some(Related::One(item)) => vec![item],
            None => Vec::new(),
        }
    }

    /// Names of the relation fields currently set.
    pub fn link_fields(&self) -> Vec<String> {
        self.read().links.keys().cloned().collect()
    }

    // Links are derived data: changing them does not bump the revision.
    pub(crate) fn set_link(&self, field: &str, link: Link) {
        self.write().links.insert(field.to_string(), link);
    }

    pub(crate) fn clear_link(&self, field: &str) {
        self.write().links.remove(field);
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let record = self.read();
        f.debug_struct("Item")
            .field("attrs", &record.attrs)
            .field("links", &record.links.keys().collect::<Vec<_>>())
            .field("revision", &record.revision)
            .finish()
    }
}

impl WeakItem {
    pub fn upgrade(&self) -> Option<Item> {
        self.0.upgrade().map(Item)
    }

    /// Returns `true` if this handle points at `item`'s record.
    pub fn points_to(&self, item: &Item) -> bool {
        std::ptr::eq(self.0.as_ptr(), Arc::as_ptr(&item.0))
    }
}

impl fmt::Debug for WeakItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(item) => write!(f, "WeakItem({:p}, revision {})", self.0.as_ptr(), item.revision()),
            None => write!(f, "WeakItem(<dropped>)"),
        }
    }
}
