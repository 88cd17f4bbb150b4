use std::collections::HashMap;

use rds_diff::AttributeDiff;
use rds_types::{Attributes, ResourceId, Timestamp};

use crate::item::Item;
use crate::observer::ObserverArena;

/// Collection, index, and tracking maps of one resource type.
///
/// Invariants maintained by the inject/eject engine:
/// - every key in `index` maps to an item that is also in `collection`, and
///   no two items share a key;
/// - the observer, snapshot, change, `modified`, and `saved` maps only hold
///   keys present in `index`;
/// - timestamps only move forward.
#[derive(Debug, Default)]
pub struct ResourceStore {
    pub(crate) collection: Vec<Item>,
    pub(crate) index: HashMap<ResourceId, Item>,
    pub(crate) observers: ObserverArena,
    pub(crate) previous_attributes: HashMap<ResourceId, Attributes>,
    pub(crate) changes: HashMap<ResourceId, AttributeDiff>,
    pub(crate) modified: HashMap<ResourceId, Timestamp>,
    pub(crate) collection_modified: Timestamp,
    pub(crate) saved: HashMap<ResourceId, Timestamp>,
}

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.collection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collection.is_empty()
    }

    /// Items in insertion order.
    pub fn items(&self) -> &[Item] {
        &self.collection
    }

    pub fn get(&self, id: &ResourceId) -> Option<&Item> {
        self.index.get(id)
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.index.contains_key(id)
    }

    pub fn changes(&self, id: &ResourceId) -> Option<&AttributeDiff> {
        self.changes.get(id)
    }

    pub fn previous(&self, id: &ResourceId) -> Option<&Attributes> {
        self.previous_attributes.get(id)
    }

    pub fn modified(&self, id: &ResourceId) -> Option<Timestamp> {
        self.modified.get(id).copied()
    }

    pub fn saved(&self, id: &ResourceId) -> Option<Timestamp> {
        self.saved.get(id).copied()
    }

    pub fn collection_modified(&self) -> Timestamp {
        self.collection_modified
    }

    /// Latest save across the whole collection.
    pub fn collection_saved(&self) -> Option<Timestamp> {
        self.saved.values().copied().max()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Register a brand-new item under `id` and start tracking it.
    pub(crate) fn insert(&mut self, id: ResourceId, item: Item, now: Timestamp) {
        self.collection.push(item.clone());
        self.observers.watch(id.clone(), &item);
        self.previous_attributes.insert(id.clone(), item.attributes());
        self.modified.insert(id.clone(), now);
        self.saved.insert(id.clone(), now);
        self.index.insert(id, item);
    }

    /// Remove one item and every piece of tracking state for it.
    pub(crate) fn remove(&mut self, id: &ResourceId) -> Option<Item> {
        let item = self.index.remove(id)?;
        if let Some(pos) = self.collection.iter().position(|c| c.ptr_eq(&item)) {
            self.collection.remove(pos);
        }
        self.observers.release(id);
        self.changes.remove(id);
        self.previous_attributes.remove(id);
        self.modified.remove(id);
        self.saved.remove(id);
        Some(item)
    }

    /// Remove everything, closing every observer.
    pub(crate) fn clear(&mut self) -> Vec<Item> {
        self.index.clear();
        self.observers.release_all();
        self.changes.clear();
        self.previous_attributes.clear();
        self.modified.clear();
        self.saved.clear();
        std::mem::take(&mut self.collection)
    }

    pub(crate) fn touch(&mut self, now: Timestamp) {
        if now > self.collection_modified {
            self.collection_modified = now;
        }
    }

    pub(crate) fn mark_saved(&mut self, id: &ResourceId, now: Timestamp) -> bool {
        if !self.index.contains_key(id) {
            return false;
        }
        self.saved.insert(id.clone(), now);
        true
    }

    /// Check the store invariants against the primary-key attribute.
    pub fn is_consistent(&self, id_attribute: &str) -> bool {
        if self.index.len() != self.collection.len() {
            return false;
        }
        let indexed = self.index.iter().all(|(id, item)| {
            let key_matches = item.with_attributes(|a| a.get(id_attribute).is_some_and(|v| id.matches(v)));
            key_matches && self.collection.iter().any(|c| c.ptr_eq(item))
        });
        let tracked = self.observers.keys().iter().all(|k| self.index.contains_key(k))
            && self.previous_attributes.keys().all(|k| self.index.contains_key(k))
            && self.changes.keys().all(|k| self.index.contains_key(k))
            && self.modified.keys().all(|k| self.index.contains_key(k))
            && self.saved.keys().all(|k| self.index.contains_key(k));
        indexed && tracked
    }
}
