use std::collections::HashMap;

use rds_types::{Attributes, ResourceId};

use crate::item::{Item, WeakItem};

/// Change-watch handle for one stored item.
///
/// The observer remembers the item revision it last looked at. Every mutable
/// access to an item bumps its revision, so an unchanged revision proves the
/// attributes are unchanged and the digest can skip the diff.
#[derive(Debug)]
pub struct Observer {
    item: WeakItem,
    seen_revision: u64,
    open: bool,
}

impl Observer {
    /// Start watching `item` from its current revision.
    pub fn open(item: &Item) -> Self {
        Self {
            item: item.downgrade(),
            seen_revision: item.revision(),
            open: true,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Stop watching. A closed observer never reports changes again.
    pub fn close(&mut self) {
        self.open = false;
    }

    /// If the item moved since the last poll, return its revision and a
    /// snapshot of its attributes, and remember that revision as seen.
    pub fn poll(&mut self) -> Option<(u64, Attributes)> {
        if !self.open {
            return None;
        }
        let item = self.item.upgrade()?;
        if item.revision() == self.seen_revision {
            return None;
        }
        let (revision, snapshot) = item.snapshot();
        self.seen_revision = revision;
        Some((revision, snapshot))
    }
}

/// Observers of one store, keyed by primary key.
#[derive(Debug, Default)]
pub struct ObserverArena {
    handles: HashMap<ResourceId, Observer>,
}

impl ObserverArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an observer for `item`, closing any previous one under `id`.
    pub fn watch(&mut self, id: ResourceId, item: &Item) {
        if let Some(mut old) = self.handles.insert(id, Observer::open(item)) {
            old.close();
        }
    }

    /// Close and drop the observer under `id`.
    pub fn release(&mut self, id: &ResourceId) -> bool {
        match self.handles.remove(id) {
            Some(mut observer) => {
                observer.close();
                true
            }
            None => false,
        }
    }

    /// Close and drop every observer.
    pub fn release_all(&mut self) -> usize {
        let count = self.handles.len();
        for (_, mut observer) in self.handles.drain() {
            observer.close();
        }
        count
    }

    pub fn get_mut(&mut self, id: &ResourceId) -> Option<&mut Observer> {
        self.handles.get_mut(id)
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.handles.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Primary keys with an open observer, sorted.
    pub fn keys(&self) -> Vec<ResourceId> {
        let mut keys: Vec<ResourceId> = self.handles.keys().cloned().collect();
        keys.sort();
        keys
    }
}
