use rds_diff::diff_attributes;
use rds_types::ResourceId;
use tracing::debug;

use crate::registry::Registry;

/// Outcome of one digest pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DigestReport {
    /// Observers polled across all resource types.
    pub scanned: usize,
    /// `(resource, id)` of every item whose attributes changed, in
    /// resource-name then key order.
    pub changed: Vec<(String, ResourceId)>,
}

impl DigestReport {
    pub fn is_clean(&self) -> bool {
        self.changed.is_empty()
    }
}

impl Registry {
    /// Detect attribute changes on every stored item of every type.
    ///
    /// Items whose revision did not move since the last pass are skipped
    /// without diffing. For the rest, a non-empty diff against the stored
    /// snapshot replaces `changes`, stamps `modified` and the collection,
    /// and becomes the new snapshot. Running digest twice with no mutation
    /// in between changes nothing the second time.
    pub fn digest(&mut self) -> DigestReport {
        let mut report = DigestReport::default();
        let mut names: Vec<String> = self.resources.keys().cloned().collect();
        names.sort();

        for name in names {
            let Some(resource) = self.resources.get_mut(&name) else {
                continue;
            };
            let store = &mut resource.store;
            for id in store.observers.keys() {
                report.scanned += 1;
                let Some(observer) = store.observers.get_mut(&id) else {
                    continue;
                };
                let Some((revision, snapshot)) = observer.poll() else {
                    continue;
                };
                let diff = match store.previous_attributes.get(&id) {
                    Some(previous) => diff_attributes(previous, &snapshot),
                    None => diff_attributes(&Default::default(), &snapshot),
                };
                if diff.is_empty() {
                    continue;
                }

                let now = self.clock.now();
                debug!(resource = %name, %id, revision, changes = diff.len(), "digest change");
                store.changes.insert(id.clone(), diff);
                store.modified.insert(id.clone(), now);
                store.touch(now);
                store.previous_attributes.insert(id.clone(), snapshot);
                report.changed.push((name.clone(), id));
            }
        }

        if !report.is_clean() {
            debug!(scanned = report.scanned, changed = report.changed.len(), "digest");
        }
        report
    }
}
