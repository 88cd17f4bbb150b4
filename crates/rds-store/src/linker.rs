use rds_types::{Relation, RelationKind, ResourceDefinition, ResourceId};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::StoreResult;
use crate::item::{Item, Link};
use crate::registry::{parse_query, Registry};
use crate::store::ResourceStore;

impl Registry {
    /// Resolve the relations of every item of `resource` selected by the
    /// filter query `params` against items already held by the related
    /// stores. `relation_names` narrows the relations by target type or
    /// local field; an empty slice means all of them.
    ///
    /// Returns the items that were linked.
    pub fn link_all(
        &self,
        resource: &str,
        params: Option<&Value>,
        relation_names: &[&str],
    ) -> StoreResult<Vec<Item>> {
        const OP: &str = "linkAll";
        let r = self.resource(OP, resource)?;
        let query = parse_query(OP, params)?;
        let items = query.apply(r.store.items());
        self.link_items(&r.definition, &items, relation_names);
        Ok(items)
    }

    /// Attach relation fields on `items`, which belong to `definition`.
    pub(crate) fn link_items(&self, definition: &ResourceDefinition, items: &[Item], names: &[&str]) {
        for relation in definition.select_relations(names) {
            let Some(target) = self.resources.get(&relation.target) else {
                warn!(
                    resource = %definition.name,
                    relation = %relation.local_field,
                    target = %relation.target,
                    "relation target is not registered; skipping"
                );
                continue;
            };
            for item in items {
                link_one(definition, relation, &target.store, item);
            }
            debug!(
                resource = %definition.name,
                relation = %relation.local_field,
                kind = %relation.kind,
                items = items.len(),
                "linked"
            );
        }
    }
}

/// Resolve one relation for one item. Reads happen before the write lock is
/// taken, so self-referencing relations never contend on the same record.
fn link_one(definition: &ResourceDefinition, relation: &Relation, target: &ResourceStore, item: &Item) {
    let field = relation.local_field.as_str();
    match relation.kind {
        RelationKind::BelongsTo => {
            let parent = item
                .get(&relation.foreign_key)
                .and_then(|fk| ResourceId::from_value(&fk).ok())
                .and_then(|id| target.get(&id).cloned());
            match parent {
                Some(parent) => item.set_link(field, Link::One(parent.downgrade())),
                None => item.clear_link(field),
            }
        }
        RelationKind::HasMany | RelationKind::HasOne => {
            let Some(key) = item
                .get(definition.id_attribute())
                .and_then(|v| ResourceId::from_value(&v).ok())
            else {
                item.clear_link(field);
                return;
            };
            let mut children = target.items().iter().filter(|child| {
                child.with_attributes(|attrs| {
                    attrs.get(&relation.foreign_key).is_some_and(|fk| key.matches(fk))
                })
            });
            if relation.kind == RelationKind::HasOne {
                match children.next() {
                    Some(child) => item.set_link(field, Link::One(child.downgrade())),
                    None => item.clear_link(field),
                }
            } else {
                let children = children.map(Item::downgrade).collect();
                item.set_link(field, Link::Many(children));
            }
        }
    }
}
